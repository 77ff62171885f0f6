use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::error::TaskError;
use crate::task::Task;

/// Image-scanning collaborator. The scanner itself lives outside this crate.
pub trait ImageScanner: Send + Sync {
    fn scan_all(&self) -> Result<(), TaskError>;
}

/// Wraps a full-registry scan as a schedulable task.
pub struct ScanAllImagesTask {
    scanner: Arc<dyn ImageScanner>,
}

impl ScanAllImagesTask {
    pub fn new(scanner: Arc<dyn ImageScanner>) -> Self {
        Self { scanner }
    }
}

impl Task for ScanAllImagesTask {
    fn name(&self) -> &str {
        "scan_all_images"
    }

    fn run(&self) -> Result<(), TaskError> {
        let start = Instant::now();
        self.scanner.scan_all()?;
        info!("Scan of all images finished in {:.1}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}
