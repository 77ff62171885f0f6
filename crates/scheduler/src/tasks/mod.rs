mod scan_all_task;

pub use scan_all_task::{ImageScanner, ScanAllImagesTask};
