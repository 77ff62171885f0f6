pub mod clock;
pub mod config;
pub mod error;

pub use clock::{seconds_since_midnight, SECONDS_PER_DAY};
pub use config::Config;
pub use error::*;
