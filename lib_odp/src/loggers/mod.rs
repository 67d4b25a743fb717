/// `fern` dispatcher setup and log file rotation.
pub mod logger;

pub use logger::setup_logging;
