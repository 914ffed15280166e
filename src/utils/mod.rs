pub mod blocking;
pub mod logging;

pub use blocking::run_blocking;
pub use logging::init_logging;
