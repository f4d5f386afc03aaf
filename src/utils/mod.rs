pub mod html;
pub mod logging;

pub use logging::init_logging;
