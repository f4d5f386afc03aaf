pub mod controller;
pub mod state;

pub use controller::OverlayController;
pub use state::{OverlayPhase, OverlayRuntimeState, OverlayStatus};
