//! Application layer: per-frame state and the host driving App callbacks

pub mod frame_state;
pub mod app;

pub use frame_state::*;
pub use app::*;
