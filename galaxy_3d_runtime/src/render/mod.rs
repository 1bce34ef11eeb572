/// Render context and frame loop

pub mod render_context_config;
pub mod render_context;

pub use render_context_config::*;
pub use render_context::*;
