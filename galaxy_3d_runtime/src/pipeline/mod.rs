/// Pipelines and the registry that orders them

pub mod pipeline;
pub mod pipeline_registry;

pub use pipeline::*;
pub use pipeline_registry::*;
