//! Resource management module
//!
//! GPU-resident resources keyed by name, and the staged upload path that
//! fills them.

pub mod gpu_resource;
pub mod resource_manager;

pub use gpu_resource::{GpuResource, ResourceKind, ResourceHandle, AuxMetadata};
pub use resource_manager::{ResourceManager, TEXTURE_UPLOAD_FORMAT};
