/// Graphics device module - backend-agnostic GPU abstraction

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod shader;
pub mod fence;
pub mod command_list;
pub mod pipeline;
pub mod binding_group;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use texture::*;
pub use shader::*;
pub use fence::*;
pub use command_list::*;
pub use pipeline::*;
pub use binding_group::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
