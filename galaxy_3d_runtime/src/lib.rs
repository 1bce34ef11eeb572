/*!
# Galaxy 3D Runtime

Backend-agnostic core of a minimal real-time 3D renderer.

The runtime owns a device-independent abstraction of the GPU (`GraphicsDevice`
and its resource traits), a named resource manager with staged uploads, shader
pipelines with descriptor tables, and a render context that records, submits
and presents one frame at a time into a double-buffered swapchain.

## Architecture

- **GraphicsDevice**: factory trait for GPU objects, implemented per backend
- **ResourceManager**: named textures / buffers, uploads through staging buffers
- **Pipeline**: shaders, input layout, descriptor table and draw calls
- **RenderContext**: swapchain, depth / MSAA targets, frame loop
- **App / AppHost**: application callbacks and the per-frame state

The Vulkan backend lives in the `galaxy_3d_runtime_vulkan` crate.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod utils;
pub mod sync;
pub mod resource;
pub mod binding;
pub mod shader;
pub mod pipeline;
pub mod render;
pub mod app;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result, SetupError};

    // Engine singleton
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogFacadeLogger};
    }

    // GPU abstraction implemented by the backends
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod sync {
        pub use crate::sync::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod binding {
        pub use crate::binding::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod render {
        pub use crate::render::*;
    }

    pub mod app {
        pub use crate::app::*;
    }
}

// Re-export math library at crate root
pub use glam;
