/*!
# Galaxy 3D Runtime - Vulkan Backend

Vulkan implementation of the galaxy_3d_runtime `GraphicsDevice`, `Swapchain`,
`CommandList` and resource traits, using Ash for the Vulkan bindings and
gpu-allocator for memory management.

```no_run
use galaxy_3d_runtime::galaxy3d::device::DeviceConfig;
use galaxy_3d_runtime_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> galaxy_3d_runtime::galaxy3d::Result<()> {
let device = VulkanGraphicsDevice::new(window, DeviceConfig::default())?;
let swapchain = device.create_swapchain(window, 1280, 720)?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_context;
mod vulkan_format;
mod vulkan_sampler;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_binding_group;
mod vulkan_fence;
mod vulkan_command_list;
mod vulkan_swapchain;
mod vulkan_graphics_device;

pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use vulkan_context::GpuContext;
pub use vulkan_swapchain::Swapchain as VulkanSwapchain;
pub use vulkan_command_list::CommandList as VulkanCommandList;
pub use vulkan_texture::Texture as VulkanTexture;
pub use vulkan_buffer::Buffer as VulkanBuffer;

pub use debug::{get_validation_stats, print_validation_stats_report};
