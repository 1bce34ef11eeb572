/// Texture - Vulkan implementation of the Texture trait

use galaxy_3d_runtime::galaxy3d::device::{Texture as DeviceTexture, TextureInfo};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan texture implementation
///
/// Swapchain images are wrapped without an allocation: the image belongs to
/// the swapchain and only the view is destroyed here.
pub struct Texture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) aspect: vk::ImageAspectFlags,
    /// `None` for swapchain-owned images
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl Texture {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        aspect: vk::ImageAspectFlags,
        allocation: Allocation,
        info: TextureInfo,
    ) -> Self {
        Self {
            ctx,
            image,
            view,
            aspect,
            allocation: Some(allocation),
            owns_image: true,
            info,
        }
    }

    /// Wrap a swapchain image
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        info: TextureInfo,
    ) -> Self {
        Self {
            ctx,
            image,
            view,
            aspect: vk::ImageAspectFlags::COLOR,
            allocation: None,
            owns_image: false,
            info,
        }
    }

    /// Downcast an engine texture created by the Vulkan device or swapchain
    ///
    /// # Safety
    ///
    /// `texture` must have been created by this backend.
    pub(crate) unsafe fn from_dyn(texture: &dyn DeviceTexture) -> &Texture {
        &*(texture as *const dyn DeviceTexture as *const Texture)
    }

    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    pub(crate) fn subresource_layers(&self) -> vk::ImageSubresourceLayers {
        vk::ImageSubresourceLayers {
            aspect_mask: self.aspect,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

impl DeviceTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
