/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Presents from the graphics queue. The next image is acquired as soon as
/// the previous one is presented (and at creation), so the back-buffer index
/// is known before the frame is recorded.

use galaxy_3d_runtime::galaxy3d::{Result, Error};
use galaxy_3d_runtime::galaxy3d::device::{
    Swapchain as DeviceSwapchain,
    Texture as DeviceTexture,
    TextureFormat, TextureInfo, TextureUsage,
};
use galaxy_3d_runtime::{engine_bail, engine_debug, engine_info, engine_warn};
use ash::vk;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::vk_to_texture_format;
use crate::vulkan_texture::Texture;

/// Requested number of swapchain images
const BACK_BUFFER_COUNT: u32 = 2;

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    format: TextureFormat,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    immediate_supported: bool,

    back_buffers: Vec<Arc<Texture>>,

    /// Acquire semaphores, used round-robin (one more than the image count)
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    /// Semaphore signaled by the acquisition of `current_image`
    current_acquire: vk::Semaphore,
    /// One semaphore per swapchain image (signaled by submit, waited by present)
    render_finished_semaphores: Vec<vk::Semaphore>,
    current_image: u32,
    /// Whether work rendering into `current_image` has been submitted
    submitted: AtomicBool,

    /// One-shot command buffer for layout initialization after (re)creation
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl Swapchain {
    /// Create a swapchain for `surface`
    ///
    /// Takes ownership of the surface (destroyed with the swapchain).
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        unsafe {
            let supported = surface_loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.graphics_queue_family, surface)
                .map_err(|e| vk_error("Failed to query surface support", e))?;
            if !supported {
                surface_loader.destroy_surface(surface, None);
                return Err(Error::InitializationFailed(
                    "graphics queue family cannot present to the window surface".to_string(),
                ));
            }

            let surface_formats = surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| vk_error("Failed to query surface formats", e))?;

            // Prefer an sRGB format, then any format the engine knows
            let surface_format = surface_formats
                .iter()
                .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                .or_else(|| surface_formats.iter().find(|f| vk_to_texture_format(f.format).is_some()))
                .copied();
            let (surface_format, format) = match surface_format
                .and_then(|f| vk_to_texture_format(f.format).map(|format| (f, format)))
            {
                Some(found) => found,
                None => {
                    surface_loader.destroy_surface(surface, None);
                    return Err(Error::InitializationFailed(format!(
                        "no supported swapchain format among {:?}",
                        surface_formats.iter().map(|f| f.format).collect::<Vec<_>>()
                    )));
                }
            };

            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, surface)
                .map_err(|e| vk_error("Failed to query present modes", e))?;
            let immediate_supported = present_modes.contains(&vk::PresentModeKHR::IMMEDIATE);

            let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

            let mut swapchain = Self {
                ctx,
                surface,
                surface_loader,
                swapchain: vk::SwapchainKHR::null(),
                swapchain_loader,
                surface_format,
                format,
                extent: vk::Extent2D { width, height },
                present_mode: vk::PresentModeKHR::FIFO,
                immediate_supported,
                back_buffers: Vec::new(),
                acquire_semaphores: Vec::new(),
                next_acquire: 0,
                current_acquire: vk::Semaphore::null(),
                render_finished_semaphores: Vec::new(),
                current_image: 0,
                submitted: AtomicBool::new(false),
                command_pool: vk::CommandPool::null(),
                command_buffer: vk::CommandBuffer::null(),
            };

            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(swapchain.ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            swapchain.command_pool = swapchain.ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| vk_error("Failed to create swapchain command pool", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(swapchain.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            swapchain.command_buffer = swapchain.ctx.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error("Failed to allocate swapchain command buffer", e))?[0];

            swapchain.build(width, height)?;

            engine_info!("galaxy3d::vulkan",
                "Swapchain created ({}x{}, {:?}, {} images)",
                swapchain.extent.width, swapchain.extent.height, swapchain.format, swapchain.back_buffers.len());

            Ok(swapchain)
        }
    }

    /// # Safety
    ///
    /// `swapchain` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(swapchain: &dyn DeviceSwapchain) -> &Swapchain {
        &*(swapchain as *const dyn DeviceSwapchain as *const Swapchain)
    }

    /// Semaphores for the submit rendering into the current image:
    /// (wait: image acquired, signal: rendering finished)
    ///
    /// Only one submit per acquired image may wait on the acquisition.
    pub(crate) fn take_sync_info(&self) -> Result<(vk::Semaphore, vk::Semaphore)> {
        if self.submitted.swap(true, Ordering::AcqRel) {
            engine_bail!(Configuration; "galaxy3d::vulkan",
                "back-buffer {} already submitted, present it before submitting again", self.current_image);
        }
        Ok((
            self.current_acquire,
            self.render_finished_semaphores[self.current_image as usize],
        ))
    }

    /// (Re)create the swapchain, its back-buffers and semaphores, then acquire
    /// the first image. The GPU must not use the old images anymore.
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| vk_error("Failed to wait idle before swapchain creation", e))?;

            let caps = self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| vk_error("Failed to get surface capabilities", e))?;

            let extent = if caps.current_extent.width != u32::MAX {
                caps.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                    height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
                }
            };
            if extent.width == 0 || extent.height == 0 {
                engine_bail!(Configuration; "galaxy3d::vulkan",
                    "Cannot create a {}x{} swapchain", extent.width, extent.height);
            }

            let mut image_count = BACK_BUFFER_COUNT.max(caps.min_image_count);
            if caps.max_image_count > 0 {
                image_count = image_count.min(caps.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| vk_error("Failed to create swapchain", e))?;

            // Views of the old images go before the old swapchain
            self.back_buffers.clear();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            let images = self.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_error("Failed to get swapchain images", e))?;

            let info = TextureInfo {
                width: extent.width,
                height: extent.height,
                format: self.format,
                usage: TextureUsage::Present,
                sample_count: 1,
            };
            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.surface_format.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = self.ctx.device.create_image_view(&view_info, None)
                    .map_err(|e| vk_error("Failed to create swapchain image view", e))?;
                self.back_buffers.push(Arc::new(Texture::from_swapchain_image(
                    Arc::clone(&self.ctx),
                    image,
                    view,
                    info.clone(),
                )));
            }

            self.recreate_semaphores(images.len())?;
            self.initialize_layouts()?;

            if !self.acquire_next()? {
                engine_bail!("galaxy3d::vulkan", "Swapchain out of date right after creation");
            }
        }
        Ok(())
    }

    fn recreate_semaphores(&mut self, image_count: usize) -> Result<()> {
        self.destroy_semaphores();

        let create_info = vk::SemaphoreCreateInfo::default();
        unsafe {
            for _ in 0..image_count + 1 {
                let semaphore = self.ctx.device.create_semaphore(&create_info, None)
                    .map_err(|e| vk_error("Failed to create acquire semaphore", e))?;
                self.acquire_semaphores.push(semaphore);
            }
            for _ in 0..image_count {
                let semaphore = self.ctx.device.create_semaphore(&create_info, None)
                    .map_err(|e| vk_error("Failed to create render-finished semaphore", e))?;
                self.render_finished_semaphores.push(semaphore);
            }
        }
        self.next_acquire = 0;
        Ok(())
    }

    fn destroy_semaphores(&mut self) {
        unsafe {
            for semaphore in self.acquire_semaphores.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            for semaphore in self.render_finished_semaphores.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }
        self.current_acquire = vk::Semaphore::null();
    }

    /// Move every new image to PRESENT_SRC, the state a presented image is in
    fn initialize_layouts(&self) -> Result<()> {
        let barriers: Vec<vk::ImageMemoryBarrier> = self.back_buffers
            .iter()
            .map(|texture| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(texture.image)
                    .subresource_range(texture.subresource_range())
            })
            .collect();

        unsafe {
            let device = &self.ctx.device;
            device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error("Failed to reset swapchain command buffer", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error("Failed to begin swapchain command buffer", e))?;
            device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
            device.end_command_buffer(self.command_buffer)
                .map_err(|e| vk_error("Failed to end swapchain command buffer", e))?;

            let command_buffers = [self.command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device.queue_submit(self.ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| vk_error("Failed to submit swapchain layout initialization", e))?;
            device.queue_wait_idle(self.ctx.graphics_queue)
                .map_err(|e| vk_error("Failed to wait for swapchain layout initialization", e))?;
        }
        Ok(())
    }

    /// Acquire the next image; `Ok(false)` when the swapchain is out of date
    fn acquire_next(&mut self) -> Result<bool> {
        let semaphore = self.acquire_semaphores[self.next_acquire];
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    engine_debug!("galaxy3d::vulkan", "Acquired suboptimal swapchain image {}", index);
                }
                self.current_image = index;
                self.current_acquire = semaphore;
                self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();
                self.submitted.store(false, Ordering::Release);
                Ok(true)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(vk_error("Failed to acquire next swapchain image", e)),
        }
    }
}

impl DeviceSwapchain for Swapchain {
    fn buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn back_buffer(&self, index: usize) -> Result<Arc<dyn DeviceTexture>> {
        match self.back_buffers.get(index) {
            Some(texture) => Ok(Arc::clone(texture) as Arc<dyn DeviceTexture>),
            None => Err(Error::InvalidResource(format!(
                "back-buffer index {} out of range (count: {})", index, self.back_buffers.len()
            ))),
        }
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current_image
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        if !self.submitted.load(Ordering::Acquire) {
            engine_bail!(Configuration; "galaxy3d::vulkan",
                "present: nothing was submitted for back-buffer {}", self.current_image);
        }

        let swapchains = [self.swapchain];
        let image_indices = [self.current_image];
        let wait_semaphores = [self.render_finished_semaphores[self.current_image as usize]];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let mut rebuild = match unsafe {
            self.swapchain_loader.queue_present(self.ctx.graphics_queue, &present_info)
        } {
            Ok(_) => false,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!("galaxy3d::vulkan", "Swapchain out of date during present, recreating");
                true
            }
            Err(e) => return Err(vk_error("Failed to present swapchain image", e)),
        };

        let wanted_mode = if sync_interval == 0 && self.immediate_supported {
            vk::PresentModeKHR::IMMEDIATE
        } else {
            vk::PresentModeKHR::FIFO
        };
        if wanted_mode != self.present_mode {
            engine_info!("galaxy3d::vulkan", "Switching present mode to {:?}", wanted_mode);
            self.present_mode = wanted_mode;
            rebuild = true;
        }

        if !rebuild && !self.acquire_next()? {
            engine_warn!("galaxy3d::vulkan", "Swapchain out of date during acquire, recreating");
            rebuild = true;
        }
        if rebuild {
            self.build(self.extent.width, self.extent.height)?;
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.build(width, height)?;
        engine_info!("galaxy3d::vulkan", "Swapchain resized to {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            self.back_buffers.clear();
            self.destroy_semaphores();
            self.ctx.device.destroy_command_pool(self.command_pool, None);
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
