/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Vulkan 1.3 device with dynamic rendering and timeline semaphores. Copies
/// run on a dedicated transfer queue when the GPU has one; graphics submits
/// wait (GPU-side) for every copy submitted before them.

use galaxy_3d_runtime::galaxy3d::{Result, Error};
use galaxy_3d_runtime::galaxy3d::device::{
    BindingGroup as DeviceBindingGroup,
    BindingLayout as DeviceBindingLayout,
    BindingLayoutDesc, BindingResource, BindingWrite,
    Buffer as DeviceBuffer, BufferDesc, BufferUsage, MemoryLocation,
    CommandList as DeviceCommandList,
    DeviceConfig, DeviceFence, GraphicsDevice,
    Pipeline as DevicePipeline, PipelineDesc,
    QueueKind,
    Shader as DeviceShader, ShaderDesc, ShaderStage,
    Swapchain as DeviceSwapchain,
    Texture as DeviceTexture, TextureDesc, TextureFormat, TextureInfo, TextureUsage,
};
use galaxy_3d_runtime::{engine_bail, engine_bail_warn, engine_debug, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashSet;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::vulkan_binding_group::{BindingGroup, BindingLayout};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_fence::Fence;
use crate::vulkan_format::*;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// SPIR-V magic number (first word of every module)
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Vulkan graphics device
///
/// Central object for creating resources and submitting commands.
/// Presentation is handled by `Swapchain`, created with `create_swapchain`.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    properties: vk::PhysicalDeviceProperties,
    /// Signaled by every copy-queue submit
    copy_timeline: vk::Semaphore,
    /// Last value `copy_timeline` was asked to reach
    copy_timeline_value: u64,
}

impl VulkanGraphicsDevice {
    /// Create a new Vulkan device able to present to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: DeviceConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("galaxy3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| c"Galaxy3D Application".to_owned());
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Galaxy3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("galaxy3d::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| vk_init_error("Failed to get required extensions", e))?
                .to_vec();

            let enable_validation = Self::validation_available(&entry, &config);
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if enable_validation {
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| vk_init_error("Failed to create Vulkan instance", e))?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                let (loader, messenger) = create_debug_messenger(&entry, &instance, &config)?;
                (Some(loader), Some(messenger))
            } else {
                (None, None)
            };

            let physical_device = Self::pick_physical_device(&instance)?;
            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy().into_owned();

            let (graphics_family, copy_family) = Self::find_queue_families(&instance, physical_device)?;

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(graphics_family)
                    .queue_priorities(&queue_priorities),
            ];
            if copy_family != graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(copy_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
                .timeline_semaphore(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut features12)
                .push_next(&mut features13);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| vk_init_error("Failed to create logical device", e))?;

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let copy_queue = device.get_device_queue(copy_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            // From here on the context owns (and destroys) the device and instance
            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                allocator,
                (graphics_queue, graphics_family),
                (copy_queue, copy_family),
                debug_utils_loader,
                debug_messenger,
            ));

            let copy_timeline = Self::create_timeline(&ctx, 0)?;

            engine_info!("galaxy3d::vulkan",
                "Vulkan device created: {} (graphics family {}, copy family {}{}, validation {})",
                device_name,
                graphics_family,
                copy_family,
                if copy_family == graphics_family { ", shared queue" } else { "" },
                if enable_validation { "on" } else { "off" });

            Ok(Self {
                ctx,
                properties,
                copy_timeline,
                copy_timeline_value: 0,
            })
        }
    }

    /// Create a swapchain presenting to `window`
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn DeviceSwapchain>> {
        let display_handle = window.display_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window.window_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get window handle: {}", e)))?;

        let surface = unsafe {
            ash_window::create_surface(
                &self.ctx.entry,
                &self.ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| vk_init_error("Failed to create surface", e))?;

        let surface_loader = ash::khr::surface::Instance::new(&self.ctx.entry, &self.ctx.instance);
        let swapchain = Swapchain::new(Arc::clone(&self.ctx), surface, surface_loader, width, height)?;
        Ok(Box::new(swapchain))
    }

    /// Shared Vulkan state (device, queues, allocator)
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    fn validation_available(entry: &ash::Entry, config: &DeviceConfig) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_debug!("galaxy3d::vulkan",
                "Validation requested but the vulkan-validation feature is disabled");
            return false;
        }

        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let found = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false));
        if !found {
            engine_warn!("galaxy3d::vulkan",
                "{:?} not installed, continuing without validation", VALIDATION_LAYER);
        }
        found
    }

    /// First GPU supporting Vulkan 1.3 with dynamic rendering and timeline semaphores
    fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| vk_init_error("Failed to enumerate physical devices", e))?;

        physical_devices
            .into_iter()
            .find(|&physical_device| unsafe {
                let properties = instance.get_physical_device_properties(physical_device);
                if properties.api_version < vk::API_VERSION_1_3 {
                    return false;
                }
                let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
                let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
                let mut features = vk::PhysicalDeviceFeatures2::default()
                    .push_next(&mut features12)
                    .push_next(&mut features13);
                instance.get_physical_device_features2(physical_device, &mut features);
                features12.timeline_semaphore == vk::TRUE && features13.dynamic_rendering == vk::TRUE
            })
            .ok_or_else(|| {
                engine_error!("galaxy3d::vulkan", "No Vulkan 1.3 GPU with dynamic rendering found");
                Error::InitializationFailed("No Vulkan 1.3 GPU with dynamic rendering found".to_string())
            })
    }

    /// (graphics family, copy family); the copy family is a transfer-only
    /// family when one exists, the graphics family otherwise
    fn find_queue_families(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<(u32, u32)> {
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let graphics_family = queue_families
            .iter()
            .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32)
            .ok_or_else(|| {
                engine_error!("galaxy3d::vulkan", "No graphics queue family found");
                Error::InitializationFailed("No graphics queue family found".to_string())
            })?;

        let copy_family = queue_families
            .iter()
            .position(|qf| {
                qf.queue_flags.contains(vk::QueueFlags::TRANSFER)
                    && !qf.queue_flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .map(|i| i as u32)
            .unwrap_or(graphics_family);

        Ok((graphics_family, copy_family))
    }

    fn create_timeline(ctx: &GpuContext, initial_value: u64) -> Result<vk::Semaphore> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| vk_error("Failed to create copy timeline semaphore", e))
    }

    fn sharing_mode(&self, families: &[u32]) -> vk::SharingMode {
        if families.is_empty() {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        }
    }

    /// Command buffers of closed command lists recorded for `queue`
    fn command_buffers(queue: QueueKind, commands: &[&dyn DeviceCommandList]) -> Result<Vec<vk::CommandBuffer>> {
        commands
            .iter()
            .map(|command| {
                if command.queue() != queue {
                    engine_bail!(Configuration; "galaxy3d::vulkan",
                        "Command list recorded for the {:?} queue submitted to the {:?} queue",
                        command.queue(), queue);
                }
                let vk_command = unsafe { CommandList::from_dyn(*command) };
                if vk_command.is_recording() {
                    engine_bail!(Configuration; "galaxy3d::vulkan", "Command list submitted before close()");
                }
                Ok(vk_command.command_buffer())
            })
            .collect()
    }

    /// `(semaphore, value, stage)` wait on every copy submitted so far
    fn copy_wait(&self) -> Option<(vk::Semaphore, u64, vk::PipelineStageFlags)> {
        (self.copy_timeline_value > 0).then_some((
            self.copy_timeline,
            self.copy_timeline_value,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ))
    }

    /// Submit to a queue; timeline values of binary semaphores are ignored
    fn queue_submit(
        &self,
        queue: QueueKind,
        command_buffers: &[vk::CommandBuffer],
        waits: &[(vk::Semaphore, u64, vk::PipelineStageFlags)],
        signals: &[(vk::Semaphore, u64)],
    ) -> Result<()> {
        let (vk_queue, _) = self.ctx.queue(queue);

        let wait_semaphores: Vec<vk::Semaphore> = waits.iter().map(|w| w.0).collect();
        let wait_values: Vec<u64> = waits.iter().map(|w| w.1).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = waits.iter().map(|w| w.2).collect();
        let signal_semaphores: Vec<vk::Semaphore> = signals.iter().map(|s| s.0).collect();
        let signal_values: Vec<u64> = signals.iter().map(|s| s.1).collect();

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe { self.ctx.device.queue_submit(vk_queue, &[submit_info], vk::Fence::null()) }
            .map_err(|e| vk_error(&format!("Failed to submit to the {:?} queue", queue), e))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        if desc.size == 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan", "create_buffer: size is 0");
        }

        let usage = match desc.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::empty(),
        } | vk::BufferUsageFlags::TRANSFER_SRC
            | vk::BufferUsageFlags::TRANSFER_DST;

        let location = match desc.memory {
            MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
            MemoryLocation::HostVisible | MemoryLocation::Upload => gpu_allocator::MemoryLocation::CpuToGpu,
        };

        let families = self.ctx.sharing_families();
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(usage)
            .sharing_mode(self.sharing_mode(&families))
            .queue_family_indices(&families);

        unsafe {
            let buffer = self.ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| vk_error(&format!("Failed to create buffer of {} bytes", desc.size), e))?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = self.ctx.lock_allocator()?.allocate(&AllocationCreateDesc {
                name: "buffer",
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    engine_error!("galaxy3d::vulkan",
                        "Out of GPU memory for buffer ({:.2} MB, {:?}): {}",
                        requirements.size as f64 / (1024.0 * 1024.0), desc.memory, e);
                    return Err(Error::OutOfMemory);
                }
            };

            // From here the buffer wrapper frees the allocation on error
            let vk_buffer = Buffer::new(Arc::clone(&self.ctx), buffer, allocation, desc.size, desc.memory);
            vk_buffer.bind_memory()?;

            Ok(Arc::new(vk_buffer))
        }
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "create_texture: invalid size {}x{}", desc.width, desc.height);
        }
        let Some(samples) = sample_count_to_vk(desc.sample_count) else {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "create_texture: unsupported sample count {}", desc.sample_count);
        };
        if desc.format.is_depth() != (desc.usage == TextureUsage::DepthStencil) {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "create_texture: format {:?} cannot be used as {:?}", desc.format, desc.usage);
        }

        let usage = match desc.usage {
            TextureUsage::Sampled => vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            TextureUsage::RenderTarget => {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
            }
            TextureUsage::DepthStencil => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            TextureUsage::Present => {
                engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                    "create_texture: Present textures are owned by the swapchain");
            }
        };

        let format = texture_format_to_vk(desc.format);
        let aspect = aspect_mask(desc.format);
        let families = self.ctx.sharing_families();

        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(self.sharing_mode(&families))
            .queue_family_indices(&families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = self.ctx.device.create_image(&image_create_info, None)
                .map_err(|e| vk_error("Failed to create texture image", e))?;

            let requirements = self.ctx.device.get_image_memory_requirements(image);
            let allocation = self.ctx.lock_allocator()?.allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    engine_error!("galaxy3d::vulkan",
                        "Out of GPU memory for texture ({}x{} {:?}, {:.2} MB): {}",
                        desc.width, desc.height, desc.format,
                        requirements.size as f64 / (1024.0 * 1024.0), e);
                    return Err(Error::OutOfMemory);
                }
            };

            let bound = self.ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset());
            let view = bound.and_then(|()| {
                let view_create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: aspect,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                self.ctx.device.create_image_view(&view_create_info, None)
            });
            let view = match view {
                Ok(view) => view,
                Err(e) => {
                    // Texture wrapper with a null view releases the image and memory
                    drop(Texture::new(
                        Arc::clone(&self.ctx), image, vk::ImageView::null(), aspect, allocation, TextureInfo::from(&desc),
                    ));
                    return Err(vk_error("Failed to bind texture memory or create its view", e));
                }
            };

            Ok(Arc::new(Texture::new(
                Arc::clone(&self.ctx),
                image,
                view,
                aspect,
                allocation,
                TextureInfo::from(&desc),
            )))
        }
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn DeviceShader>> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "Shader code size {} is not a non-zero multiple of 4 bytes", desc.code.len());
        }

        // Copy into u32 words: the byte slice has no alignment guarantee
        let words: Vec<u32> = desc.code
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        if words[0] != SPIRV_MAGIC {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "Shader code is not SPIR-V (magic {:#010x})", words[0]);
        }

        let entry_point = CString::new(desc.entry_point.as_str())
            .map_err(|_| Error::InvalidResource(format!("invalid shader entry point {:?}", desc.entry_point)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe { self.ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| vk_error("Failed to create shader module", e))?;

        Ok(Arc::new(Shader::new(Arc::clone(&self.ctx), module, desc.stage, entry_point)))
    }

    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> Result<Arc<dyn DeviceBindingLayout>> {
        let mut seen = FxHashSet::default();
        let slots = desc.entries.iter().map(|e| e.binding)
            .chain(desc.static_samplers.iter().map(|s| s.binding));
        for binding in slots {
            if !seen.insert(binding) {
                engine_bail_warn!(Configuration; "galaxy3d::vulkan",
                    "create_binding_layout: binding {} declared twice", binding);
            }
        }

        let samplers: Vec<[vk::Sampler; 1]> = desc.static_samplers
            .iter()
            .map(|s| self.ctx.sampler(s.filter, s.address_mode).map(|sampler| [sampler]))
            .collect::<Result<_>>()?;

        let mut bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.entries
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(binding_type_to_vk(entry.binding_type))
                    .descriptor_count(1)
                    .stage_flags(stage_flags_to_vk(entry.stage_flags))
            })
            .collect();
        for (static_sampler, sampler) in desc.static_samplers.iter().zip(&samplers) {
            bindings.push(
                vk::DescriptorSetLayoutBinding::default()
                    .binding(static_sampler.binding)
                    .descriptor_type(vk::DescriptorType::SAMPLER)
                    .stage_flags(stage_flags_to_vk(static_sampler.stage_flags))
                    .immutable_samplers(sampler),
            );
        }

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let set_layout = unsafe { self.ctx.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| vk_error("Failed to create descriptor set layout", e))?;

        Ok(Arc::new(BindingLayout::new(Arc::clone(&self.ctx), set_layout, desc.clone())))
    }

    fn create_binding_group(
        &mut self,
        layout: &Arc<dyn DeviceBindingLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn DeviceBindingGroup>> {
        let mut written = FxHashSet::default();
        for write in writes {
            let Some(slot) = layout.desc().entry(write.binding) else {
                engine_bail_warn!(Configuration; "galaxy3d::vulkan",
                    "create_binding_group: binding {} is not declared in the layout", write.binding);
            };
            if !write.resource.is_compatible(slot.binding_type) {
                engine_bail_warn!(Configuration; "galaxy3d::vulkan",
                    "create_binding_group: resource written to binding {} does not match {:?}",
                    write.binding, slot.binding_type);
            }
            if !written.insert(write.binding) {
                engine_bail_warn!(Configuration; "galaxy3d::vulkan",
                    "create_binding_group: binding {} written twice", write.binding);
            }
        }

        let vk_layout = unsafe { BindingLayout::from_dyn(layout.as_ref()) };
        let descriptor_set = self.ctx.allocate_descriptor_set(vk_layout.set_layout)?;

        // Infos first, so the writes can borrow them from stable storage
        let mut image_infos = Vec::with_capacity(writes.len());
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut pending = Vec::with_capacity(writes.len());
        for write in writes {
            match write.resource {
                BindingResource::SampledTexture(texture) => {
                    let vk_texture = unsafe { Texture::from_dyn(texture) };
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_view(vk_texture.view)
                            .image_layout(vk::ImageLayout::GENERAL),
                    );
                    pending.push((write.binding, vk::DescriptorType::SAMPLED_IMAGE, image_infos.len() - 1));
                }
                BindingResource::UniformBuffer(buffer, size) => {
                    let vk_buffer = unsafe { Buffer::from_dyn(buffer) };
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(vk_buffer.buffer)
                            .offset(0)
                            .range(size.min(buffer.size())),
                    );
                    pending.push((write.binding, vk::DescriptorType::UNIFORM_BUFFER, buffer_infos.len() - 1));
                }
                BindingResource::StorageBuffer(buffer) => {
                    let vk_buffer = unsafe { Buffer::from_dyn(buffer) };
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(vk_buffer.buffer)
                            .offset(0)
                            .range(vk::WHOLE_SIZE),
                    );
                    pending.push((write.binding, vk::DescriptorType::STORAGE_BUFFER, buffer_infos.len() - 1));
                }
            }
        }

        let descriptor_writes: Vec<vk::WriteDescriptorSet> = pending
            .iter()
            .map(|&(binding, descriptor_type, index)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(descriptor_set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type);
                if descriptor_type == vk::DescriptorType::SAMPLED_IMAGE {
                    write.image_info(std::slice::from_ref(&image_infos[index]))
                } else {
                    write.buffer_info(std::slice::from_ref(&buffer_infos[index]))
                }
            })
            .collect();

        unsafe {
            self.ctx.device.update_descriptor_sets(&descriptor_writes, &[]);
        }

        Ok(Arc::new(BindingGroup::new(Arc::clone(&self.ctx), descriptor_set, writes.len())))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        if desc.vertex_shader.stage() != ShaderStage::Vertex || desc.pixel_shader.stage() != ShaderStage::Pixel {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "create_pipeline: expected vertex and pixel shaders, got {:?} and {:?}",
                desc.vertex_shader.stage(), desc.pixel_shader.stage());
        }
        let Some(samples) = sample_count_to_vk(desc.sample_count) else {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "create_pipeline: unsupported sample count {}", desc.sample_count);
        };

        let vertex_shader = unsafe { Shader::from_dyn(desc.vertex_shader.as_ref()) };
        let pixel_shader = unsafe { Shader::from_dyn(desc.pixel_shader.as_ref()) };
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(vertex_shader.stage))
                .module(vertex_shader.module)
                .name(&vertex_shader.entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(pixel_shader.stage))
                .module(pixel_shader.module)
                .name(&pixel_shader.entry_point),
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts matter here
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(samples);

        let blend = &desc.color_blend;
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(blend.blend_enable)
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::VERTEX_INPUT_BINDING_STRIDE,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let vk_binding_layout = unsafe { BindingLayout::from_dyn(desc.binding_layout.as_ref()) };
        let set_layouts = [vk_binding_layout.set_layout];
        let layout_create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout = unsafe { self.ctx.device.create_pipeline_layout(&layout_create_info, None) }
            .map_err(|e| vk_error("Failed to create pipeline layout", e))?;

        let color_formats = [texture_format_to_vk(desc.color_format)];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(texture_format_to_vk(desc.depth_format));

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { self.ctx.device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(vk_error("Failed to create graphics pipeline", e));
            }
        };

        Ok(Arc::new(Pipeline::new(
            Arc::clone(&self.ctx),
            pipeline,
            pipeline_layout,
            Arc::clone(&desc.binding_layout),
            desc.sample_count,
        )))
    }

    fn create_command_list(&mut self, queue: QueueKind) -> Result<Box<dyn DeviceCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.ctx), queue)?))
    }

    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn DeviceFence>> {
        Ok(Arc::new(Fence::new(Arc::clone(&self.ctx), initial_value)?))
    }

    fn submit(&mut self, queue: QueueKind, commands: &[&dyn DeviceCommandList]) -> Result<()> {
        let command_buffers = Self::command_buffers(queue, commands)?;

        match queue {
            QueueKind::Copy => {
                let value = self.copy_timeline_value + 1;
                self.queue_submit(queue, &command_buffers, &[], &[(self.copy_timeline, value)])?;
                self.copy_timeline_value = value;
            }
            QueueKind::Graphics => {
                let waits: Vec<_> = self.copy_wait().into_iter().collect();
                self.queue_submit(queue, &command_buffers, &waits, &[])?;
            }
        }
        Ok(())
    }

    fn submit_with_swapchain(
        &mut self,
        commands: &[&dyn DeviceCommandList],
        swapchain: &dyn DeviceSwapchain,
    ) -> Result<()> {
        let command_buffers = Self::command_buffers(QueueKind::Graphics, commands)?;
        let vk_swapchain = unsafe { Swapchain::from_dyn(swapchain) };
        let (image_acquired, render_finished) = vk_swapchain.take_sync_info()?;

        let mut waits: Vec<_> = self.copy_wait().into_iter().collect();
        waits.push((
            image_acquired,
            0,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::TRANSFER,
        ));
        self.queue_submit(QueueKind::Graphics, &command_buffers, &waits, &[(render_finished, 0)])
    }

    fn signal(&mut self, queue: QueueKind, fence: &dyn DeviceFence, value: u64) -> Result<()> {
        let vk_fence = unsafe { Fence::from_dyn(fence) };
        self.queue_submit(queue, &[], &[], &[(vk_fence.semaphore, value)])
    }

    fn supports_sample_count(&self, format: TextureFormat, sample_count: u32) -> bool {
        let Some(samples) = sample_count_to_vk(sample_count) else {
            return false;
        };
        if sample_count == 1 {
            return true;
        }

        let limits = &self.properties.limits;
        let (framebuffer_counts, usage) = if format.is_depth() {
            (limits.framebuffer_depth_sample_counts, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        } else {
            (
                limits.framebuffer_color_sample_counts,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            )
        };
        if !framebuffer_counts.contains(samples) {
            return false;
        }

        let properties = unsafe {
            self.ctx.instance.get_physical_device_image_format_properties(
                self.ctx.physical_device,
                texture_format_to_vk(format),
                vk::ImageType::TYPE_2D,
                vk::ImageTiling::OPTIMAL,
                usage,
                vk::ImageCreateFlags::empty(),
            )
        };
        properties.map(|p| p.sample_counts.contains(samples)).unwrap_or(false)
    }

    fn copy_row_pitch_alignment(&self) -> u64 {
        self.properties.limits.optimal_buffer_copy_row_pitch_alignment.max(256)
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| vk_error("Failed to wait for device idle", e))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.ctx.device.destroy_semaphore(self.copy_timeline, None);
        }
    }
}

fn vk_init_error(context: &str, result: vk::Result) -> Error {
    engine_error!("galaxy3d::vulkan", "{}: {:?}", context, result);
    Error::InitializationFailed(format!("{}: {:?}", context, result))
}

/// Install the validation message callback
#[cfg(feature = "vulkan-validation")]
fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &DeviceConfig,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(crate::debug::DebugConfig::from(config));

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }
        .map_err(|e| vk_init_error("Failed to create debug messenger", e))?;

    Ok((debug_utils, messenger))
}

#[cfg(not(feature = "vulkan-validation"))]
fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    _config: &DeviceConfig,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    engine_bail!(Configuration; "galaxy3d::vulkan", "Validation support is not compiled in");
}
