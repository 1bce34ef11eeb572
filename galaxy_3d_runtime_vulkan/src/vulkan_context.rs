/// GpuContext - Shared Vulkan state for all device objects
///
/// Contains everything GPU objects need after creation:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue family indices for resource sharing
/// - Descriptor pools and the static sampler cache
///
/// Buffers, textures, command lists and swapchains each hold an
/// `Arc<GpuContext>`, so the logical device and instance are destroyed only
/// once the last object using them is gone.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use galaxy_3d_runtime::galaxy3d::{Error, Result};
use galaxy_3d_runtime::galaxy3d::device::{AddressMode, Filter, QueueKind};
use galaxy_3d_runtime::{engine_error, engine_info};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::vulkan_sampler::SamplerCache;

/// Descriptor sets per pool; a new pool is created when one is exhausted
const DESCRIPTOR_POOL_SETS: u32 = 1024;

pub struct GpuContext {
    /// Vulkan loader (surface creation)
    pub(crate) entry: ash::Entry,

    pub instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Dedicated transfer queue (the graphics queue when none exists)
    pub copy_queue: vk::Queue,
    pub copy_queue_family: u32,

    /// Descriptor pools for binding group allocation (grows dynamically when exhausted)
    descriptor_pools: Mutex<Vec<vk::DescriptorPool>>,

    /// Immutable samplers shared by binding layouts
    pub(crate) samplers: Mutex<SamplerCache>,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        (graphics_queue, graphics_queue_family): (vk::Queue, u32),
        (copy_queue, copy_queue_family): (vk::Queue, u32),
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
            graphics_queue,
            graphics_queue_family,
            copy_queue,
            copy_queue_family,
            descriptor_pools: Mutex::new(Vec::new()),
            samplers: Mutex::new(SamplerCache::default()),
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Whether copies run on a separate queue family
    pub fn has_dedicated_copy_queue(&self) -> bool {
        self.copy_queue_family != self.graphics_queue_family
    }

    /// Queue families resources are shared between
    ///
    /// Empty when a single family is used (EXCLUSIVE sharing).
    pub fn sharing_families(&self) -> Vec<u32> {
        if self.has_dedicated_copy_queue() {
            vec![self.graphics_queue_family, self.copy_queue_family]
        } else {
            Vec::new()
        }
    }

    /// Queue handle and family for `queue`
    pub fn queue(&self, queue: QueueKind) -> (vk::Queue, u32) {
        match queue {
            QueueKind::Graphics => (self.graphics_queue, self.graphics_queue_family),
            QueueKind::Copy => (self.copy_queue, self.copy_queue_family),
        }
    }

    /// Allocate a descriptor set, growing the pool list when the last pool is full
    pub(crate) fn allocate_descriptor_set(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let mut pools = self
            .descriptor_pools
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool mutex poisoned".to_string()))?;

        let layouts = [layout];
        if let Some(&pool) = pools.last() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                Err(e) => return Err(vk_error("Failed to allocate descriptor set", e)),
            }
        }

        let pool = self.create_descriptor_pool()?;
        pools.push(pool);
        if pools.len() > 1 {
            engine_info!("galaxy3d::vulkan",
                "Descriptor pool exhausted, created new pool (total: {})", pools.len());
        }

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| vk_error("Failed to allocate descriptor set after pool growth", e))?;
        Ok(sets[0])
    }

    fn create_descriptor_pool(&self) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: DESCRIPTOR_POOL_SETS * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: DESCRIPTOR_POOL_SETS * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: DESCRIPTOR_POOL_SETS * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: DESCRIPTOR_POOL_SETS * 8,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(DESCRIPTOR_POOL_SETS);

        unsafe { self.device.create_descriptor_pool(&info, None) }
            .map_err(|e| vk_error("Failed to create descriptor pool", e))
    }

    pub(crate) fn sampler(
        &self,
        filter: Filter,
        address_mode: AddressMode,
    ) -> Result<vk::Sampler> {
        let mut samplers = self
            .samplers
            .lock()
            .map_err(|_| Error::BackendError("sampler cache mutex poisoned".to_string()))?;
        samplers
            .get(&self.device, filter, address_mode)
            .map_err(|e| vk_error("Failed to create sampler", e))
    }

    pub fn lock_allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator mutex poisoned".to_string()))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pools) = self.descriptor_pools.get_mut() {
                for pool in pools.drain(..) {
                    self.device.destroy_descriptor_pool(pool, None);
                }
            }
            if let Ok(samplers) = self.samplers.get_mut() {
                samplers.destroy_all(&self.device);
            }

            // Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            // Stop routing validation messages before the messenger goes away
            crate::debug::cleanup_debug_config();

            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Map a Vulkan error to the engine error, logging it at ERROR
///
/// Device loss and memory exhaustion keep their own variants so callers can
/// tell fatal failures apart.
pub(crate) fn vk_error(context: &str, result: vk::Result) -> Error {
    engine_error!("galaxy3d::vulkan", "{}: {:?}", context, result);
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost(format!("{}: {:?}", context, result)),
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        _ => Error::BackendError(format!("{}: {:?}", context, result)),
    }
}
