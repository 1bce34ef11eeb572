/// Fence - DeviceFence backed by a Vulkan timeline semaphore

use galaxy_3d_runtime::galaxy3d::Result;
use galaxy_3d_runtime::galaxy3d::device::DeviceFence;
use ash::vk;
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_context::{vk_error, GpuContext};

pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| vk_error("Failed to create timeline semaphore", e))?;

        Ok(Self { ctx, semaphore })
    }

    /// # Safety
    ///
    /// `fence` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(fence: &dyn DeviceFence) -> &Fence {
        &*(fence as *const dyn DeviceFence as *const Fence)
    }
}

impl DeviceFence for Fence {
    fn completed_value(&self) -> Result<u64> {
        unsafe { self.ctx.device.get_semaphore_counter_value(self.semaphore) }
            .map_err(|e| vk_error("Failed to read timeline semaphore", e))
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<bool> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);

        match unsafe { self.ctx.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(vk_error("Failed to wait on timeline semaphore", e)),
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
