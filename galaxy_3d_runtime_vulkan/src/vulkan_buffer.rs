/// Buffer - Vulkan implementation of the Buffer trait

use galaxy_3d_runtime::galaxy3d::{Result, Error};
use galaxy_3d_runtime::galaxy3d::device::{Buffer as DeviceBuffer, MemoryLocation};
use galaxy_3d_runtime::{engine_bail, engine_bail_warn};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, GpuContext};

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator)
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    location: MemoryLocation,
}

impl Buffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        location: MemoryLocation,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            location,
        }
    }

    /// Bind the allocation to the buffer (done once, right after creation)
    pub(crate) fn bind_memory(&self) -> Result<()> {
        let Some(allocation) = &self.allocation else {
            engine_bail!("galaxy3d::vulkan", "Buffer has no GPU allocation to bind");
        };
        unsafe {
            self.ctx.device
                .bind_buffer_memory(self.buffer, allocation.memory(), allocation.offset())
                .map_err(|e| vk_error("Failed to bind buffer memory", e))
        }
    }

    /// Downcast an engine buffer created by the Vulkan device
    ///
    /// # Safety
    ///
    /// `buffer` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(buffer: &dyn DeviceBuffer) -> &Buffer {
        &*(buffer as *const dyn DeviceBuffer as *const Buffer)
    }
}

impl DeviceBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn memory_location(&self) -> MemoryLocation {
        self.location
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail_warn!(InvalidResource; "galaxy3d::vulkan",
                "Buffer update out of range: offset {} + {} bytes > size {}",
                offset, data.len(), self.size);
        }

        let Some(allocation) = &self.allocation else {
            engine_bail!("galaxy3d::vulkan", "Buffer update failed: no GPU allocation");
        };

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::InvalidResource("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }

        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
