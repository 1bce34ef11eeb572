/// BindingLayout / BindingGroup - Vulkan descriptor set layout and descriptor set

use galaxy_3d_runtime::galaxy3d::device::{
    BindingGroup as DeviceBindingGroup,
    BindingLayout as DeviceBindingLayout,
    BindingLayoutDesc,
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan descriptor set layout
///
/// Static samplers are immutable samplers of the layout; the VkSamplers
/// themselves live in the context's sampler cache.
pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    desc: BindingLayoutDesc,
}

impl BindingLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, set_layout: vk::DescriptorSetLayout, desc: BindingLayoutDesc) -> Self {
        Self { ctx, set_layout, desc }
    }

    /// # Safety
    ///
    /// `layout` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(layout: &dyn DeviceBindingLayout) -> &BindingLayout {
        &*(layout as *const dyn DeviceBindingLayout as *const BindingLayout)
    }
}

impl DeviceBindingLayout for BindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// Vulkan binding group implementation
///
/// Wraps a VkDescriptorSet handle. The descriptor set itself is managed
/// by the descriptor pool and freed when the pool is destroyed.
pub struct BindingGroup {
    /// Keeps the descriptor pools alive
    _ctx: Arc<GpuContext>,
    pub(crate) descriptor_set: vk::DescriptorSet,
    binding_count: usize,
}

impl BindingGroup {
    pub(crate) fn new(ctx: Arc<GpuContext>, descriptor_set: vk::DescriptorSet, binding_count: usize) -> Self {
        Self { _ctx: ctx, descriptor_set, binding_count }
    }

    /// # Safety
    ///
    /// `group` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(group: &dyn DeviceBindingGroup) -> &BindingGroup {
        &*(group as *const dyn DeviceBindingGroup as *const BindingGroup)
    }
}

impl DeviceBindingGroup for BindingGroup {
    fn binding_count(&self) -> usize {
        self.binding_count
    }
}
