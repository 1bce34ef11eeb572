/// Pipeline - Vulkan implementation of the Pipeline trait

use galaxy_3d_runtime::galaxy3d::device::{
    BindingLayout as DeviceBindingLayout,
    Pipeline as DevicePipeline,
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan graphics pipeline (dynamic rendering, no render pass)
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    /// Pipeline layout (accessed internally for descriptor set binding)
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// Keeps the descriptor set layout and its immutable samplers alive
    _binding_layout: Arc<dyn DeviceBindingLayout>,
    sample_count: u32,
}

impl Pipeline {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        pipeline: vk::Pipeline,
        pipeline_layout: vk::PipelineLayout,
        binding_layout: Arc<dyn DeviceBindingLayout>,
        sample_count: u32,
    ) -> Self {
        Self {
            ctx,
            pipeline,
            pipeline_layout,
            _binding_layout: binding_layout,
            sample_count,
        }
    }

    /// # Safety
    ///
    /// `pipeline` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(pipeline: &dyn DevicePipeline) -> &Pipeline {
        &*(pipeline as *const dyn DevicePipeline as *const Pipeline)
    }
}

impl DevicePipeline for Pipeline {
    fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}
