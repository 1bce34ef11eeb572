/// Shader - Vulkan implementation of the Shader trait

use galaxy_3d_runtime::galaxy3d::device::{Shader as DeviceShader, ShaderStage};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan shader implementation
pub struct Shader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: ShaderStage,
    pub(crate) entry_point: CString,
}

impl Shader {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        module: vk::ShaderModule,
        stage: ShaderStage,
        entry_point: CString,
    ) -> Self {
        Self { ctx, module, stage, entry_point }
    }

    /// # Safety
    ///
    /// `shader` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(shader: &dyn DeviceShader) -> &Shader {
        &*(shader as *const dyn DeviceShader as *const Shader)
    }
}

impl DeviceShader for Shader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
