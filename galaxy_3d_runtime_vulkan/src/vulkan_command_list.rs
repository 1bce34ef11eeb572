/// CommandList - Vulkan implementation of the CommandList trait
///
/// One command pool and one primary command buffer per list, on the queue
/// family of the list's queue. Rendering uses dynamic rendering (Vulkan 1.3),
/// so no render pass or framebuffer objects are involved.

use galaxy_3d_runtime::galaxy3d::{Result, Error};
use galaxy_3d_runtime::galaxy3d::device::{
    BindingGroup as DeviceBindingGroup,
    Buffer as DeviceBuffer,
    CommandList as DeviceCommandList,
    Pipeline as DevicePipeline,
    QueueKind, Rect2D, ResourceState,
    Texture as DeviceTexture,
    TextureCopyLayout, Viewport,
};
use galaxy_3d_runtime::engine_bail;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_binding_group::BindingGroup;
use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::state_to_vk;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_texture::Texture;

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    queue: QueueKind,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside begin_rendering / end_rendering
    in_rendering: bool,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue: QueueKind) -> Result<Self> {
        let (_, queue_family) = ctx.queue(queue);

        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| vk_error("Failed to create command pool", e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(vk_error("Failed to allocate command buffer", e));
                }
            };

            Ok(Self {
                ctx,
                queue,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_rendering: false,
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// # Safety
    ///
    /// `list` must have been created by a `VulkanGraphicsDevice`.
    pub(crate) unsafe fn from_dyn(list: &dyn DeviceCommandList) -> &CommandList {
        &*(list as *const dyn DeviceCommandList as *const CommandList)
    }

    fn ensure_recording(&self, operation: &str) -> Result<()> {
        if !self.is_recording {
            engine_bail!("galaxy3d::vulkan", "{}: command list not recording", operation);
        }
        Ok(())
    }

    fn ensure_rendering(&self, operation: &str) -> Result<()> {
        self.ensure_recording(operation)?;
        if !self.in_rendering {
            engine_bail!("galaxy3d::vulkan", "{}: not inside begin_rendering", operation);
        }
        Ok(())
    }

    fn image_barrier(
        &self,
        texture: &Texture,
        before: ResourceState,
        after: ResourceState,
    ) {
        let (old_layout, src_access, src_stage) = state_to_vk(before);
        let (new_layout, dst_access, dst_stage) = state_to_vk(after);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(texture.subresource_range())
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}

impl DeviceCommandList for CommandList {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error("Failed to reset command buffer", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error("Failed to begin command buffer", e))?;
        }

        self.is_recording = true;
        self.in_rendering = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.ensure_recording("close")?;
        if self.in_rendering {
            engine_bail!("galaxy3d::vulkan", "close: rendering not ended before closing command list");
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| vk_error("Failed to end command buffer", e))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn resource_barrier(
        &mut self,
        texture: &dyn DeviceTexture,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<()> {
        self.ensure_recording("resource_barrier")?;
        let vk_texture = unsafe { Texture::from_dyn(texture) };
        self.image_barrier(vk_texture, before, after);
        Ok(())
    }

    fn copy_buffer(&mut self, src: &dyn DeviceBuffer, dst: &dyn DeviceBuffer, size: u64) -> Result<()> {
        self.ensure_recording("copy_buffer")?;
        if size > src.size() || size > dst.size() {
            engine_bail!("galaxy3d::vulkan",
                "copy_buffer: {} bytes exceeds source ({}) or destination ({}) size",
                size, src.size(), dst.size());
        }

        unsafe {
            let src = Buffer::from_dyn(src);
            let dst = Buffer::from_dyn(dst);
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            self.ctx.device.cmd_copy_buffer(self.command_buffer, src.buffer, dst.buffer, &[region]);
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn DeviceBuffer,
        dst: &dyn DeviceTexture,
        layout: TextureCopyLayout,
    ) -> Result<()> {
        self.ensure_recording("copy_buffer_to_texture")?;

        let bytes_per_pixel = dst.info().format.bytes_per_pixel() as u64;
        if layout.row_pitch % bytes_per_pixel != 0 {
            engine_bail!("galaxy3d::vulkan",
                "copy_buffer_to_texture: row pitch {} is not a multiple of the texel size {}",
                layout.row_pitch, bytes_per_pixel);
        }

        unsafe {
            let src = Buffer::from_dyn(src);
            let dst = Texture::from_dyn(dst);

            // Vulkan expresses the row pitch in texels
            let region = vk::BufferImageCopy {
                buffer_offset: layout.offset,
                buffer_row_length: (layout.row_pitch / bytes_per_pixel) as u32,
                buffer_image_height: layout.height,
                image_subresource: dst.subresource_layers(),
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: layout.width,
                    height: layout.height,
                    depth: 1,
                },
            };

            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src.buffer,
                dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording("set_viewport")?;

        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);

        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording("set_scissor")?;

        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: scissor.x, y: scissor.y })
            .extent(vk::Extent2D { width: scissor.width, height: scissor.height });

        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn begin_rendering(
        &mut self,
        color: &dyn DeviceTexture,
        depth: Option<&dyn DeviceTexture>,
        clear_color: Option<[f32; 4]>,
        clear_depth: Option<f32>,
    ) -> Result<()> {
        self.ensure_recording("begin_rendering")?;
        if self.in_rendering {
            engine_bail!("galaxy3d::vulkan", "begin_rendering: already rendering");
        }

        let info = color.info();
        if let Some(depth) = depth {
            let depth_info = depth.info();
            if depth_info.width != info.width
                || depth_info.height != info.height
                || depth_info.sample_count != info.sample_count
            {
                engine_bail!(Configuration; "galaxy3d::vulkan",
                    "begin_rendering: depth target {}x{} ({} samples) does not match color target {}x{} ({} samples)",
                    depth_info.width, depth_info.height, depth_info.sample_count,
                    info.width, info.height, info.sample_count);
            }
        }

        unsafe {
            let vk_color = Texture::from_dyn(color);
            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(vk_color.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(if clear_color.is_some() { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD })
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: clear_color.unwrap_or([0.0; 4]) },
                });
            let color_attachments = [color_attachment];

            let depth_attachment = depth.map(|depth| {
                let vk_depth = Texture::from_dyn(depth);
                vk::RenderingAttachmentInfo::default()
                    .image_view(vk_depth.view)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(if clear_depth.is_some() { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD })
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: clear_depth.unwrap_or(1.0),
                            stencil: 0,
                        },
                    })
            });

            let mut rendering_info = vk::RenderingInfo::default()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D { width: info.width, height: info.height },
                })
                .layer_count(1)
                .color_attachments(&color_attachments);
            if let Some(depth_attachment) = depth_attachment.as_ref() {
                rendering_info = rendering_info.depth_attachment(depth_attachment);
            }

            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }

        self.in_rendering = true;
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.ensure_rendering("end_rendering")?;
        unsafe {
            self.ctx.device.cmd_end_rendering(self.command_buffer);
        }
        self.in_rendering = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        self.ensure_recording("bind_pipeline")?;
        unsafe {
            let vk_pipeline = Pipeline::from_dyn(pipeline.as_ref());
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        binding_group: &Arc<dyn DeviceBindingGroup>,
    ) -> Result<()> {
        self.ensure_recording("bind_binding_group")?;
        unsafe {
            let vk_pipeline = Pipeline::from_dyn(pipeline.as_ref());
            let vk_group = BindingGroup::from_dyn(binding_group.as_ref());
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline_layout,
                0,
                &[vk_group.descriptor_set],
                &[],
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, stride: u32) -> Result<()> {
        self.ensure_recording("bind_vertex_buffer")?;
        unsafe {
            let vk_buffer = Buffer::from_dyn(buffer);
            // Stride is dynamic pipeline state (VERTEX_INPUT_BINDING_STRIDE)
            self.ctx.device.cmd_bind_vertex_buffers2(
                self.command_buffer,
                0,
                &[vk_buffer.buffer],
                &[offset],
                None,
                Some(&[stride as vk::DeviceSize]),
            );
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64) -> Result<()> {
        self.ensure_recording("bind_index_buffer")?;
        unsafe {
            let vk_buffer = Buffer::from_dyn(buffer);
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                vk::IndexType::UINT32,
            );
        }
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_rendering("draw_indexed_instanced")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn resolve_texture(&mut self, src: &dyn DeviceTexture, dst: &dyn DeviceTexture) -> Result<()> {
        self.ensure_recording("resolve_texture")?;
        if self.in_rendering {
            engine_bail!("galaxy3d::vulkan", "resolve_texture: not allowed inside begin_rendering");
        }

        let (src_info, dst_info) = (src.info(), dst.info());
        if !src_info.is_multisampled() || dst_info.is_multisampled() {
            return Err(Error::InvalidResource(format!(
                "resolve_texture: needs a multisampled source ({} samples) and a single-sampled destination ({} samples)",
                src_info.sample_count, dst_info.sample_count
            )));
        }

        unsafe {
            let vk_src = Texture::from_dyn(src);
            let vk_dst = Texture::from_dyn(dst);
            let region = vk::ImageResolve {
                src_subresource: vk_src.subresource_layers(),
                src_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                dst_subresource: vk_dst.subresource_layers(),
                dst_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                extent: vk::Extent3D {
                    width: src_info.width.min(dst_info.width),
                    height: src_info.height.min(dst_info.height),
                    depth: 1,
                },
            };

            self.ctx.device.cmd_resolve_image(
                self.command_buffer,
                vk_src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk_dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Command buffer is freed with its pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
