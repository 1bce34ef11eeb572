/// Pipeline - shaders, resource bindings and draw calls rendered together
///
/// A pipeline is configured while Unbuilt (shaders, input layout, blend mode,
/// static samplers, bound resources, draw calls), then compiled once by
/// `build`. Once Ready, its shape is frozen: only the instance count of each
/// draw call (and the contents of the constant buffers it binds) may change.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroup, Buffer, ColorBlendState, CommandList, DepthStencilState, GraphicsDevice,
    PipelineDesc, PrimitiveTopology, RasterizationState, ShaderDesc, ShaderStage, TextureFormat,
    VertexLayout,
};
use crate::graphics_device::Pipeline as DevicePipeline;
use crate::binding::{CompiledLayout, DescriptorTable, LayoutBuilder, RegionCapacities, StaticSampler};
use crate::resource::{GpuResource, ResourceKind};
use crate::shader::ShaderBlob;
use crate::{engine_bail_warn, engine_debug, engine_error};

// ===== OPTIONS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unbuilt,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    AlphaBlend,
}

impl BlendMode {
    pub fn color_blend_state(self) -> ColorBlendState {
        match self {
            BlendMode::Opaque => ColorBlendState::opaque(),
            BlendMode::AlphaBlend => ColorBlendState::alpha_blend(),
        }
    }
}

/// Descriptor table capacities and multisampling of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub read_only: u32,
    pub constant: u32,
    pub writable: u32,
    /// Render into the context's multisampled target when it has one
    pub msaa: bool,
}

impl PipelineOptions {
    pub fn new(read_only: u32, constant: u32, writable: u32, msaa: bool) -> Self {
        Self { read_only, constant, writable, msaa }
    }

    pub fn capacities(&self) -> RegionCapacities {
        RegionCapacities {
            read_only: self.read_only,
            constant: self.constant,
            writable: self.writable,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new(4, 4, 4, true)
    }
}

/// Attachments a pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTargets {
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub sample_count: u32,
}

impl Default for PipelineTargets {
    fn default() -> Self {
        Self {
            color_format: TextureFormat::R8G8B8A8_UNORM,
            depth_format: TextureFormat::D32_FLOAT,
            sample_count: 1,
        }
    }
}

// ===== DRAW CALLS =====

/// Indexed draw of one vertex/index buffer pair
#[derive(Clone)]
pub struct DrawCall {
    vertex_resource: String,
    index_resource: String,
    vertex_buffer: Arc<dyn Buffer>,
    vertex_stride: u32,
    index_buffer: Arc<dyn Buffer>,
    index_count: u32,
    instance_count: u32,
}

impl DrawCall {
    pub fn vertex_resource(&self) -> &str {
        &self.vertex_resource
    }

    pub fn index_resource(&self) -> &str {
        &self.index_resource
    }

    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }
}

impl std::fmt::Debug for DrawCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawCall")
            .field("vertex_resource", &self.vertex_resource)
            .field("index_resource", &self.index_resource)
            .field("vertex_stride", &self.vertex_stride)
            .field("index_count", &self.index_count)
            .field("instance_count", &self.instance_count)
            .finish()
    }
}

/// Device objects created by `build`
struct BuiltPipeline {
    pipeline: Arc<dyn DevicePipeline>,
    binding_group: Arc<dyn BindingGroup>,
    layout: CompiledLayout,
}

// ===== PIPELINE =====

pub struct Pipeline {
    name: String,
    options: PipelineOptions,
    vertex_shader: Option<Arc<ShaderBlob>>,
    pixel_shader: Option<Arc<ShaderBlob>>,
    input_layout: Option<VertexLayout>,
    blend_mode: BlendMode,
    table: DescriptorTable,
    samplers: Vec<StaticSampler>,
    draws: Vec<DrawCall>,
    built: Option<BuiltPipeline>,
}

impl Pipeline {
    /// Unbuilt pipeline; `Error::Configuration` when the options' capacities overflow
    pub fn new(name: &str, options: PipelineOptions) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            options,
            vertex_shader: None,
            pixel_shader: None,
            input_layout: None,
            blend_mode: BlendMode::Opaque,
            table: DescriptorTable::new(options.capacities())?,
            samplers: Vec::new(),
            draws: Vec::new(),
            built: None,
        })
    }

    fn ensure_unbuilt(&self, operation: &str) -> Result<()> {
        if self.built.is_some() {
            engine_bail_warn!(Configuration; "galaxy3d::Pipeline",
                "Pipeline '{}' is built, {} is no longer allowed", self.name, operation);
        }
        Ok(())
    }

    // ===== SETUP =====

    pub fn set_shaders(&mut self, vertex: Arc<ShaderBlob>, pixel: Arc<ShaderBlob>) -> Result<()> {
        self.ensure_unbuilt("set_shaders")?;
        if vertex.stage() != ShaderStage::Vertex || pixel.stage() != ShaderStage::Pixel {
            engine_bail_warn!(Configuration; "galaxy3d::Pipeline",
                "Pipeline '{}': expected vertex + pixel shaders, got '{}' ({:?}) + '{}' ({:?})",
                self.name, vertex.name(), vertex.stage(), pixel.name(), pixel.stage());
        }
        self.vertex_shader = Some(vertex);
        self.pixel_shader = Some(pixel);
        Ok(())
    }

    pub fn set_input_layout(&mut self, layout: VertexLayout) -> Result<()> {
        self.ensure_unbuilt("set_input_layout")?;
        self.input_layout = Some(layout);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> Result<()> {
        self.ensure_unbuilt("set_blend_mode")?;
        self.blend_mode = mode;
        Ok(())
    }

    pub fn add_static_sampler(&mut self, sampler: StaticSampler) -> Result<()> {
        self.ensure_unbuilt("add_static_sampler")?;
        self.samplers.push(sampler);
        Ok(())
    }

    pub fn bind_texture_as_read_only(&mut self, resource: &GpuResource) -> Result<u32> {
        self.ensure_unbuilt("binding a texture")?;
        self.table.bind_texture_as_read_only(resource)
    }

    pub fn bind_buffer_as_read_only(&mut self, resource: &GpuResource) -> Result<u32> {
        self.ensure_unbuilt("binding a buffer")?;
        self.table.bind_buffer_as_read_only(resource)
    }

    pub fn bind_buffer_as_constant(&mut self, resource: &GpuResource) -> Result<u32> {
        self.ensure_unbuilt("binding a constant buffer")?;
        self.table.bind_buffer_as_constant(resource)
    }

    pub fn bind_buffer_as_writable(&mut self, resource: &GpuResource) -> Result<u32> {
        self.ensure_unbuilt("binding a buffer")?;
        self.table.bind_buffer_as_writable(resource)
    }

    /// Append an indexed draw and return its position
    ///
    /// The index count is taken from the index buffer (32-bit indices).
    pub fn add_draw_call(
        &mut self,
        vertex_buffer: &GpuResource,
        index_buffer: &GpuResource,
        instance_count: u32,
    ) -> Result<usize> {
        self.ensure_unbuilt("add_draw_call")?;

        let (ResourceKind::Vertex, Some(vb), Some(stride)) =
            (vertex_buffer.kind(), vertex_buffer.buffer(), vertex_buffer.stride())
        else {
            engine_bail_warn!(InvalidResource; "galaxy3d::Pipeline",
                "Pipeline '{}': '{}' is not a vertex buffer", self.name, vertex_buffer.name());
        };
        let (ResourceKind::Index, Some(ib)) = (index_buffer.kind(), index_buffer.buffer()) else {
            engine_bail_warn!(InvalidResource; "galaxy3d::Pipeline",
                "Pipeline '{}': '{}' is not an index buffer", self.name, index_buffer.name());
        };

        self.draws.push(DrawCall {
            vertex_resource: vertex_buffer.name().to_string(),
            index_resource: index_buffer.name().to_string(),
            vertex_buffer: Arc::clone(vb),
            vertex_stride: stride,
            index_buffer: Arc::clone(ib),
            index_count: (index_buffer.size() / std::mem::size_of::<u32>() as u64) as u32,
            instance_count,
        });
        Ok(self.draws.len() - 1)
    }

    /// Change the instance count of a draw call (allowed once built)
    pub fn set_draw_instances_count(&mut self, draw: usize, instance_count: u32) -> Result<()> {
        let name = &self.name;
        match self.draws.get_mut(draw) {
            Some(call) => {
                call.instance_count = instance_count;
                Ok(())
            }
            None => {
                engine_bail_warn!(Configuration; "galaxy3d::Pipeline",
                    "Pipeline '{}' has no draw call {}", name, draw);
            }
        }
    }

    // ===== BUILD =====

    /// Compile the layout and create the device objects
    ///
    /// Building a Ready pipeline does nothing. On failure the pipeline stays
    /// Unbuilt; device loss and memory exhaustion are returned as is, any
    /// other failure as `Error::PipelineBuild`.
    pub fn build(&mut self, device: &mut dyn GraphicsDevice, targets: &PipelineTargets) -> Result<()> {
        if self.built.is_some() {
            return Ok(());
        }

        match self.create_device_objects(device, targets) {
            Ok(built) => {
                engine_debug!("galaxy3d::Pipeline",
                    "Built pipeline '{}' ({} draw call(s), {} sample(s))",
                    self.name, self.draws.len(), built.pipeline.sample_count());
                self.built = Some(built);
                Ok(())
            }
            Err(err @ (Error::DeviceLost(_) | Error::OutOfMemory)) => Err(err),
            Err(err) => {
                let reason = match err {
                    Error::Configuration(reason) => reason,
                    other => other.to_string(),
                };
                engine_error!("galaxy3d::Pipeline", "Failed to build pipeline '{}': {}", self.name, reason);
                Err(Error::PipelineBuild { pipeline: self.name.clone(), reason })
            }
        }
    }

    fn create_device_objects(
        &self,
        device: &mut dyn GraphicsDevice,
        targets: &PipelineTargets,
    ) -> Result<BuiltPipeline> {
        let fail = |reason: String| -> Result<BuiltPipeline> { Err(Error::Configuration(reason)) };

        let (Some(vs), Some(ps)) = (&self.vertex_shader, &self.pixel_shader) else {
            return fail("no shaders set".to_string());
        };
        let Some(input_layout) = &self.input_layout else {
            return fail("no input layout set".to_string());
        };
        for shader in [vs, ps] {
            if shader.code().is_empty() {
                return fail(format!("shader '{}' has no bytecode", shader.name()));
            }
        }
        for (index, draw) in self.draws.iter().enumerate() {
            if input_layout.stride() != Some(draw.vertex_stride) {
                return fail(format!(
                    "draw call {} uses '{}' with stride {}, input layout stride is {:?}",
                    index, draw.vertex_resource, draw.vertex_stride, input_layout.stride()
                ));
            }
        }

        let sample_count = if self.options.msaa {
            targets.sample_count
        } else if targets.sample_count > 1 {
            return fail(format!(
                "multisampling is disabled but the target has {} samples",
                targets.sample_count
            ));
        } else {
            1
        };

        let layout = LayoutBuilder::new(&self.table)
            .static_samplers(&self.samplers)
            .build()?;

        let vertex_shader = device.create_shader(ShaderDesc {
            code: vs.code(),
            stage: ShaderStage::Vertex,
            entry_point: vs.entry_point().to_string(),
        })?;
        let pixel_shader = device.create_shader(ShaderDesc {
            code: ps.code(),
            stage: ShaderStage::Pixel,
            entry_point: ps.entry_point().to_string(),
        })?;

        let binding_layout = device.create_binding_layout(layout.desc())?;
        let binding_group = device.create_binding_group(&binding_layout, &layout.writes(&self.table))?;

        let pipeline = device.create_pipeline(PipelineDesc {
            vertex_shader,
            pixel_shader,
            vertex_layout: input_layout.clone(),
            topology: PrimitiveTopology::TriangleList,
            binding_layout,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: self.blend_mode.color_blend_state(),
            sample_count,
            color_format: targets.color_format,
            depth_format: targets.depth_format,
        })?;

        Ok(BuiltPipeline { pipeline, binding_group, layout })
    }

    // ===== RECORDING =====

    /// Record every draw call into `cmd` and return how many were issued
    pub fn record(&self, cmd: &mut dyn CommandList) -> Result<u32> {
        let Some(built) = &self.built else {
            engine_bail_warn!(Configuration; "galaxy3d::Pipeline",
                "Pipeline '{}' must be built before it is recorded", self.name);
        };
        if self.draws.is_empty() {
            return Ok(0);
        }

        cmd.bind_pipeline(&built.pipeline)?;
        cmd.bind_binding_group(&built.pipeline, &built.binding_group)?;
        for draw in &self.draws {
            cmd.bind_vertex_buffer(draw.vertex_buffer.as_ref(), 0, draw.vertex_stride)?;
            cmd.bind_index_buffer(draw.index_buffer.as_ref(), 0)?;
            cmd.draw_indexed_instanced(draw.index_count, draw.instance_count, 0, 0, 0)?;
        }
        Ok(self.draws.len() as u32)
    }

    // ===== QUERIES =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PipelineState {
        if self.built.is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Unbuilt
        }
    }

    pub fn is_ready(&self) -> bool {
        self.built.is_some()
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn input_layout(&self) -> Option<&VertexLayout> {
        self.input_layout.as_ref()
    }

    pub fn descriptor_table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn static_samplers(&self) -> &[StaticSampler] {
        &self.samplers
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Compiled layout, once built
    pub fn layout(&self) -> Option<&CompiledLayout> {
        self.built.as_ref().map(|b| &b.layout)
    }

    /// Device pipeline, once built
    pub fn device_pipeline(&self) -> Option<&Arc<dyn DevicePipeline>> {
        self.built.as_ref().map(|b| &b.pipeline)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("options", &self.options)
            .field("draws", &self.draws)
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
