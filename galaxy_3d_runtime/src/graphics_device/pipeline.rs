/// Pipeline trait and pipeline descriptor

use std::sync::Arc;
use crate::graphics_device::{Shader, BufferFormat, BindingLayout, TextureFormat};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    /// Format of the attribute
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Single per-vertex binding at slot 0 with tightly packed attributes
    /// at consecutive locations
    pub fn packed(formats: &[BufferFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    binding: 0,
                    format: *format,
                    offset,
                };
                offset += format.size_bytes();
                attribute
            })
            .collect();

        Self {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: offset,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes,
        }
    }

    /// Stride of binding 0, if declared
    pub fn stride(&self) -> Option<u32> {
        self.bindings.iter().find(|b| b.binding == 0).map(|b| b.stride)
    }
}

// ===== RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
}

impl Default for RasterizationState {
    /// No culling, clockwise front faces, solid fill
    fn default() -> Self {
        Self {
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            polygon_mode: PolygonMode::Fill,
        }
    }
}

// ===== DEPTH =====

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
        }
    }
}

// ===== COLOR BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
}

/// Color blending state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl ColorBlendState {
    /// Blending disabled
    pub fn opaque() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }

    /// `src * a + dst * (1 - a)` for color, `src + dst * (1 - a)` for alpha
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self::opaque()
    }
}

// ===== PIPELINE DESCRIPTOR =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    pub vertex_shader: Arc<dyn Shader>,
    pub pixel_shader: Arc<dyn Shader>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    /// Resource layout of binding group 0
    pub binding_layout: Arc<dyn BindingLayout>,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
    /// Samples per pixel of the color and depth targets
    pub sample_count: u32,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
}

/// Graphics pipeline trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
pub trait Pipeline: Send + Sync {
    /// Samples per pixel the pipeline was compiled for
    fn sample_count(&self) -> u32;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
