/// CommandList trait - for recording GPU commands

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Buffer, Texture, Pipeline, BindingGroup};

/// Hardware queue a command list is recorded for and submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics + present queue
    Graphics,
    /// Copy/upload queue
    Copy,
}

/// Usage state of a texture, used for barriers
///
/// The caller tracks the state of each texture and passes both ends of every
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Contents undefined (fresh allocation, or discard)
    Undefined,
    /// Generic state usable by every queue (uploaded textures rest here)
    Common,
    CopyDest,
    RenderTarget,
    DepthWrite,
    ShaderResource,
    ResolveSource,
    ResolveDest,
    Present,
}

/// Footprint of a buffer-to-texture copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyLayout {
    /// Byte offset of the first row in the source buffer
    pub offset: u64,
    /// Bytes between two rows in the source buffer (aligned)
    pub row_pitch: u64,
    pub width: u32,
    pub height: u32,
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a whole `width` x `height` target, depth 0..1
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Command list for recording GPU commands
///
/// Recording starts with `reset` and ends with `close`; a closed list is
/// submitted with `GraphicsDevice::submit`. Resetting a list the GPU may still
/// be executing is the caller's responsibility to avoid (wait on its fence).
pub trait CommandList: Send + Sync {
    /// Queue this list was created for
    fn queue(&self) -> QueueKind;

    /// Begin recording (discards previous contents)
    fn reset(&mut self) -> Result<()>;

    /// End recording
    fn close(&mut self) -> Result<()>;

    /// Transition a texture between two usage states
    fn resource_barrier(
        &mut self,
        texture: &dyn Texture,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<()>;

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()>;

    /// Copy rows from `src` into `dst` (which must be in CopyDest state)
    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        dst: &dyn Texture,
        layout: TextureCopyLayout,
    ) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Begin rendering into `color` (and `depth`)
    ///
    /// `None` clear values load the previous contents.
    fn begin_rendering(
        &mut self,
        color: &dyn Texture,
        depth: Option<&dyn Texture>,
        clear_color: Option<[f32; 4]>,
        clear_depth: Option<f32>,
    ) -> Result<()>;

    fn end_rendering(&mut self) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind the resources of `binding_group` for `pipeline`
    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()>;

    /// Bind a vertex buffer at slot 0 with an explicit element stride
    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64, stride: u32) -> Result<()>;

    /// Bind a 32-bit index buffer
    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    /// Resolve a multisampled texture (ResolveSource) into a single-sampled one (ResolveDest)
    fn resolve_texture(&mut self, src: &dyn Texture, dst: &dyn Texture) -> Result<()>;
}
