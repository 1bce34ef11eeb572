/// Render context - swapchain targets, pipelines, resources and the frame loop
///
/// One frame in flight: every frame waits for the previous one on the
/// graphics fence before reusing the single frame command list. Each frame
/// records every Ready pipeline (in creation order) into the color target,
/// resolves the multisampled target into the back-buffer when MSAA is on,
/// then submits and presents.
///
/// The state of every target texture is tracked here, so barriers always
/// start from the state the texture was actually left in.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    lock_device, CommandList, QueueKind, Rect2D, ResourceState, SharedGraphicsDevice, Swapchain,
    Texture, TextureDesc, TextureFormat, TextureUsage, Viewport, GraphicsDevice,
};
use crate::pipeline::{Pipeline, PipelineOptions, PipelineRegistry, PipelineTargets};
use crate::render::RenderContextConfig;
use crate::resource::ResourceManager;
use crate::sync::Fence;
use crate::{engine_bail_warn, engine_debug, engine_info, engine_warn};

/// Format of the depth target
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_FLOAT;

/// Back-buffers owned by the swapchain
pub const BACK_BUFFER_COUNT: usize = 2;

const MSAA_SAMPLE_COUNT: u32 = 4;

/// Outcome of one `render_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// 0-based index of the rendered frame
    pub frame_index: u64,
    /// Back-buffer rendered into
    pub back_buffer_index: u32,
    pub pipelines_drawn: u32,
    pub draw_calls: u32,
    /// Upload buffers released at the end of the frame
    pub staging_reclaimed: usize,
}

/// Texture owned by the context and its current state
struct TrackedTarget {
    texture: Arc<dyn Texture>,
    state: ResourceState,
}

impl TrackedTarget {
    fn new(texture: Arc<dyn Texture>) -> Self {
        Self { texture, state: ResourceState::Undefined }
    }
}

/// Record a barrier unless the texture already is in `after`
fn transition(
    cmd: &mut dyn CommandList,
    texture: &dyn Texture,
    state: &mut ResourceState,
    after: ResourceState,
) -> Result<()> {
    if *state != after {
        cmd.resource_barrier(texture, *state, after)?;
        *state = after;
    }
    Ok(())
}

pub struct RenderContext {
    config: RenderContextConfig,
    // Fields drop in order: resources and swapchain before the device
    resources: ResourceManager,
    pipelines: PipelineRegistry,
    graphics_fence: Fence,
    command_list: Box<dyn CommandList>,
    depth: TrackedTarget,
    msaa: Option<TrackedTarget>,
    back_buffer_states: [ResourceState; BACK_BUFFER_COUNT],
    back_buffer_index: u32,
    frame_count: u64,
    sample_count: u32,
    color_format: TextureFormat,
    swapchain: Box<dyn Swapchain>,
    device: SharedGraphicsDevice,
}

impl RenderContext {
    pub fn new(
        device: SharedGraphicsDevice,
        swapchain: Box<dyn Swapchain>,
        config: RenderContextConfig,
    ) -> Result<Self> {
        if swapchain.buffer_count() != BACK_BUFFER_COUNT {
            engine_bail_warn!(Configuration; "galaxy3d::RenderContext",
                "Swapchain has {} back-buffers, {} required", swapchain.buffer_count(), BACK_BUFFER_COUNT);
        }

        let color_format = swapchain.format();
        let (width, height) = (swapchain.width(), swapchain.height());

        let (sample_count, graphics_fence, command_list, depth, msaa) = {
            let mut guard = lock_device(&device)?;
            let sample_count = if !config.enable_msaa_4x {
                1
            } else if guard.supports_sample_count(color_format, MSAA_SAMPLE_COUNT)
                && guard.supports_sample_count(DEPTH_FORMAT, MSAA_SAMPLE_COUNT)
            {
                MSAA_SAMPLE_COUNT
            } else {
                engine_warn!("galaxy3d::RenderContext",
                    "{}x MSAA not supported for {:?}, rendering without multisampling",
                    MSAA_SAMPLE_COUNT, color_format);
                1
            };

            let graphics_fence = Fence::new(&mut *guard, "graphics", QueueKind::Graphics, config.fence_timeout)?;
            let command_list = guard.create_command_list(QueueKind::Graphics)?;
            let (depth, msaa) = Self::create_targets(&mut *guard, width, height, color_format, sample_count)?;
            (sample_count, graphics_fence, command_list, depth, msaa)
        };

        let resources = ResourceManager::new(Arc::clone(&device), config.fence_timeout)?;
        let back_buffer_index = swapchain.current_back_buffer_index();

        engine_info!("galaxy3d::RenderContext",
            "Render context created ({}x{}, {:?}, {} sample(s))", width, height, color_format, sample_count);

        Ok(Self {
            config,
            resources,
            pipelines: PipelineRegistry::new(),
            graphics_fence,
            command_list,
            depth,
            msaa,
            back_buffer_states: [ResourceState::Undefined; BACK_BUFFER_COUNT],
            back_buffer_index,
            frame_count: 0,
            sample_count,
            color_format,
            swapchain,
            device,
        })
    }

    /// Depth target and, when multisampling, the multisampled color target
    fn create_targets(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        color_format: TextureFormat,
        sample_count: u32,
    ) -> Result<(TrackedTarget, Option<TrackedTarget>)> {
        let depth = device.create_texture(TextureDesc {
            width,
            height,
            format: DEPTH_FORMAT,
            usage: TextureUsage::DepthStencil,
            sample_count,
        })?;
        let msaa = if sample_count > 1 {
            Some(TrackedTarget::new(device.create_texture(TextureDesc {
                width,
                height,
                format: color_format,
                usage: TextureUsage::RenderTarget,
                sample_count,
            })?))
        } else {
            None
        };
        Ok((TrackedTarget::new(depth), msaa))
    }

    // ===== PIPELINES =====

    /// Create (or replace) an Unbuilt pipeline
    pub fn create_pipeline(&mut self, name: &str, options: PipelineOptions) -> Result<&mut Pipeline> {
        self.pipelines.create(name, options)
    }

    pub fn pipeline_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(name)
    }

    /// Resource manager and pipeline registry borrowed together, to bind
    /// resources while setting up pipelines
    pub fn setup_mut(&mut self) -> (&mut ResourceManager, &mut PipelineRegistry) {
        (&mut self.resources, &mut self.pipelines)
    }

    /// Attachments every pipeline renders into
    pub fn pipeline_targets(&self) -> PipelineTargets {
        PipelineTargets {
            color_format: self.color_format,
            depth_format: DEPTH_FORMAT,
            sample_count: self.sample_count,
        }
    }

    /// Build one pipeline against the context's targets
    pub fn build_pipeline(&mut self, name: &str) -> Result<()> {
        let targets = self.pipeline_targets();
        let device = Arc::clone(&self.device);
        let Some(pipeline) = self.pipelines.get_mut(name) else {
            engine_bail_warn!(Configuration; "galaxy3d::RenderContext", "Unknown pipeline '{}'", name);
        };
        let mut device = lock_device(&device)?;
        pipeline.build(&mut *device, &targets)
    }

    /// Build every Unbuilt pipeline, stopping at the first failure
    ///
    /// Returns how many pipelines were built.
    pub fn build_pipelines(&mut self) -> Result<usize> {
        let unbuilt: Vec<String> = self
            .pipelines
            .iter()
            .filter(|p| !p.is_ready())
            .map(|p| p.name().to_string())
            .collect();
        for name in &unbuilt {
            self.build_pipeline(name)?;
        }
        Ok(unbuilt.len())
    }

    // ===== FRAME =====

    /// Record, submit and present one frame
    pub fn render_frame(&mut self) -> Result<FrameStats> {
        self.graphics_fence.wait()?;
        self.sync_back_buffer_index();

        let index = self.back_buffer_index;
        let back_buffer = self.swapchain.back_buffer(index as usize)?;
        let (width, height) = (self.swapchain.width(), self.swapchain.height());
        let cmd = self.command_list.as_mut();

        cmd.reset()?;
        cmd.set_viewport(Viewport::full(width, height))?;
        cmd.set_scissor(Rect2D::full(width, height))?;

        // Target states are committed only once the frame is submitted
        let mut bb_state = self.back_buffer_states[index as usize];
        let mut msaa_state = self.msaa.as_ref().map(|msaa| msaa.state);
        let mut depth_state = self.depth.state;

        // Color target
        let color: &dyn Texture = match (&self.msaa, msaa_state.as_mut()) {
            (Some(msaa), Some(state)) => {
                transition(cmd, msaa.texture.as_ref(), state, ResourceState::RenderTarget)?;
                msaa.texture.as_ref()
            }
            _ => {
                transition(cmd, back_buffer.as_ref(), &mut bb_state, ResourceState::RenderTarget)?;
                back_buffer.as_ref()
            }
        };
        transition(cmd, self.depth.texture.as_ref(), &mut depth_state, ResourceState::DepthWrite)?;
        cmd.begin_rendering(color, Some(self.depth.texture.as_ref()), Some(self.config.clear_color), Some(1.0))?;

        let mut pipelines_drawn = 0;
        let mut draw_calls = 0;
        for pipeline in self.pipelines.iter() {
            if !pipeline.is_ready() {
                engine_warn!("galaxy3d::RenderContext", "Pipeline '{}' is not built, skipped", pipeline.name());
                continue;
            }
            draw_calls += pipeline.record(cmd)?;
            pipelines_drawn += 1;
        }

        cmd.end_rendering()?;

        // Resolve / present transition
        match (&self.msaa, msaa_state.as_mut()) {
            (Some(msaa), Some(state)) => {
                transition(cmd, msaa.texture.as_ref(), state, ResourceState::ResolveSource)?;
                transition(cmd, back_buffer.as_ref(), &mut bb_state, ResourceState::ResolveDest)?;
                cmd.resolve_texture(msaa.texture.as_ref(), back_buffer.as_ref())?;
                transition(cmd, back_buffer.as_ref(), &mut bb_state, ResourceState::Present)?;
            }
            _ => {
                transition(cmd, back_buffer.as_ref(), &mut bb_state, ResourceState::Present)?;
            }
        }
        cmd.close()?;

        {
            let device = Arc::clone(&self.device);
            let mut device = lock_device(&device)?;
            device.submit_with_swapchain(&[self.command_list.as_ref()], self.swapchain.as_ref())?;

            self.back_buffer_states[index as usize] = bb_state;
            self.depth.state = depth_state;
            if let (Some(msaa), Some(state)) = (self.msaa.as_mut(), msaa_state) {
                msaa.state = state;
            }

            self.swapchain.present(self.config.sync_interval())?;
            self.graphics_fence.signal(&mut *device)?;
        }

        self.advance_back_buffer_index();
        let frame_index = self.frame_count;
        self.frame_count += 1;
        let staging_reclaimed = self.resources.reclaim_retired()?;

        Ok(FrameStats {
            frame_index,
            back_buffer_index: index,
            pipelines_drawn,
            draw_calls,
            staging_reclaimed,
        })
    }

    /// Toggle the back-buffer index after a present
    fn advance_back_buffer_index(&mut self) {
        self.back_buffer_index ^= 1;
        self.sync_back_buffer_index();
    }

    /// Adopt the swapchain's back-buffer index if ours drifted
    fn sync_back_buffer_index(&mut self) {
        let reported = self.swapchain.current_back_buffer_index();
        if reported != self.back_buffer_index {
            engine_warn!("galaxy3d::RenderContext",
                "Back-buffer index {} does not match swapchain index {}, using the swapchain's",
                self.back_buffer_index, reported);
            self.back_buffer_index = reported;
        }
    }

    // ===== RESIZE / FLUSH =====

    /// Resize the swapchain and recreate the depth and multisampled targets
    ///
    /// A zero width or height (minimized window) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_debug!("galaxy3d::RenderContext", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.flush()?;
        let device = Arc::clone(&self.device);
        let mut device = lock_device(&device)?;
        device.wait_idle()?;

        self.swapchain.resize(width, height)?;
        let (depth, msaa) = Self::create_targets(
            &mut *device,
            self.swapchain.width(),
            self.swapchain.height(),
            self.color_format,
            self.sample_count,
        )?;
        self.depth = depth;
        self.msaa = msaa;
        self.back_buffer_states = [ResourceState::Undefined; BACK_BUFFER_COUNT];
        self.back_buffer_index = self.swapchain.current_back_buffer_index();
        self.config.width = self.swapchain.width();
        self.config.height = self.swapchain.height();

        engine_info!("galaxy3d::RenderContext", "Resized to {}x{}", self.config.width, self.config.height);
        Ok(())
    }

    /// Wait for the last frame and every upload
    pub fn flush(&mut self) -> Result<()> {
        self.graphics_fence.wait()?;
        self.resources.wait_for_uploads()
    }

    // ===== QUERIES =====

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn device(&self) -> &SharedGraphicsDevice {
        &self.device
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn msaa_enabled(&self) -> bool {
        self.sample_count > 1
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn color_format(&self) -> TextureFormat {
        self.color_format
    }

    pub fn config(&self) -> &RenderContextConfig {
        &self.config
    }

    pub fn graphics_fence(&self) -> &Fence {
        &self.graphics_fence
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            engine_warn!("galaxy3d::RenderContext", "Flush on drop failed: {}", err);
        }
    }
}

#[cfg(test)]
#[path = "render_context_tests.rs"]
mod tests;
