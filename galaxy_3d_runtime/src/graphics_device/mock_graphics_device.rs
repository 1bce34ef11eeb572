/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every recorded command, submission, signal and present is appended to a
/// shared string log so tests can assert on the exact GPU traffic. Fences
/// complete lazily: a signaled value only becomes completed when something
/// waits for it (or `complete_all_fences` is called), which makes staging
/// retirement deterministic.

use std::sync::{Arc, Mutex, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDesc, BufferUsage, MemoryLocation, Texture, TextureDesc,
    TextureInfo, TextureFormat, TextureUsage, Shader, ShaderDesc, ShaderStage, Pipeline,
    PipelineDesc, BindingLayout, BindingLayoutDesc, BindingGroup, BindingWrite, CommandList,
    QueueKind, ResourceState, TextureCopyLayout, Viewport, Rect2D, DeviceFence, Swapchain,
};

/// Shared command log
pub type CommandLog = Arc<Mutex<Vec<String>>>;

fn push(log: &CommandLog, entry: String) {
    log.lock().unwrap().push(entry);
}

/// Number of log entries starting with `prefix`
pub fn count_commands(log: &CommandLog, prefix: &str) -> usize {
    log.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub usage: BufferUsage,
    location: MemoryLocation,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage, location: MemoryLocation) -> Self {
        Self {
            usage,
            location,
            data: Mutex::new(vec![0; size as usize]),
        }
    }

    /// Copy of the current contents
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn memory_location(&self) -> MemoryLocation {
        self.location
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.location.is_cpu_writable() {
            return Err(Error::InvalidResource("buffer is not CPU-writable".to_string()));
        }
        let mut contents = self.data.lock().unwrap();
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds buffer size {}",
                data.len(), offset, contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }
}

// ============================================================================
// Mock Texture / Shader / Layout / Group / Pipeline
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
}

impl MockTexture {
    pub fn new(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            info: TextureInfo { width, height, format, usage, sample_count: 1 },
        }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct MockShader {
    pub stage: ShaderStage,
    pub code_len: usize,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

#[derive(Debug)]
pub struct MockBindingLayout {
    pub desc: BindingLayoutDesc,
}

impl BindingLayout for MockBindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct MockBindingGroup {
    pub count: usize,
}

impl BindingGroup for MockBindingGroup {
    fn binding_count(&self) -> usize {
        self.count
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub sample_count: u32,
    pub color_format: TextureFormat,
}

impl Pipeline for MockPipeline {
    fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

// ============================================================================
// Mock Fence
// ============================================================================

#[derive(Debug)]
pub struct MockFence {
    completed: AtomicU64,
    pending: AtomicU64,
    hang: Arc<AtomicBool>,
}

impl MockFence {
    fn new(initial_value: u64, hang: Arc<AtomicBool>) -> Self {
        Self {
            completed: AtomicU64::new(initial_value),
            pending: AtomicU64::new(initial_value),
            hang,
        }
    }

    /// Highest value signaled so far
    pub fn pending_value(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Let the "GPU" finish everything signaled so far
    pub fn complete_all(&self) {
        self.completed.store(self.pending_value(), Ordering::SeqCst);
    }
}

impl DeviceFence for MockFence {
    fn completed_value(&self) -> Result<u64> {
        Ok(self.completed.load(Ordering::SeqCst))
    }

    fn wait(&self, value: u64, _timeout: Duration) -> Result<bool> {
        if self.completed.load(Ordering::SeqCst) >= value {
            return Ok(true);
        }
        if self.hang.load(Ordering::SeqCst) || self.pending_value() < value {
            return Ok(false);
        }
        self.complete_all();
        Ok(true)
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    queue: QueueKind,
    log: CommandLog,
    recording: bool,
}

impl MockCommandList {
    pub fn new(queue: QueueKind, log: CommandLog) -> Self {
        Self { queue, log, recording: false }
    }

    fn record(&mut self, command: String) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError(format!("'{}' recorded outside reset/close", command)));
        }
        push(&self.log, command);
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn reset(&mut self) -> Result<()> {
        self.recording = true;
        push(&self.log, format!("reset({:?})", self.queue));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.record("close".to_string())?;
        self.recording = false;
        Ok(())
    }

    fn resource_barrier(&mut self, _texture: &dyn Texture, before: ResourceState, after: ResourceState) -> Result<()> {
        self.record(format!("barrier({:?} -> {:?})", before, after))
    }

    fn copy_buffer(&mut self, _src: &dyn Buffer, _dst: &dyn Buffer, size: u64) -> Result<()> {
        self.record(format!("copy_buffer({})", size))
    }

    fn copy_buffer_to_texture(&mut self, _src: &dyn Buffer, _dst: &dyn Texture, layout: TextureCopyLayout) -> Result<()> {
        self.record(format!(
            "copy_buffer_to_texture(row_pitch={}, {}x{})",
            layout.row_pitch, layout.width, layout.height
        ))
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(format!("set_viewport({}x{})", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!("set_scissor({}x{})", scissor.width, scissor.height))
    }

    fn begin_rendering(
        &mut self,
        color: &dyn Texture,
        depth: Option<&dyn Texture>,
        _clear_color: Option<[f32; 4]>,
        _clear_depth: Option<f32>,
    ) -> Result<()> {
        self.record(format!(
            "begin_rendering(samples={}, depth={})",
            color.info().sample_count,
            depth.is_some()
        ))
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.record("end_rendering".to_string())
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.record("bind_pipeline".to_string())
    }

    fn bind_binding_group(&mut self, _pipeline: &Arc<dyn Pipeline>, group: &Arc<dyn BindingGroup>) -> Result<()> {
        self.record(format!("bind_binding_group({})", group.binding_count()))
    }

    fn bind_vertex_buffer(&mut self, _buffer: &dyn Buffer, _offset: u64, stride: u32) -> Result<()> {
        self.record(format!("bind_vertex_buffer(stride={})", stride))
    }

    fn bind_index_buffer(&mut self, _buffer: &dyn Buffer, _offset: u64) -> Result<()> {
        self.record("bind_index_buffer".to_string())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.record(format!("draw_indexed_instanced({}, {})", index_count, instance_count))
    }

    fn resolve_texture(&mut self, src: &dyn Texture, _dst: &dyn Texture) -> Result<()> {
        self.record(format!("resolve_texture(samples={})", src.info().sample_count))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

/// Knobs shared with a MockSwapchain after it was moved into a RenderContext
#[derive(Clone, Default)]
pub struct MockSwapchainControls {
    /// Index reported instead of the real one
    pub index_override: Arc<Mutex<Option<u32>>>,
    /// Error returned by the next presents
    pub present_error: Arc<Mutex<Option<Error>>>,
}

pub struct MockSwapchain {
    buffers: Vec<Arc<dyn Texture>>,
    index: u32,
    width: u32,
    height: u32,
    format: TextureFormat,
    log: CommandLog,
    controls: MockSwapchainControls,
}

impl MockSwapchain {
    pub fn new(buffer_count: usize, width: u32, height: u32, format: TextureFormat, log: CommandLog) -> Self {
        Self {
            buffers: Self::make_buffers(buffer_count, width, height, format),
            index: 0,
            width,
            height,
            format,
            log,
            controls: MockSwapchainControls::default(),
        }
    }

    pub fn controls(&self) -> MockSwapchainControls {
        self.controls.clone()
    }

    fn make_buffers(count: usize, width: u32, height: u32, format: TextureFormat) -> Vec<Arc<dyn Texture>> {
        (0..count)
            .map(|_| Arc::new(MockTexture::new(width, height, format, TextureUsage::Present)) as Arc<dyn Texture>)
            .collect()
    }
}

impl Swapchain for MockSwapchain {
    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn back_buffer(&self, index: usize) -> Result<Arc<dyn Texture>> {
        self.buffers
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("no back-buffer {}", index)))
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.controls.index_override.lock().unwrap().unwrap_or(self.index)
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        push(&self.log, format!("present({})", sync_interval));
        if let Some(err) = self.controls.present_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.index = (self.index + 1) % self.buffers.len() as u32;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        push(&self.log, format!("resize({}x{})", width, height));
        self.width = width;
        self.height = height;
        self.buffers = Self::make_buffers(self.buffers.len(), width, height, self.format);
        self.index = 0;
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    pub log: CommandLog,
    /// Sample counts reported as supported (1 and 4 by default)
    pub supported_sample_counts: Vec<u32>,
    /// Make `create_pipeline` fail with a backend error
    pub fail_pipeline_creation: bool,
    /// Error returned by the next submissions
    pub submit_error: Option<Error>,
    /// Fences never complete while set
    pub hang: Arc<AtomicBool>,
    buffers: Vec<Weak<MockBuffer>>,
    fences: Vec<Arc<MockFence>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            supported_sample_counts: vec![1, 4],
            fail_pipeline_creation: false,
            submit_error: None,
            hang: Arc::new(AtomicBool::new(false)),
            buffers: Vec::new(),
            fences: Vec::new(),
        }
    }

    /// Buffers created by this device that are still alive
    pub fn live_buffers(&self) -> Vec<Arc<MockBuffer>> {
        self.buffers.iter().filter_map(Weak::upgrade).collect()
    }

    /// Alive buffers in `location`
    pub fn live_buffer_count(&self, location: MemoryLocation) -> usize {
        self.live_buffers().iter().filter(|b| b.location == location).count()
    }

    pub fn complete_all_fences(&self) {
        for fence in &self.fences {
            fence.complete_all();
        }
    }

    /// Swapchain sharing this device's log
    pub fn create_swapchain(&self, buffer_count: usize, width: u32, height: u32) -> MockSwapchain {
        MockSwapchain::new(buffer_count, width, height, TextureFormat::R8G8B8A8_UNORM, Arc::clone(&self.log))
    }

    fn check_submit(&self) -> Result<()> {
        match &self.submit_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let buffer = Arc::new(MockBuffer::new(desc.size, desc.usage, desc.memory));
        self.buffers.push(Arc::downgrade(&buffer));
        Ok(buffer)
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("zero-sized texture".to_string()));
        }
        Ok(Arc::new(MockTexture { info: TextureInfo::from(&desc) }))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(MockShader { stage: desc.stage, code_len: desc.code.len() }))
    }

    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        Ok(Arc::new(MockBindingLayout { desc: desc.clone() }))
    }

    fn create_binding_group(
        &mut self,
        layout: &Arc<dyn BindingLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>> {
        for write in writes {
            let entry = layout.desc().entry(write.binding).ok_or_else(|| {
                Error::InvalidResource(format!("binding {} not in layout", write.binding))
            })?;
            if !write.resource.is_compatible(entry.binding_type) {
                return Err(Error::InvalidResource(format!(
                    "binding {} expects {:?}",
                    write.binding, entry.binding_type
                )));
            }
        }
        Ok(Arc::new(MockBindingGroup { count: writes.len() }))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        if self.fail_pipeline_creation {
            return Err(Error::BackendError("mock pipeline creation failure".to_string()));
        }
        push(&self.log, format!("create_pipeline(samples={})", desc.sample_count));
        Ok(Arc::new(MockPipeline {
            sample_count: desc.sample_count,
            color_format: desc.color_format,
        }))
    }

    fn create_command_list(&mut self, queue: QueueKind) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(queue, Arc::clone(&self.log))))
    }

    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn DeviceFence>> {
        let fence = Arc::new(MockFence::new(initial_value, Arc::clone(&self.hang)));
        self.fences.push(Arc::clone(&fence));
        Ok(fence)
    }

    fn submit(&mut self, queue: QueueKind, commands: &[&dyn CommandList]) -> Result<()> {
        self.check_submit()?;
        push(&self.log, format!("submit({:?}, {})", queue, commands.len()));
        Ok(())
    }

    fn submit_with_swapchain(&mut self, commands: &[&dyn CommandList], _swapchain: &dyn Swapchain) -> Result<()> {
        self.check_submit()?;
        push(&self.log, format!("submit_with_swapchain({})", commands.len()));
        Ok(())
    }

    fn signal(&mut self, queue: QueueKind, fence: &dyn DeviceFence, value: u64) -> Result<()> {
        let target = fence as *const dyn DeviceFence;
        let fence = self
            .fences
            .iter()
            .find(|f| std::ptr::addr_eq(Arc::as_ptr(f), target))
            .ok_or_else(|| Error::BackendError("fence not created by this device".to_string()))?;
        fence.pending.fetch_max(value, Ordering::SeqCst);
        push(&self.log, format!("signal({:?}, {})", queue, value));
        Ok(())
    }

    fn supports_sample_count(&self, _format: TextureFormat, sample_count: u32) -> bool {
        self.supported_sample_counts.contains(&sample_count)
    }

    fn wait_idle(&self) -> Result<()> {
        self.complete_all_fences();
        push(&self.log, "wait_idle".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
