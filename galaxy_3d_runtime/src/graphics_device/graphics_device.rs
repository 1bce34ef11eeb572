/// GraphicsDevice trait - main device interface for creating resources and submitting commands

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, Texture, TextureDesc, TextureFormat, Shader, ShaderDesc,
    Pipeline, PipelineDesc, BindingLayout, BindingLayoutDesc, BindingGroup, BindingWrite,
    CommandList, QueueKind, DeviceFence, Swapchain,
};

// ============================================================================
// Device configuration
// ============================================================================

/// Which validation messages are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    File(String),
    Both(String),
}

/// Validation message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: false,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Device configuration
///
/// Validation settings only take effect when the backend is compiled with
/// validation support (`vulkan-validation` feature for the Vulkan backend).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    /// Count validation messages
    pub enable_validation_stats: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Galaxy3D Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: false,
        }
    }
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Main graphics device trait
///
/// Central factory for GPU objects and the only path to the hardware queues.
/// Implemented by backend-specific devices (e.g., VulkanGraphicsDevice) and
/// shared as `Arc<Mutex<dyn GraphicsDevice>>`.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a 2D texture (contents undefined)
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a shader module from compiled bytecode
    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a resource layout
    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    /// Create a binding group for `layout`
    ///
    /// Every write must target a slot declared in the layout with a compatible type.
    fn create_binding_group(
        &mut self,
        layout: &Arc<dyn BindingLayout>,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>>;

    /// Create a graphics pipeline
    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a command list for `queue`
    fn create_command_list(&mut self, queue: QueueKind) -> Result<Box<dyn CommandList>>;

    /// Create a fence starting at `initial_value`
    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn DeviceFence>>;

    /// Submit closed command lists to `queue`
    fn submit(&mut self, queue: QueueKind, commands: &[&dyn CommandList]) -> Result<()>;

    /// Submit closed graphics command lists that render into the swapchain's
    /// current back-buffer
    fn submit_with_swapchain(
        &mut self,
        commands: &[&dyn CommandList],
        swapchain: &dyn Swapchain,
    ) -> Result<()>;

    /// Enqueue a signal of `fence` to `value` on `queue`
    ///
    /// The value becomes completed once all previous work on the queue is done.
    fn signal(&mut self, queue: QueueKind, fence: &dyn DeviceFence, value: u64) -> Result<()>;

    /// Whether `format` can be rendered with `sample_count` samples per pixel
    fn supports_sample_count(&self, format: TextureFormat, sample_count: u32) -> bool;

    /// Required row pitch alignment of buffer-to-texture copies, in bytes
    fn copy_row_pitch_alignment(&self) -> u64 {
        256
    }

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}

/// Device shared between the resource manager and the render context
pub type SharedGraphicsDevice = Arc<Mutex<dyn GraphicsDevice>>;

/// Lock a shared device, mapping a poisoned mutex to a backend error
pub fn lock_device(device: &SharedGraphicsDevice) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device
        .lock()
        .map_err(|_| Error::BackendError("graphics device mutex poisoned".to_string()))
}
