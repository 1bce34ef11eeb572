/// Swapchain trait - for window presentation

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat};

/// Swapchain for presenting rendered images to a window
///
/// The next back-buffer is acquired as part of `present` (and at creation),
/// so `current_back_buffer_index` always names the buffer the next frame must
/// render into.
pub trait Swapchain: Send + Sync {
    /// Number of back-buffers
    fn buffer_count(&self) -> usize;

    /// Back-buffer texture at `index`
    fn back_buffer(&self, index: usize) -> Result<Arc<dyn Texture>>;

    /// Index of the back-buffer the next frame renders into
    fn current_back_buffer_index(&self) -> u32;

    /// Present the current back-buffer and acquire the next one
    ///
    /// `sync_interval` 1 waits for vertical blank, 0 presents immediately.
    fn present(&mut self, sync_interval: u32) -> Result<()>;

    /// Recreate the back-buffers at a new size
    ///
    /// The GPU must be idle. Previously returned back-buffer textures are invalid.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;
}
