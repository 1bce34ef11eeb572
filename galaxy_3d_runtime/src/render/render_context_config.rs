/// Render context configuration

use std::time::Duration;
use crate::sync::DEFAULT_FENCE_TIMEOUT;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContextConfig {
    pub width: u32,
    pub height: u32,
    /// Render into a 4x multisampled target resolved into the back-buffer
    pub enable_msaa_4x: bool,
    pub enable_full_screen: bool,
    /// Present with sync interval 1 instead of 0
    pub enable_v_sync: bool,
    pub clear_color: [f32; 4],
    /// Bound on every CPU fence wait
    pub fence_timeout: Duration,
}

impl Default for RenderContextConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            enable_msaa_4x: true,
            enable_full_screen: false,
            enable_v_sync: true,
            clear_color: [0.5, 0.5, 0.5, 1.0],
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
        }
    }
}

impl RenderContextConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_msaa_4x(mut self, enable: bool) -> Self {
        self.enable_msaa_4x = enable;
        self
    }

    pub fn with_full_screen(mut self, enable: bool) -> Self {
        self.enable_full_screen = enable;
        self
    }

    pub fn with_v_sync(mut self, enable: bool) -> Self {
        self.enable_v_sync = enable;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Sample count requested for the color and depth targets
    pub fn requested_sample_count(&self) -> u32 {
        if self.enable_msaa_4x { 4 } else { 1 }
    }

    /// Swapchain sync interval
    pub fn sync_interval(&self) -> u32 {
        if self.enable_v_sync { 1 } else { 0 }
    }
}
