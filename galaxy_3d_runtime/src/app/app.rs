/// Application callbacks and the host driving them
///
/// The host owns the frame state, turns winit window events into App
/// callbacks and runs one update + render per frame.

use std::time::Duration;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::app::FrameState;
use crate::error::Result;
use crate::render::{FrameStats, RenderContext};
use crate::engine_trace;

/// Application callbacks
pub trait App {
    /// Window gained (`true`) or lost (`false`) focus
    fn on_activate(&mut self, _active: bool) {}

    fn on_key_down(&mut self, _key: KeyCode) {}

    fn on_key_up(&mut self, _key: KeyCode) {}

    /// Per-frame update, before the frame is rendered
    fn update(&mut self, ctx: &mut RenderContext, state: &mut FrameState) -> Result<()>;
}

pub struct AppHost {
    app: Box<dyn App>,
    state: FrameState,
    active: bool,
}

impl AppHost {
    pub fn new(app: Box<dyn App>, aspect_ratio: f32) -> Self {
        Self {
            app,
            state: FrameState::new(aspect_ratio),
            active: true,
        }
    }

    /// Dispatch focus and keyboard events
    ///
    /// Returns whether the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::Focused(focused) => {
                self.handle_focus(*focused);
                true
            }
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => {
                    self.handle_key(code, event.state == ElementState::Pressed, event.repeat);
                    true
                }
                PhysicalKey::Unidentified(_) => false,
            },
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                self.state.set_aspect_ratio(size.width as f32 / size.height as f32);
                false
            }
            _ => false,
        }
    }

    /// Forward a key press or release; auto-repeated presses are dropped
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool, repeat: bool) {
        match (pressed, repeat) {
            (true, false) => self.app.on_key_down(key),
            (false, _) => self.app.on_key_up(key),
            (true, true) => {}
        }
    }

    pub fn handle_focus(&mut self, focused: bool) {
        if self.active != focused {
            engine_trace!("galaxy3d::AppHost", "Window {}", if focused { "activated" } else { "deactivated" });
            self.active = focused;
            self.app.on_activate(focused);
        }
    }

    /// Advance the frame state, update the app and render a frame
    pub fn frame(&mut self, ctx: &mut RenderContext, delta: Duration) -> Result<FrameStats> {
        self.state.advance(delta);
        self.app.update(ctx, &mut self.state)?;
        ctx.render_frame()
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FrameState {
        &mut self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
