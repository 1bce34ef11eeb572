/// Per-frame application state
///
/// Owned by the `AppHost` and handed to `App::update` by mutable reference.

use std::time::Duration;
use glam::{Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// Vertical field of view of the default projection
pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_2;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Frames advanced so far
    pub frame_index: u64,
    /// Time since the first frame
    pub elapsed: Duration,
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
}

impl FrameState {
    /// State looking down +Z from the origin with the default projection
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            frame_index: 0,
            elapsed: Duration::ZERO,
            delta_time: 0.0,
            view: Mat4::IDENTITY,
            projection: Self::perspective(aspect_ratio),
            camera_position: Vec3::ZERO,
        }
    }

    /// Left-handed perspective projection (90° vertical FOV, depth 0.1..100)
    pub fn perspective(aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_lh(DEFAULT_FOV_Y, aspect_ratio, DEFAULT_NEAR, DEFAULT_FAR)
    }

    /// Move to the next frame
    pub fn advance(&mut self, delta: Duration) {
        self.frame_index += 1;
        self.elapsed += delta;
        self.delta_time = delta.as_secs_f32();
    }

    /// Place the camera at `eye` looking at `target`
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.camera_position = eye;
        self.view = Mat4::look_at_lh(eye, target, up);
    }

    /// Rebuild the projection after a resize
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.projection = Self::perspective(aspect_ratio);
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Constant buffer contents for this frame
    pub fn constants(&self) -> FrameConstants {
        FrameConstants {
            view: self.view.to_cols_array_2d(),
            projection: self.projection.to_cols_array_2d(),
            view_projection: self.view_projection().to_cols_array_2d(),
            camera_position: self.camera_position.to_array(),
            time: self.elapsed.as_secs_f32(),
        }
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

/// GPU layout of the per-frame constant buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub time: f32,
}

#[cfg(test)]
#[path = "frame_state_tests.rs"]
mod tests;
