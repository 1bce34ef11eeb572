//! Tests for RenderContext
//!
//! Frames are rendered against MockGraphicsDevice / MockSwapchain and the
//! recorded command log is checked.

use super::*;
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use crate::error::Error;
use crate::graphics_device::{BufferFormat, ShaderStage, VertexLayout};
use crate::graphics_device::mock_graphics_device::{
    count_commands, CommandLog, MockGraphicsDevice, MockSwapchainControls,
};
use crate::shader::ShaderBlob;

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    mock: Arc<Mutex<MockGraphicsDevice>>,
    log: CommandLog,
    controls: MockSwapchainControls,
    ctx: RenderContext,
}

fn harness_with(mock: MockGraphicsDevice, buffer_count: usize, config: RenderContextConfig) -> Result<Harness> {
    let swapchain = mock.create_swapchain(buffer_count, 64, 48);
    let controls = swapchain.controls();
    let log = Arc::clone(&mock.log);
    let mock = Arc::new(Mutex::new(mock));
    let shared: SharedGraphicsDevice = mock.clone();
    let ctx = RenderContext::new(shared, Box::new(swapchain), config)?;
    Ok(Harness { mock, log, controls, ctx })
}

fn harness(config: RenderContextConfig) -> Harness {
    harness_with(MockGraphicsDevice::new(), 2, config).unwrap()
}

/// Commands of the last recorded frame, from its reset onwards
fn last_frame(log: &CommandLog) -> Vec<String> {
    let log = log.lock().unwrap();
    let start = log.iter().rposition(|c| c == "reset(Graphics)").unwrap();
    log[start..].to_vec()
}

fn shaders() -> (Arc<ShaderBlob>, Arc<ShaderBlob>) {
    (
        Arc::new(ShaderBlob::new("triangle.vs", ShaderStage::Vertex, vec![3, 2, 35, 7])),
        Arc::new(ShaderBlob::new("triangle.ps", ShaderStage::Pixel, vec![3, 2, 35, 7])),
    )
}

/// Upload a 3-vertex triangle and a 1x1 white texture, then set up one
/// pipeline drawing it once
fn setup_triangle(ctx: &mut RenderContext, options: PipelineOptions) {
    let vertices: [[f32; 5]; 3] = [
        [0.0, 0.5, 0.0, 0.5, 0.0],
        [0.5, -0.5, 0.0, 1.0, 1.0],
        [-0.5, -0.5, 0.0, 0.0, 1.0],
    ];

    let (resources, pipelines) = ctx.setup_mut();
    resources.create_texture("white", 1, 1, &[255, 255, 255, 255]).unwrap();
    resources.create_vertex_buffer_from("triangle_vb", &vertices).unwrap();
    resources.create_index_buffer("triangle_ib", &[0, 1, 2]).unwrap();

    let pipeline = pipelines.create("triangle", options).unwrap();
    let (vs, ps) = shaders();
    pipeline.set_shaders(vs, ps).unwrap();
    pipeline
        .set_input_layout(VertexLayout::packed(&[BufferFormat::R32G32B32_SFLOAT, BufferFormat::R32G32_SFLOAT]))
        .unwrap();
    pipeline.bind_texture_as_read_only(resources.resource("white").unwrap()).unwrap();
    pipeline
        .add_draw_call(
            resources.resource("triangle_vb").unwrap(),
            resources.resource("triangle_ib").unwrap(),
            1,
        )
        .unwrap();
}

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_requires_two_back_buffers() {
    let result = harness_with(MockGraphicsDevice::new(), 3, RenderContextConfig::default());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_msaa_enabled_when_supported() {
    let h = harness(RenderContextConfig::default());
    assert!(h.ctx.msaa_enabled());
    assert_eq!(h.ctx.sample_count(), 4);
    assert_eq!(h.ctx.color_format(), TextureFormat::R8G8B8A8_UNORM);
    assert_eq!(h.ctx.pipeline_targets().depth_format, DEPTH_FORMAT);
}

#[test]
fn test_msaa_falls_back_when_unsupported() {
    let mut mock = MockGraphicsDevice::new();
    mock.supported_sample_counts = vec![1];
    let h = harness_with(mock, 2, RenderContextConfig::default()).unwrap();
    assert!(!h.ctx.msaa_enabled());
    assert_eq!(h.ctx.sample_count(), 1);
}

#[test]
fn test_msaa_disabled_by_config() {
    let h = harness(RenderContextConfig::default().with_msaa_4x(false));
    assert_eq!(h.ctx.sample_count(), 1);
}

// ============================================================================
// END TO END
// ============================================================================

#[test]
fn test_single_triangle_frame() {
    let mut h = harness(RenderContextConfig::default());
    setup_triangle(&mut h.ctx, PipelineOptions::default());
    assert_eq!(h.ctx.build_pipelines().unwrap(), 1);

    let stats = h.ctx.render_frame().unwrap();

    assert_eq!(stats.frame_index, 0);
    assert_eq!(stats.pipelines_drawn, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(count_commands(&h.log, "draw_indexed_instanced("), 1);
    assert_eq!(count_commands(&h.log, "draw_indexed_instanced(3, 1)"), 1);
    assert_eq!(h.ctx.frame_count(), 1);
}

#[test]
fn test_new_texture_keeps_staging_until_copy_completes() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.resources_mut().create_texture("t", 2, 2, &[255u8; 16]).unwrap();

    assert_eq!(h.ctx.resources_mut().reclaim_retired().unwrap(), 0);
    assert_eq!(h.ctx.resources().staging_count(), 1);
}

#[test]
fn test_frame_reclaims_completed_uploads() {
    let mut h = harness(RenderContextConfig::default());
    setup_triangle(&mut h.ctx, PipelineOptions::default());
    h.ctx.build_pipelines().unwrap();

    // Three uploads; each waited for the previous one, so two are complete
    let stats = h.ctx.render_frame().unwrap();
    assert_eq!(stats.staging_reclaimed, 2);

    h.mock.lock().unwrap().complete_all_fences();
    let stats = h.ctx.render_frame().unwrap();
    assert_eq!(stats.staging_reclaimed, 1);
    assert_eq!(h.ctx.resources().staging_count(), 0);
}

// ============================================================================
// FRAME RECORDING
// ============================================================================

#[test]
fn test_msaa_frame_resolves_into_back_buffer() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.render_frame().unwrap();

    assert_eq!(last_frame(&h.log), vec![
        "reset(Graphics)",
        "set_viewport(64x48)",
        "set_scissor(64x48)",
        "barrier(Undefined -> RenderTarget)",
        "barrier(Undefined -> DepthWrite)",
        "begin_rendering(samples=4, depth=true)",
        "end_rendering",
        "barrier(RenderTarget -> ResolveSource)",
        "barrier(Undefined -> ResolveDest)",
        "resolve_texture(samples=4)",
        "barrier(ResolveDest -> Present)",
        "close",
        "submit_with_swapchain(1)",
        "present(1)",
        "signal(Graphics, 1)",
    ]);
}

#[test]
fn test_msaa_second_frame_starts_from_tracked_states() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.render_frame().unwrap();
    h.ctx.render_frame().unwrap();
    h.ctx.render_frame().unwrap();

    let frame = last_frame(&h.log);
    assert_eq!(frame[3], "barrier(ResolveSource -> RenderTarget)");
    assert_eq!(frame[4], "begin_rendering(samples=4, depth=true)");
    assert!(frame.contains(&"barrier(Present -> ResolveDest)".to_string()));
}

#[test]
fn test_single_sample_frame_renders_into_back_buffer() {
    let mut h = harness(RenderContextConfig::default().with_msaa_4x(false).with_v_sync(false));
    h.ctx.render_frame().unwrap();
    h.ctx.render_frame().unwrap();
    h.ctx.render_frame().unwrap();

    assert_eq!(last_frame(&h.log), vec![
        "reset(Graphics)",
        "set_viewport(64x48)",
        "set_scissor(64x48)",
        "barrier(Present -> RenderTarget)",
        "begin_rendering(samples=1, depth=true)",
        "end_rendering",
        "barrier(RenderTarget -> Present)",
        "close",
        "submit_with_swapchain(1)",
        "present(0)",
        "signal(Graphics, 3)",
    ]);
    assert_eq!(count_commands(&h.log, "resolve_texture"), 0);
}

#[test]
fn test_unbuilt_pipeline_skipped() {
    let mut h = harness(RenderContextConfig::default());
    setup_triangle(&mut h.ctx, PipelineOptions::default());

    let stats = h.ctx.render_frame().unwrap();
    assert_eq!(stats.pipelines_drawn, 0);
    assert_eq!(count_commands(&h.log, "draw_indexed_instanced"), 0);
}

#[test]
fn test_pipeline_without_draws_issues_no_draws() {
    let mut h = harness(RenderContextConfig::default());
    let pipeline = h.ctx.create_pipeline("idle", PipelineOptions::default()).unwrap();
    let (vs, ps) = shaders();
    pipeline.set_shaders(vs, ps).unwrap();
    pipeline.set_input_layout(VertexLayout::packed(&[BufferFormat::R32G32B32_SFLOAT])).unwrap();
    h.ctx.build_pipeline("idle").unwrap();

    let stats = h.ctx.render_frame().unwrap();
    assert_eq!(stats.pipelines_drawn, 1);
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(count_commands(&h.log, "draw_indexed_instanced"), 0);
}

// ============================================================================
// BACK-BUFFER INDEX
// ============================================================================

#[test]
fn test_back_buffer_index_toggles_with_present() {
    let mut h = harness(RenderContextConfig::default());
    assert_eq!(h.ctx.back_buffer_index(), 0);

    for frame in 0..4u32 {
        let stats = h.ctx.render_frame().unwrap();
        assert_eq!(stats.back_buffer_index, frame % 2);
        assert_eq!(h.ctx.back_buffer_index(), (frame + 1) % 2);
    }
}

#[test]
fn test_swapchain_index_wins_on_mismatch() {
    let mut h = harness(RenderContextConfig::default());
    *h.controls.index_override.lock().unwrap() = Some(0);

    for _ in 0..3 {
        let stats = h.ctx.render_frame().unwrap();
        assert_eq!(stats.back_buffer_index, 0);
        assert_eq!(h.ctx.back_buffer_index(), 0);
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_lost_device_on_present_is_fatal() {
    let mut h = harness(RenderContextConfig::default());
    *h.controls.present_error.lock().unwrap() = Some(Error::DeviceLost("adapter removed".to_string()));

    let err = h.ctx.render_frame().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(h.ctx.frame_count(), 0);
}

#[test]
fn test_submit_failure_propagates() {
    let mut h = harness(RenderContextConfig::default());
    h.mock.lock().unwrap().submit_error = Some(Error::BackendError("queue submit failed".to_string()));
    assert!(matches!(h.ctx.render_frame(), Err(Error::BackendError(_))));
}

#[test]
fn test_failed_submit_keeps_tracked_states() {
    let mut h = harness(RenderContextConfig::default());
    h.mock.lock().unwrap().submit_error = Some(Error::BackendError("queue submit failed".to_string()));
    assert!(h.ctx.render_frame().is_err());
    assert_eq!(h.ctx.frame_count(), 0);

    // The failed frame never reached the GPU: barriers restart from Undefined
    h.mock.lock().unwrap().submit_error = None;
    let stats = h.ctx.render_frame().unwrap();
    assert_eq!(stats.back_buffer_index, 0);

    let frame = last_frame(&h.log);
    assert_eq!(frame[3], "barrier(Undefined -> RenderTarget)");
    assert_eq!(frame[4], "barrier(Undefined -> DepthWrite)");
    assert!(frame.contains(&"barrier(Undefined -> ResolveDest)".to_string()));
    assert!(!frame.contains(&"barrier(ResolveSource -> RenderTarget)".to_string()));
}

#[test]
fn test_gpu_hang_is_recoverable() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.render_frame().unwrap();

    let hang = Arc::clone(&h.mock.lock().unwrap().hang);
    hang.store(true, Ordering::SeqCst);
    let err = h.ctx.render_frame().unwrap_err();
    assert!(matches!(err, Error::DeviceHang { value: 1, .. }));
    assert!(!err.is_fatal());

    hang.store(false, Ordering::SeqCst);
    h.ctx.render_frame().unwrap();
}

#[test]
fn test_build_unknown_pipeline() {
    let mut h = harness(RenderContextConfig::default());
    assert!(matches!(h.ctx.build_pipeline("missing"), Err(Error::Configuration(_))));
}

#[test]
fn test_single_sample_pipeline_rejected_in_msaa_context() {
    let mut h = harness(RenderContextConfig::default());
    setup_triangle(&mut h.ctx, PipelineOptions::new(4, 4, 4, false));
    assert!(matches!(h.ctx.build_pipeline("triangle"), Err(Error::PipelineBuild { .. })));
}

// ============================================================================
// RESIZE / FLUSH
// ============================================================================

#[test]
fn test_resize_to_zero_ignored() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.resize(0, 600).unwrap();
    assert_eq!(count_commands(&h.log, "resize"), 0);
}

#[test]
fn test_resize_recreates_targets() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.render_frame().unwrap();
    h.ctx.resize(128, 96).unwrap();

    assert_eq!(count_commands(&h.log, "wait_idle"), 1);
    assert_eq!(count_commands(&h.log, "resize(128x96)"), 1);
    assert_eq!((h.ctx.config().width, h.ctx.config().height), (128, 96));
    assert_eq!(h.ctx.back_buffer_index(), 0);

    h.ctx.render_frame().unwrap();
    let frame = last_frame(&h.log);
    assert_eq!(frame[1], "set_viewport(128x96)");
    assert_eq!(frame[3], "barrier(Undefined -> RenderTarget)");
    assert_eq!(frame[4], "barrier(Undefined -> DepthWrite)");
}

#[test]
fn test_flush_waits_for_frame_and_uploads() {
    let mut h = harness(RenderContextConfig::default());
    h.ctx.resources_mut().create_index_buffer("ib", &[0, 1, 2]).unwrap();
    h.ctx.render_frame().unwrap();

    h.ctx.flush().unwrap();
    assert!(h.ctx.graphics_fence().is_idle().unwrap());
    assert!(h.ctx.resources().copy_fence().is_idle().unwrap());
}
