//! Tests for VulkanGraphicsDevice
//!
//! These tests verify that VulkanGraphicsDevice correctly implements the GraphicsDevice trait.
//! All tests require a GPU and are marked with #[ignore]; they share one device
//! (one window, one surface) for the whole process.
//!
//! Run with: cargo test --test vulkan_graphics_device_tests -- --ignored

use galaxy_3d_runtime::galaxy3d::Error;
use galaxy_3d_runtime::galaxy3d::device::{
    AddressMode, BindingLayoutDesc, BindingResource, BindingSlotDesc, BindingType, BindingWrite,
    BufferDesc, BufferUsage, DeviceConfig, Filter, GraphicsDevice, MemoryLocation, QueueKind,
    ResourceState, ShaderDesc, ShaderStage, ShaderStageFlags, StaticSamplerDesc, TextureCopyLayout,
    TextureDesc, TextureFormat, TextureUsage,
};
use galaxy_3d_runtime_vulkan::VulkanGraphicsDevice;
use serial_test::serial;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use winit::event_loop::EventLoop;
use winit::window::Window;

#[cfg(all(unix, not(target_os = "macos")))]
use winit::platform::x11::EventLoopBuilderExtX11;
#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;

struct TestGpu {
    window: Window,
    device: Mutex<VulkanGraphicsDevice>,
}

static TEST_GPU: OnceLock<TestGpu> = OnceLock::new();

/// Shared device; the event loop is leaked to keep the window valid
fn gpu() -> &'static TestGpu {
    TEST_GPU.get_or_init(|| {
        let mut builder = EventLoop::builder();
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        builder.with_any_thread(true);
        let event_loop = builder.build().unwrap();

        #[allow(deprecated)]
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Vulkan GraphicsDevice Test")
                    .with_inner_size(winit::dpi::PhysicalSize::new(320, 240))
                    .with_visible(false),
            )
            .unwrap();

        let device = VulkanGraphicsDevice::new(&window, DeviceConfig::default())
            .expect("Failed to create VulkanGraphicsDevice for tests");
        std::mem::forget(event_loop);

        TestGpu { window, device: Mutex::new(device) }
    })
}

fn device() -> MutexGuard<'static, VulkanGraphicsDevice> {
    gpu().device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn upload_buffer(device: &mut VulkanGraphicsDevice, size: u64) -> std::sync::Arc<dyn galaxy_3d_runtime::galaxy3d::device::Buffer> {
    device
        .create_buffer(BufferDesc { size, usage: BufferUsage::Staging, memory: MemoryLocation::Upload })
        .unwrap()
}

// ============================================================================
// DEVICE QUERIES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_limits() {
    let device = device();
    assert!(device.copy_row_pitch_alignment() >= 256);
    assert!(device.supports_sample_count(TextureFormat::R8G8B8A8_UNORM, 1));
    assert!(!device.supports_sample_count(TextureFormat::R8G8B8A8_UNORM, 3));
    device.wait_idle().unwrap();
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_buffers() {
    let mut device = device();

    let vertex = device
        .create_buffer(BufferDesc { size: 1024, usage: BufferUsage::Vertex, memory: MemoryLocation::DeviceLocal })
        .unwrap();
    assert_eq!(vertex.size(), 1024);
    assert_eq!(vertex.memory_location(), MemoryLocation::DeviceLocal);

    let constants = device
        .create_buffer(BufferDesc { size: 256, usage: BufferUsage::Uniform, memory: MemoryLocation::HostVisible })
        .unwrap();
    constants.update(0, &[1u8; 256]).unwrap();
    constants.update(128, &[2u8; 128]).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_buffer_update_out_of_range() {
    let mut device = device();
    let buffer = upload_buffer(&mut device, 64);

    let result = buffer.update(32, &[0u8; 64]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_local_buffer_not_writable() {
    let mut device = device();
    let buffer = device
        .create_buffer(BufferDesc { size: 64, usage: BufferUsage::Index, memory: MemoryLocation::DeviceLocal })
        .unwrap();

    // Device-local memory may still be host-visible on integrated GPUs
    if let Err(error) = buffer.update(0, &[0u8; 4]) {
        assert!(matches!(error, Error::InvalidResource(_)));
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_zero_size_buffer_rejected() {
    let mut device = device();
    let result = device.create_buffer(BufferDesc { size: 0, usage: BufferUsage::Storage, memory: MemoryLocation::DeviceLocal });
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// TEXTURES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_textures() {
    let mut device = device();

    let texture = device
        .create_texture(TextureDesc {
            width: 256,
            height: 128,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::Sampled,
            sample_count: 1,
        })
        .unwrap();
    assert_eq!(texture.info().width, 256);
    assert_eq!(texture.info().height, 128);
    assert_eq!(texture.info().format, TextureFormat::R8G8B8A8_UNORM);

    let depth = device
        .create_texture(TextureDesc {
            width: 64,
            height: 64,
            format: TextureFormat::D32_FLOAT,
            usage: TextureUsage::DepthStencil,
            sample_count: 1,
        })
        .unwrap();
    assert!(depth.info().format.is_depth());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_multisampled_target() {
    let mut device = device();
    if !device.supports_sample_count(TextureFormat::B8G8R8A8_UNORM, 4) {
        return;
    }

    let target = device
        .create_texture(TextureDesc {
            width: 64,
            height: 64,
            format: TextureFormat::B8G8R8A8_UNORM,
            usage: TextureUsage::RenderTarget,
            sample_count: 4,
        })
        .unwrap();
    assert!(target.info().is_multisampled());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_invalid_textures_rejected() {
    let mut device = device();

    let present = device.create_texture(TextureDesc {
        width: 16,
        height: 16,
        format: TextureFormat::B8G8R8A8_UNORM,
        usage: TextureUsage::Present,
        sample_count: 1,
    });
    assert!(matches!(present, Err(Error::InvalidResource(_))));

    let color_as_depth = device.create_texture(TextureDesc {
        width: 16,
        height: 16,
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::DepthStencil,
        sample_count: 1,
    });
    assert!(matches!(color_as_depth, Err(Error::InvalidResource(_))));
}

// ============================================================================
// SHADERS AND BINDINGS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_invalid_shader_code_rejected() {
    let mut device = device();

    let unaligned = device.create_shader(ShaderDesc { code: &[1, 2, 3], stage: ShaderStage::Vertex, entry_point: "main".to_string() });
    assert!(matches!(unaligned, Err(Error::InvalidResource(_))));

    let not_spirv = device.create_shader(ShaderDesc { code: &[0u8; 16], stage: ShaderStage::Pixel, entry_point: "main".to_string() });
    assert!(matches!(not_spirv, Err(Error::InvalidResource(_))));
}

fn texture_layout_desc() -> BindingLayoutDesc {
    BindingLayoutDesc {
        entries: vec![
            BindingSlotDesc { binding: 0, binding_type: BindingType::UniformBuffer, stage_flags: ShaderStageFlags::ALL_GRAPHICS },
            BindingSlotDesc { binding: 1, binding_type: BindingType::SampledTexture, stage_flags: ShaderStageFlags::PIXEL },
        ],
        static_samplers: vec![StaticSamplerDesc {
            binding: 2,
            filter: Filter::Linear,
            address_mode: AddressMode::Wrap,
            stage_flags: ShaderStageFlags::PIXEL,
        }],
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_binding_group() {
    let mut device = device();
    let layout = device.create_binding_layout(&texture_layout_desc()).unwrap();
    assert_eq!(layout.desc().entries.len(), 2);

    let constants = device
        .create_buffer(BufferDesc { size: 256, usage: BufferUsage::Uniform, memory: MemoryLocation::HostVisible })
        .unwrap();
    let texture = device
        .create_texture(TextureDesc {
            width: 1,
            height: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::Sampled,
            sample_count: 1,
        })
        .unwrap();

    let group = device
        .create_binding_group(&layout, &[
            BindingWrite { binding: 0, resource: BindingResource::UniformBuffer(constants.as_ref(), 64) },
            BindingWrite { binding: 1, resource: BindingResource::SampledTexture(texture.as_ref()) },
        ])
        .unwrap();
    assert_eq!(group.binding_count(), 2);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_binding_errors() {
    let mut device = device();

    let mut duplicate = texture_layout_desc();
    duplicate.static_samplers[0].binding = 1;
    assert!(matches!(device.create_binding_layout(&duplicate), Err(Error::Configuration(_))));

    let layout = device.create_binding_layout(&texture_layout_desc()).unwrap();
    let storage = device
        .create_buffer(BufferDesc { size: 64, usage: BufferUsage::Storage, memory: MemoryLocation::DeviceLocal })
        .unwrap();

    let undeclared = device.create_binding_group(&layout, &[
        BindingWrite { binding: 7, resource: BindingResource::StorageBuffer(storage.as_ref()) },
    ]);
    assert!(matches!(undeclared, Err(Error::Configuration(_))));

    let mismatched = device.create_binding_group(&layout, &[
        BindingWrite { binding: 0, resource: BindingResource::StorageBuffer(storage.as_ref()) },
    ]);
    assert!(matches!(mismatched, Err(Error::Configuration(_))));
}

// ============================================================================
// FENCES AND SUBMISSION
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_fence_signal_and_wait() {
    let mut device = device();
    let fence = device.create_fence(5).unwrap();
    assert_eq!(fence.completed_value().unwrap(), 5);

    device.signal(QueueKind::Graphics, fence.as_ref(), 6).unwrap();
    assert!(fence.wait(6, Duration::from_secs(5)).unwrap());
    assert_eq!(fence.completed_value().unwrap(), 6);

    // Never signaled: times out
    assert!(!fence.wait(100, Duration::from_millis(10)).unwrap());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_copy_queue_upload() {
    let mut device = device();
    let alignment = device.copy_row_pitch_alignment();

    let staging = upload_buffer(&mut device, alignment * 2);
    staging.update(0, &vec![255u8; (alignment * 2) as usize]).unwrap();
    let texture = device
        .create_texture(TextureDesc {
            width: 2,
            height: 2,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::Sampled,
            sample_count: 1,
        })
        .unwrap();
    let vertices = device
        .create_buffer(BufferDesc { size: 128, usage: BufferUsage::Vertex, memory: MemoryLocation::DeviceLocal })
        .unwrap();

    let mut copy = device.create_command_list(QueueKind::Copy).unwrap();
    copy.reset().unwrap();
    copy.resource_barrier(texture.as_ref(), ResourceState::Undefined, ResourceState::CopyDest).unwrap();
    copy.copy_buffer_to_texture(staging.as_ref(), texture.as_ref(), TextureCopyLayout {
        offset: 0,
        row_pitch: alignment,
        width: 2,
        height: 2,
    }).unwrap();
    copy.resource_barrier(texture.as_ref(), ResourceState::CopyDest, ResourceState::Common).unwrap();
    copy.copy_buffer(staging.as_ref(), vertices.as_ref(), 128).unwrap();
    copy.close().unwrap();

    let fence = device.create_fence(0).unwrap();
    device.submit(QueueKind::Copy, &[copy.as_ref()]).unwrap();
    device.signal(QueueKind::Copy, fence.as_ref(), 1).unwrap();
    assert!(fence.wait(1, Duration::from_secs(5)).unwrap());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_submit_validation() {
    let mut device = device();

    let mut open = device.create_command_list(QueueKind::Graphics).unwrap();
    open.reset().unwrap();
    let result = device.submit(QueueKind::Graphics, &[open.as_ref()]);
    assert!(matches!(result, Err(Error::Configuration(_))));

    open.close().unwrap();
    let wrong_queue = device.submit(QueueKind::Copy, &[open.as_ref()]);
    assert!(matches!(wrong_queue, Err(Error::Configuration(_))));

    device.submit(QueueKind::Graphics, &[open.as_ref()]).unwrap();
    device.wait_idle().unwrap();
}

// ============================================================================
// SWAPCHAIN
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_swapchain_creation() {
    let gpu = gpu();
    let device = device();
    let swapchain = device.create_swapchain(&gpu.window, 320, 240).unwrap();

    assert!(swapchain.buffer_count() >= 2);
    assert!((swapchain.current_back_buffer_index() as usize) < swapchain.buffer_count());
    assert!(swapchain.width() > 0 && swapchain.height() > 0);

    let back_buffer = swapchain.back_buffer(0).unwrap();
    assert_eq!(back_buffer.info().usage, TextureUsage::Present);
    assert!(swapchain.back_buffer(swapchain.buffer_count()).is_err());
}
