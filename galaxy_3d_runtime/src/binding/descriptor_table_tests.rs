//! Unit tests for DescriptorTable

use super::*;
use crate::error::Error;
use crate::graphics_device::{BufferUsage, MemoryLocation, TextureUsage};
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockTexture};
use crate::resource::{AuxMetadata, ResourceHandle};

// ============================================================================
// Helpers
// ============================================================================

fn texture_resource(name: &str) -> GpuResource {
    let texture = Arc::new(MockTexture::new(1, 1, TextureFormat::R8G8B8A8_UNORM, TextureUsage::Sampled));
    GpuResource::new(
        name,
        ResourceKind::Texture,
        ResourceHandle::Texture(texture),
        4,
        1,
        AuxMetadata::PixelFormat(TextureFormat::R8G8B8A8_UNORM),
    )
}

fn vertex_resource(name: &str, stride: u32, count: u64) -> GpuResource {
    let buffer = Arc::new(MockBuffer::new(stride as u64 * count, BufferUsage::Vertex, MemoryLocation::DeviceLocal));
    GpuResource::new(
        name,
        ResourceKind::Vertex,
        ResourceHandle::Buffer(buffer),
        stride as u64 * count,
        1,
        AuxMetadata::Stride(stride),
    )
}

fn constant_resource(name: &str) -> GpuResource {
    let buffer = Arc::new(MockBuffer::new(256, BufferUsage::Uniform, MemoryLocation::HostVisible));
    GpuResource::new(name, ResourceKind::Constant, ResourceHandle::Buffer(buffer), 256, 0, AuxMetadata::None)
}

fn caps(read_only: u32, constant: u32, writable: u32) -> RegionCapacities {
    RegionCapacities { read_only, constant, writable }
}

// ============================================================================
// REGISTERS
// ============================================================================

#[test]
fn test_successive_texture_binds_return_consecutive_registers() {
    let mut table = DescriptorTable::new(caps(8, 1, 1)).unwrap();
    for expected in 0..5 {
        let register = table.bind_texture_as_read_only(&texture_resource(&format!("t{}", expected))).unwrap();
        assert_eq!(register, expected);
    }
    assert_eq!(table.len(Region::ReadOnly), 5);
    assert_eq!(table.slot(Region::ReadOnly, 3).unwrap().resource(), "t3");
}

#[test]
fn test_regions_count_registers_independently() {
    let mut table = DescriptorTable::new(RegionCapacities::default()).unwrap();
    assert_eq!(table.bind_texture_as_read_only(&texture_resource("tex")).unwrap(), 0);
    assert_eq!(table.bind_buffer_as_constant(&constant_resource("cb")).unwrap(), 0);
    assert_eq!(table.bind_buffer_as_read_only(&vertex_resource("ro", 16, 4)).unwrap(), 1);
    assert_eq!(table.bind_buffer_as_writable(&vertex_resource("rw", 16, 4)).unwrap(), 0);

    assert_eq!(table.len(Region::ReadOnly), 2);
    assert_eq!(table.len(Region::Constant), 1);
    assert_eq!(table.len(Region::Writable), 1);
    assert!(!table.is_empty());
}

#[test]
fn test_region_overflow_is_configuration_error() {
    let mut table = DescriptorTable::new(caps(1, 1, 0)).unwrap();
    table.bind_texture_as_read_only(&texture_resource("a")).unwrap();

    assert!(matches!(
        table.bind_texture_as_read_only(&texture_resource("b")),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        table.bind_buffer_as_writable(&vertex_resource("w", 4, 1)),
        Err(Error::Configuration(_))
    ));
    assert_eq!(table.len(Region::ReadOnly), 1);
}

// ============================================================================
// KIND CHECKS
// ============================================================================

#[test]
fn test_vertex_buffer_cannot_be_bound_as_texture() {
    let mut table = DescriptorTable::new(RegionCapacities::default()).unwrap();
    assert!(matches!(
        table.bind_texture_as_read_only(&vertex_resource("vb", 20, 3)),
        Err(Error::InvalidResource(_))
    ));
    assert!(table.is_empty());
}

#[test]
fn test_constant_region_requires_constant_buffer() {
    let mut table = DescriptorTable::new(RegionCapacities::default()).unwrap();
    assert!(matches!(
        table.bind_buffer_as_constant(&vertex_resource("vb", 20, 3)),
        Err(Error::InvalidResource(_))
    ));
    assert!(matches!(
        table.bind_buffer_as_read_only(&texture_resource("tex")),
        Err(Error::InvalidResource(_))
    ));
}

// ============================================================================
// VIEWS
// ============================================================================

#[test]
fn test_buffer_view_keeps_stride_and_size() {
    let mut table = DescriptorTable::new(RegionCapacities::default()).unwrap();
    let register = table.bind_buffer_as_read_only(&vertex_resource("vb", 20, 3)).unwrap();

    match table.slot(Region::ReadOnly, register).unwrap() {
        BoundView::Buffer { stride, size, .. } => {
            assert_eq!(*stride, 20);
            assert_eq!(*size, 60);
        }
        other => panic!("unexpected view {:?}", other),
    }
}

#[test]
fn test_texture_and_constant_views() {
    let mut table = DescriptorTable::new(RegionCapacities::default()).unwrap();
    table.bind_texture_as_read_only(&texture_resource("tex")).unwrap();
    table.bind_buffer_as_constant(&constant_resource("cb")).unwrap();

    assert!(matches!(
        table.slot(Region::ReadOnly, 0),
        Some(BoundView::Texture { format: TextureFormat::R8G8B8A8_UNORM, .. })
    ));
    assert!(matches!(table.slot(Region::Constant, 0), Some(BoundView::Constant { size: 256, .. })));
    assert!(table.slot(Region::Constant, 1).is_none());
}

#[test]
fn test_absolute_slot() {
    let table = DescriptorTable::new(caps(4, 2, 3)).unwrap();
    assert_eq!(table.absolute_slot(Region::ReadOnly, 1), Some(1));
    assert_eq!(table.absolute_slot(Region::Constant, 0), Some(4));
    assert_eq!(table.absolute_slot(Region::Writable, 2), Some(8));
    assert_eq!(table.absolute_slot(Region::Constant, 2), None);
    assert_eq!(table.capacity(Region::Writable), 3);
    assert_eq!(table.capacities().total(), 9);
}

// ============================================================================
// CAPACITIES
// ============================================================================

#[test]
fn test_overflowing_capacities_rejected() {
    let capacities = caps(u32::MAX, 1, 0);
    assert_eq!(capacities.checked_total(), None);
    assert_eq!(capacities.total(), u32::MAX);
    assert_eq!(capacities.base(Region::Writable), u32::MAX);

    assert!(matches!(DescriptorTable::new(capacities), Err(Error::Configuration(_))));
    assert!(matches!(DescriptorTable::new(caps(1, 1, u32::MAX)), Err(Error::Configuration(_))));
}

#[test]
fn test_large_capacity_reserves_nothing() {
    let mut table = DescriptorTable::new(caps(u32::MAX, 0, 0)).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.capacity(Region::ReadOnly), u32::MAX);
    assert_eq!(table.bind_texture_as_read_only(&texture_resource("tex")).unwrap(), 0);
    assert_eq!(table.absolute_slot(Region::ReadOnly, 0), Some(0));
}
