/// Descriptor table - per-pipeline shader-visible resource slots
///
/// The table has a fixed capacity split at construction into three contiguous
/// regions: read-only (textures and read-only buffers), constant buffers and
/// writable buffers. Binding a resource fills the next free slot of its region
/// and returns that slot's register (0-based within the region). Slots are
/// never reclaimed.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{Buffer, Texture, TextureFormat};
use crate::resource::{GpuResource, ResourceKind};
use crate::engine_bail_warn;

// ===== REGIONS =====

/// Region of a descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Sampled textures and read-only structured buffers (`t` registers)
    ReadOnly,
    /// Constant buffers (`b` registers)
    Constant,
    /// Read/write structured buffers (`u` registers)
    Writable,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::ReadOnly, Region::Constant, Region::Writable];

    fn index(self) -> usize {
        match self {
            Region::ReadOnly => 0,
            Region::Constant => 1,
            Region::Writable => 2,
        }
    }
}

/// Slot count of each region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCapacities {
    pub read_only: u32,
    pub constant: u32,
    pub writable: u32,
}

impl RegionCapacities {
    pub fn get(&self, region: Region) -> u32 {
        match region {
            Region::ReadOnly => self.read_only,
            Region::Constant => self.constant,
            Region::Writable => self.writable,
        }
    }

    /// First absolute slot of `region`
    pub fn base(&self, region: Region) -> u32 {
        match region {
            Region::ReadOnly => 0,
            Region::Constant => self.read_only,
            Region::Writable => self.read_only.saturating_add(self.constant),
        }
    }

    /// Slots of the three regions (saturates, see `checked_total`)
    pub fn total(&self) -> u32 {
        self.read_only.saturating_add(self.constant).saturating_add(self.writable)
    }

    /// Slots of the three regions, `None` past `u32::MAX`
    pub fn checked_total(&self) -> Option<u32> {
        self.read_only.checked_add(self.constant)?.checked_add(self.writable)
    }

    /// `Error::Configuration` unless every absolute slot fits in a `u32`
    pub fn validate(&self) -> Result<()> {
        if self.checked_total().is_none() {
            engine_bail_warn!(Configuration; "galaxy3d::DescriptorTable",
                "Region capacities {}/{}/{} exceed the slot range",
                self.read_only, self.constant, self.writable);
        }
        Ok(())
    }
}

impl Default for RegionCapacities {
    fn default() -> Self {
        Self { read_only: 4, constant: 4, writable: 4 }
    }
}

// ===== VIEWS =====

/// View written into a descriptor slot
#[derive(Clone)]
pub enum BoundView {
    Texture {
        resource: String,
        texture: Arc<dyn Texture>,
        format: TextureFormat,
    },
    Buffer {
        resource: String,
        buffer: Arc<dyn Buffer>,
        /// Element stride (0 for raw buffers)
        stride: u32,
        size: u64,
    },
    Constant {
        resource: String,
        buffer: Arc<dyn Buffer>,
        size: u64,
    },
}

impl BoundView {
    /// Name of the bound resource
    pub fn resource(&self) -> &str {
        match self {
            BoundView::Texture { resource, .. }
            | BoundView::Buffer { resource, .. }
            | BoundView::Constant { resource, .. } => resource,
        }
    }
}

impl std::fmt::Debug for BoundView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundView::Texture { resource, format, .. } => f
                .debug_struct("Texture")
                .field("resource", resource)
                .field("format", format)
                .finish(),
            BoundView::Buffer { resource, stride, size, .. } => f
                .debug_struct("Buffer")
                .field("resource", resource)
                .field("stride", stride)
                .field("size", size)
                .finish(),
            BoundView::Constant { resource, size, .. } => f
                .debug_struct("Constant")
                .field("resource", resource)
                .field("size", size)
                .finish(),
        }
    }
}

// ===== DESCRIPTOR TABLE =====

#[derive(Debug)]
pub struct DescriptorTable {
    capacities: RegionCapacities,
    regions: [Vec<BoundView>; 3],
}

impl DescriptorTable {
    /// Empty table; `Error::Configuration` when the capacities overflow
    pub fn new(capacities: RegionCapacities) -> Result<Self> {
        capacities.validate()?;
        Ok(Self {
            capacities,
            regions: [Vec::new(), Vec::new(), Vec::new()],
        })
    }

    // ===== BINDING =====

    /// Bind a texture in the read-only region
    pub fn bind_texture_as_read_only(&mut self, resource: &GpuResource) -> Result<u32> {
        let (Some(texture), Some(format)) = (resource.texture(), resource.pixel_format()) else {
            engine_bail_warn!(InvalidResource; "galaxy3d::DescriptorTable",
                "'{}' is a {:?} resource and cannot be bound as a texture", resource.name(), resource.kind());
        };
        let view = BoundView::Texture {
            resource: resource.name().to_string(),
            texture: Arc::clone(texture),
            format,
        };
        self.push(Region::ReadOnly, view)
    }

    /// Bind a buffer as a read-only structured buffer
    pub fn bind_buffer_as_read_only(&mut self, resource: &GpuResource) -> Result<u32> {
        let view = Self::buffer_view(resource)?;
        self.push(Region::ReadOnly, view)
    }

    /// Bind a constant buffer
    pub fn bind_buffer_as_constant(&mut self, resource: &GpuResource) -> Result<u32> {
        let buffer = match (resource.kind(), resource.buffer()) {
            (ResourceKind::Constant, Some(buffer)) => buffer,
            _ => {
                engine_bail_warn!(InvalidResource; "galaxy3d::DescriptorTable",
                    "'{}' is a {:?} resource and cannot be bound as a constant buffer",
                    resource.name(), resource.kind());
            }
        };
        let view = BoundView::Constant {
            resource: resource.name().to_string(),
            buffer: Arc::clone(buffer),
            size: resource.size(),
        };
        self.push(Region::Constant, view)
    }

    /// Bind a buffer as a read/write structured buffer
    pub fn bind_buffer_as_writable(&mut self, resource: &GpuResource) -> Result<u32> {
        let view = Self::buffer_view(resource)?;
        self.push(Region::Writable, view)
    }

    fn buffer_view(resource: &GpuResource) -> Result<BoundView> {
        let Some(buffer) = resource.buffer() else {
            engine_bail_warn!(InvalidResource; "galaxy3d::DescriptorTable",
                "'{}' is a texture and cannot be bound as a buffer", resource.name());
        };
        Ok(BoundView::Buffer {
            resource: resource.name().to_string(),
            buffer: Arc::clone(buffer),
            stride: resource.stride().unwrap_or(0),
            size: resource.size(),
        })
    }

    fn push(&mut self, region: Region, view: BoundView) -> Result<u32> {
        let capacity = self.capacities.get(region);
        let slots = &mut self.regions[region.index()];
        if slots.len() as u32 >= capacity {
            engine_bail_warn!(Configuration; "galaxy3d::DescriptorTable",
                "{:?} region is full ({} slots), cannot bind '{}'", region, capacity, view.resource());
        }
        slots.push(view);
        Ok(slots.len() as u32 - 1)
    }

    // ===== QUERIES =====

    pub fn capacities(&self) -> RegionCapacities {
        self.capacities
    }

    /// Slots used in `region`
    pub fn len(&self, region: Region) -> u32 {
        self.regions[region.index()].len() as u32
    }

    pub fn capacity(&self, region: Region) -> u32 {
        self.capacities.get(region)
    }

    /// Whether no slot of any region is used
    pub fn is_empty(&self) -> bool {
        self.regions.iter().all(Vec::is_empty)
    }

    pub fn slot(&self, region: Region, register: u32) -> Option<&BoundView> {
        self.regions[region.index()].get(register as usize)
    }

    /// Slot index across the whole table, `None` past the region's capacity
    pub fn absolute_slot(&self, region: Region, register: u32) -> Option<u32> {
        (register < self.capacities.get(region)).then(|| self.capacities.base(region) + register)
    }

    /// Bound views of `region`, by register
    pub fn views(&self, region: Region) -> &[BoundView] {
        &self.regions[region.index()]
    }
}

#[cfg(test)]
#[path = "descriptor_table_tests.rs"]
mod tests;
