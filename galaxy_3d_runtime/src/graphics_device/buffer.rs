/// Buffer trait and buffer descriptor

use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer (also readable as a structured buffer)
    Vertex,
    /// Index buffer (32-bit indices)
    Index,
    /// Uniform/constant buffer
    Uniform,
    /// Read/write storage buffer
    Storage,
    /// Transient upload source for copy-queue transfers
    Staging,
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// GPU-only memory, filled through a staged copy
    DeviceLocal,
    /// CPU-writable memory read directly by shaders (constant buffers)
    HostVisible,
    /// CPU-writable memory used as a copy source
    Upload,
}

impl MemoryLocation {
    /// Whether `Buffer::update` can write this memory
    pub fn is_cpu_writable(self) -> bool {
        !matches!(self, MemoryLocation::DeviceLocal)
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory location
    pub memory: MemoryLocation,
}

/// Buffer data format for vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT | BufferFormat::R8G8B8A8_UNORM => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT | BufferFormat::R32G32B32_UINT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_UINT => 16,
        }
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer memory is released when the last reference is dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Memory location the buffer was allocated in
    fn memory_location(&self) -> MemoryLocation;

    /// Write `data` at `offset`
    ///
    /// Only valid for CPU-writable memory. Writing past the end of the buffer
    /// is an `InvalidResource` error.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
