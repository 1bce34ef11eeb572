/// GPU-resident resource record
///
/// One entry of the ResourceManager: the device allocation, what it is used
/// for, and kind-specific metadata (element stride for buffers, pixel format
/// for textures).

use std::sync::Arc;
use crate::graphics_device::{Buffer, Texture, TextureFormat};

/// Usage kind of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vertex,
    Index,
    Constant,
    Texture,
}

/// Device allocation backing a resource
#[derive(Clone)]
pub enum ResourceHandle {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
}

/// Kind-specific metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxMetadata {
    None,
    /// Bytes per element (vertex, index, constant array)
    Stride(u32),
    PixelFormat(TextureFormat),
}

#[derive(Clone)]
pub struct GpuResource {
    name: String,
    kind: ResourceKind,
    handle: ResourceHandle,
    size: u64,
    retire_at: u64,
    aux: AuxMetadata,
}

impl GpuResource {
    pub(crate) fn new(
        name: &str,
        kind: ResourceKind,
        handle: ResourceHandle,
        size: u64,
        retire_at: u64,
        aux: AuxMetadata,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            handle,
            size,
            retire_at,
            aux,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Buffer allocation, `None` for textures
    pub fn buffer(&self) -> Option<&Arc<dyn Buffer>> {
        match &self.handle {
            ResourceHandle::Buffer(buffer) => Some(buffer),
            ResourceHandle::Texture(_) => None,
        }
    }

    /// Texture allocation, `None` for buffers
    pub fn texture(&self) -> Option<&Arc<dyn Texture>> {
        match &self.handle {
            ResourceHandle::Texture(texture) => Some(texture),
            ResourceHandle::Buffer(_) => None,
        }
    }

    /// Size in bytes (texel data for textures)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy fence value after which the initial upload is visible
    ///
    /// 0 for resources written directly (constant buffers).
    pub fn retire_at(&self) -> u64 {
        self.retire_at
    }

    pub fn aux(&self) -> AuxMetadata {
        self.aux
    }

    pub fn stride(&self) -> Option<u32> {
        match self.aux {
            AuxMetadata::Stride(stride) => Some(stride),
            _ => None,
        }
    }

    pub fn pixel_format(&self) -> Option<TextureFormat> {
        match self.aux {
            AuxMetadata::PixelFormat(format) => Some(format),
            _ => None,
        }
    }

    /// Whether the upload completed, given the copy fence's completed value
    pub fn is_uploaded(&self, completed: u64) -> bool {
        self.retire_at <= completed
    }
}

impl std::fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("retire_at", &self.retire_at)
            .field("aux", &self.aux)
            .finish()
    }
}
