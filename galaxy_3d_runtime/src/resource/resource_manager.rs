/// Resource manager - GPU-resident resources and staged uploads
///
/// Vertex, index and texture data is copied into device-local memory through
/// a transient upload buffer recorded on the copy queue. The upload buffer is
/// kept alive until the copy fence reaches the value signaled after its copy
/// (`reclaim_retired`). Constant buffers live in host-visible memory and are
/// written in place.
///
/// A single copy command list is shared by every upload, so each upload first
/// waits on the copy fence before resetting it.

use std::sync::Arc;
use std::time::Duration;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{
    lock_device, SharedGraphicsDevice, GraphicsDevice, Buffer, BufferDesc, BufferUsage,
    MemoryLocation, Texture, TextureDesc, TextureFormat, TextureUsage, CommandList, QueueKind,
    ResourceState, TextureCopyLayout,
};
use crate::resource::{GpuResource, ResourceKind, ResourceHandle, AuxMetadata};
use crate::sync::Fence;
use crate::utils::{align_up, CONSTANT_BUFFER_ALIGNMENT};
use crate::{engine_bail_warn, engine_debug, engine_warn};

/// Format of textures created from RGBA8 pixels
pub const TEXTURE_UPLOAD_FORMAT: TextureFormat = TextureFormat::R8G8B8A8_UNORM;

/// Upload buffer waiting for its copy to complete
struct StagingAllocation {
    resource: String,
    _buffer: Arc<dyn Buffer>,
    retire_at: u64,
}

pub struct ResourceManager {
    device: SharedGraphicsDevice,
    resources: FxHashMap<String, GpuResource>,
    staging: Vec<StagingAllocation>,
    copy_fence: Fence,
    copy_list: Box<dyn CommandList>,
}

impl ResourceManager {
    /// Create a manager with its copy fence and copy command list
    pub fn new(device: SharedGraphicsDevice, fence_timeout: Duration) -> Result<Self> {
        let (copy_fence, copy_list) = {
            let mut guard = lock_device(&device)?;
            let fence = Fence::new(&mut *guard, "copy", QueueKind::Copy, fence_timeout)?;
            let list = guard.create_command_list(QueueKind::Copy)?;
            (fence, list)
        };

        Ok(Self {
            device,
            resources: FxHashMap::default(),
            staging: Vec::new(),
            copy_fence,
            copy_list,
        })
    }

    // ===== TEXTURES =====

    /// Create a sampled 2D texture from RGBA8 pixels
    ///
    /// The texture is left in the Common state once the copy completes.
    pub fn create_texture(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Arc<dyn Texture>> {
        if width == 0 || height == 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Texture '{}' has an empty size {}x{}", name, width, height);
        }
        let row_bytes = width as u64 * TEXTURE_UPLOAD_FORMAT.bytes_per_pixel() as u64;
        let data_size = row_bytes * height as u64;
        if pixels.len() as u64 != data_size {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Texture '{}' expects {} bytes of RGBA8 pixels, got {}", name, data_size, pixels.len());
        }

        let device = Arc::clone(&self.device);
        let mut device = lock_device(&device)?;
        self.copy_fence.wait()?;

        let texture = device.create_texture(TextureDesc {
            width,
            height,
            format: TEXTURE_UPLOAD_FORMAT,
            usage: TextureUsage::Sampled,
            sample_count: 1,
        })?;

        let row_pitch = align_up(row_bytes, device.copy_row_pitch_alignment());
        let upload_size = row_pitch * height as u64;
        let staging = device.create_buffer(BufferDesc {
            size: upload_size,
            usage: BufferUsage::Staging,
            memory: MemoryLocation::Upload,
        })?;

        let mut padded = vec![0u8; upload_size as usize];
        for (row, src) in pixels.chunks_exact(row_bytes as usize).enumerate() {
            let start = row * row_pitch as usize;
            padded[start..start + src.len()].copy_from_slice(src);
        }
        staging.update(0, &padded)?;

        self.copy_list.reset()?;
        self.copy_list.resource_barrier(texture.as_ref(), ResourceState::Undefined, ResourceState::CopyDest)?;
        self.copy_list.copy_buffer_to_texture(
            staging.as_ref(),
            texture.as_ref(),
            TextureCopyLayout { offset: 0, row_pitch, width, height },
        )?;
        self.copy_list.resource_barrier(texture.as_ref(), ResourceState::CopyDest, ResourceState::Common)?;
        let retire_at = self.submit_upload(&mut *device, name, staging)?;

        engine_debug!("galaxy3d::ResourceManager",
            "Created texture '{}' ({}x{}, row pitch {})", name, width, height, row_pitch);

        self.register(GpuResource::new(
            name,
            ResourceKind::Texture,
            ResourceHandle::Texture(Arc::clone(&texture)),
            data_size,
            retire_at,
            AuxMetadata::PixelFormat(TEXTURE_UPLOAD_FORMAT),
        ));
        Ok(texture)
    }

    // ===== VERTEX / INDEX BUFFERS =====

    /// Create a device-local vertex buffer from raw bytes
    ///
    /// `data.len()` must be a non-zero multiple of `stride`.
    pub fn create_vertex_buffer(&mut self, name: &str, data: &[u8], stride: u32) -> Result<Arc<dyn Buffer>> {
        if stride == 0 || data.is_empty() || data.len() % stride as usize != 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Vertex buffer '{}': {} bytes is not a non-zero multiple of stride {}",
                name, data.len(), stride);
        }
        self.upload_buffer(name, data, BufferUsage::Vertex, ResourceKind::Vertex, AuxMetadata::Stride(stride))
    }

    /// Create a device-local vertex buffer from typed vertices
    pub fn create_vertex_buffer_from<V: bytemuck::Pod>(&mut self, name: &str, vertices: &[V]) -> Result<Arc<dyn Buffer>> {
        self.create_vertex_buffer(name, bytemuck::cast_slice(vertices), std::mem::size_of::<V>() as u32)
    }

    /// Create a device-local buffer of 32-bit indices
    pub fn create_index_buffer(&mut self, name: &str, indices: &[u32]) -> Result<Arc<dyn Buffer>> {
        if indices.is_empty() {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Index buffer '{}' has no indices", name);
        }
        self.upload_buffer(
            name,
            bytemuck::cast_slice(indices),
            BufferUsage::Index,
            ResourceKind::Index,
            AuxMetadata::Stride(std::mem::size_of::<u32>() as u32),
        )
    }

    fn upload_buffer(
        &mut self,
        name: &str,
        data: &[u8],
        usage: BufferUsage,
        kind: ResourceKind,
        aux: AuxMetadata,
    ) -> Result<Arc<dyn Buffer>> {
        let device = Arc::clone(&self.device);
        let mut device = lock_device(&device)?;
        self.copy_fence.wait()?;

        let size = data.len() as u64;
        let resident = device.create_buffer(BufferDesc {
            size,
            usage,
            memory: MemoryLocation::DeviceLocal,
        })?;
        let staging = device.create_buffer(BufferDesc {
            size,
            usage: BufferUsage::Staging,
            memory: MemoryLocation::Upload,
        })?;
        staging.update(0, data)?;

        self.copy_list.reset()?;
        self.copy_list.copy_buffer(staging.as_ref(), resident.as_ref(), size)?;
        let retire_at = self.submit_upload(&mut *device, name, staging)?;

        engine_debug!("galaxy3d::ResourceManager",
            "Created {:?} buffer '{}' ({} bytes)", kind, name, size);

        self.register(GpuResource::new(
            name,
            kind,
            ResourceHandle::Buffer(Arc::clone(&resident)),
            size,
            retire_at,
            aux,
        ));
        Ok(resident)
    }

    /// Close and submit the copy list, signal the copy fence and keep the
    /// upload buffer until that value retires
    fn submit_upload(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        staging: Arc<dyn Buffer>,
    ) -> Result<u64> {
        self.copy_list.close()?;
        device.submit(QueueKind::Copy, &[self.copy_list.as_ref()])?;
        let retire_at = self.copy_fence.signal(device)?;

        self.staging.push(StagingAllocation {
            resource: name.to_string(),
            _buffer: staging,
            retire_at,
        });
        Ok(retire_at)
    }

    // ===== CONSTANT BUFFERS =====

    /// Create a host-visible constant buffer holding `data`
    ///
    /// The allocation is rounded up to 256 bytes.
    pub fn create_constant_buffer(&mut self, name: &str, data: &[u8]) -> Result<Arc<dyn Buffer>> {
        if data.is_empty() {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Constant buffer '{}' has no data", name);
        }
        let size = align_up(data.len() as u64, CONSTANT_BUFFER_ALIGNMENT);
        let buffer = self.create_host_visible(size)?;
        buffer.update(0, data)?;

        engine_debug!("galaxy3d::ResourceManager", "Created constant buffer '{}' ({} bytes)", name, size);

        self.register(GpuResource::new(
            name,
            ResourceKind::Constant,
            ResourceHandle::Buffer(Arc::clone(&buffer)),
            size,
            0,
            AuxMetadata::None,
        ));
        Ok(buffer)
    }

    /// Create a host-visible array of `count` constant blocks
    ///
    /// `data` holds `count` equally sized elements; element `i` is stored at
    /// `i * stride` with the stride rounded up to 256 bytes.
    pub fn create_constant_buffer_array(&mut self, name: &str, data: &[u8], count: u32) -> Result<Arc<dyn Buffer>> {
        if count == 0 || data.is_empty() || data.len() % count as usize != 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Constant buffer array '{}': {} bytes cannot hold {} equal elements",
                name, data.len(), count);
        }
        let element_size = data.len() / count as usize;
        let stride = align_up(element_size as u64, CONSTANT_BUFFER_ALIGNMENT);
        let buffer = self.create_host_visible(stride * count as u64)?;
        Self::write_elements(buffer.as_ref(), data, element_size, stride)?;

        engine_debug!("galaxy3d::ResourceManager",
            "Created constant buffer array '{}' ({} x {} bytes)", name, count, stride);

        self.register(GpuResource::new(
            name,
            ResourceKind::Constant,
            ResourceHandle::Buffer(Arc::clone(&buffer)),
            stride * count as u64,
            0,
            AuxMetadata::Stride(stride as u32),
        ));
        Ok(buffer)
    }

    fn create_host_visible(&mut self, size: u64) -> Result<Arc<dyn Buffer>> {
        let mut device = lock_device(&self.device)?;
        device.create_buffer(BufferDesc {
            size,
            usage: BufferUsage::Uniform,
            memory: MemoryLocation::HostVisible,
        })
    }

    fn write_elements(buffer: &dyn Buffer, data: &[u8], element_size: usize, stride: u64) -> Result<()> {
        for (i, element) in data.chunks_exact(element_size).enumerate() {
            buffer.update(i as u64 * stride, element)?;
        }
        Ok(())
    }

    /// Overwrite a constant buffer
    ///
    /// Returns `Ok(false)` without touching anything if `name` is unknown.
    pub fn update_constant_buffer(&mut self, name: &str, data: &[u8]) -> Result<bool> {
        let Some(resource) = self.resources.get(name) else {
            engine_debug!("galaxy3d::ResourceManager", "Update of unknown constant buffer '{}' ignored", name);
            return Ok(false);
        };
        let buffer = Self::constant_buffer_of(resource)?;
        if data.len() as u64 > resource.size() {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Update of {} bytes exceeds constant buffer '{}' ({} bytes)", data.len(), name, resource.size());
        }
        buffer.update(0, data)?;
        Ok(true)
    }

    /// Overwrite the first `count` elements of a constant buffer array
    ///
    /// Returns `Ok(false)` without touching anything if `name` is unknown.
    pub fn update_constant_buffer_array(&mut self, name: &str, data: &[u8], count: u32) -> Result<bool> {
        let Some(resource) = self.resources.get(name) else {
            engine_debug!("galaxy3d::ResourceManager", "Update of unknown constant buffer array '{}' ignored", name);
            return Ok(false);
        };
        let buffer = Self::constant_buffer_of(resource)?;
        let Some(stride) = resource.stride() else {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Constant buffer '{}' is not an array", name);
        };
        if count == 0 || data.is_empty() || data.len() % count as usize != 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Update of '{}': {} bytes cannot hold {} equal elements", name, data.len(), count);
        }
        let element_size = data.len() / count as usize;
        if element_size as u64 > stride as u64 || count as u64 * stride as u64 > resource.size() {
            engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                "Update of {} x {} bytes does not fit constant buffer array '{}' ({} bytes, stride {})",
                count, element_size, name, resource.size(), stride);
        }
        Self::write_elements(buffer.as_ref(), data, element_size, stride as u64)?;
        Ok(true)
    }

    fn constant_buffer_of(resource: &GpuResource) -> Result<&Arc<dyn Buffer>> {
        match (resource.kind(), resource.buffer()) {
            (ResourceKind::Constant, Some(buffer)) => Ok(buffer),
            _ => {
                engine_bail_warn!(InvalidResource; "galaxy3d::ResourceManager",
                    "Resource '{}' is a {:?} resource, not a constant buffer", resource.name(), resource.kind());
            }
        }
    }

    // ===== RETIREMENT =====

    /// Release every upload buffer whose copy has completed
    ///
    /// Called once per frame. Resident allocations are never released here.
    pub fn reclaim_retired(&mut self) -> Result<usize> {
        if self.staging.is_empty() {
            return Ok(0);
        }
        let completed = self.copy_fence.completed_value()?;
        let before = self.staging.len();
        self.staging.retain(|s| s.retire_at > completed);
        let released = before - self.staging.len();

        if released > 0 {
            engine_debug!("galaxy3d::ResourceManager",
                "Released {} staging buffer(s), copy fence at {}", released, completed);
        }
        Ok(released)
    }

    /// Block until every upload issued so far has completed
    pub fn wait_for_uploads(&self) -> Result<()> {
        self.copy_fence.wait()
    }

    // ===== QUERIES =====

    pub fn resource(&self, name: &str) -> Option<&GpuResource> {
        self.resources.get(name)
    }

    pub fn buffer(&self, name: &str) -> Option<Arc<dyn Buffer>> {
        self.resources.get(name)?.buffer().cloned()
    }

    pub fn texture(&self, name: &str) -> Option<Arc<dyn Texture>> {
        self.resources.get(name)?.texture().cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Upload buffers not yet released
    pub fn staging_count(&self) -> usize {
        self.staging.len()
    }

    /// Names of the resources whose upload buffers are still held
    pub fn pending_uploads(&self) -> impl Iterator<Item = &str> {
        self.staging.iter().map(|s| s.resource.as_str())
    }

    pub fn copy_fence(&self) -> &Fence {
        &self.copy_fence
    }

    fn register(&mut self, resource: GpuResource) {
        let name = resource.name().to_string();
        if self.resources.insert(name.clone(), resource).is_some() {
            engine_warn!("galaxy3d::ResourceManager",
                "Resource '{}' re-registered, previous allocation replaced", name);
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        if let Err(err) = self.copy_fence.wait() {
            engine_warn!("galaxy3d::ResourceManager", "Uploads still pending on drop: {}", err);
        }
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
