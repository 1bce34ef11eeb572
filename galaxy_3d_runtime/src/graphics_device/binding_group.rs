/// BindingLayout / BindingGroup traits and their descriptors
///
/// A BindingLayout describes the shader-visible resource slots of a pipeline
/// (Vulkan descriptor set layout). A BindingGroup is an immutable set of
/// resources written into those slots (Vulkan descriptor set). Static samplers
/// are baked into the layout and never written.

use bitflags::bitflags;
use crate::graphics_device::{Buffer, Texture};

// ============================================================================
// Layout description
// ============================================================================

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Sampled texture (sampler comes from a static sampler)
    SampledTexture,
    /// Read-only structured buffer
    ReadOnlyStorageBuffer,
    /// Uniform/constant buffer
    UniformBuffer,
    /// Read/write structured buffer
    StorageBuffer,
}

bitflags! {
    /// Shader stage visibility flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const PIXEL = 0x02;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::PIXEL.bits();
    }
}

/// A single binding slot within a BindingLayout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlotDesc {
    /// Binding number (`layout(binding = N)` in GLSL)
    pub binding: u32,
    pub binding_type: BindingType,
    pub stage_flags: ShaderStageFlags,
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture coordinate addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
}

/// Sampler baked into a BindingLayout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSamplerDesc {
    pub binding: u32,
    pub filter: Filter,
    pub address_mode: AddressMode,
    pub stage_flags: ShaderStageFlags,
}

/// Description of a BindingLayout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingLayoutDesc {
    pub entries: Vec<BindingSlotDesc>,
    pub static_samplers: Vec<StaticSamplerDesc>,
}

impl BindingLayoutDesc {
    /// Slot declared at `binding`
    pub fn entry(&self, binding: u32) -> Option<&BindingSlotDesc> {
        self.entries.iter().find(|e| e.binding == binding)
    }
}

/// Compiled resource layout
pub trait BindingLayout: Send + Sync {
    fn desc(&self) -> &BindingLayoutDesc;
}

// ============================================================================
// Binding resources
// ============================================================================

/// A concrete resource written into a BindingGroup slot
#[derive(Clone, Copy)]
pub enum BindingResource<'a> {
    /// Texture sampled by shaders
    SampledTexture(&'a dyn Texture),
    /// Uniform buffer, `size` bytes from offset 0
    UniformBuffer(&'a dyn Buffer, u64),
    /// Structured buffer (read-only or read/write, per the layout slot)
    StorageBuffer(&'a dyn Buffer),
}

impl BindingResource<'_> {
    /// Binding types this resource can be written to
    pub fn is_compatible(&self, binding_type: BindingType) -> bool {
        matches!(
            (self, binding_type),
            (BindingResource::SampledTexture(_), BindingType::SampledTexture)
                | (BindingResource::UniformBuffer(..), BindingType::UniformBuffer)
                | (BindingResource::StorageBuffer(_), BindingType::ReadOnlyStorageBuffer)
                | (BindingResource::StorageBuffer(_), BindingType::StorageBuffer)
        )
    }
}

/// One slot write of a BindingGroup
#[derive(Clone, Copy)]
pub struct BindingWrite<'a> {
    pub binding: u32,
    pub resource: BindingResource<'a>,
}

/// An immutable set of GPU resource bindings.
///
/// Descriptor pools are managed internally by the device.
pub trait BindingGroup: Send + Sync {
    /// Number of slots written at creation
    fn binding_count(&self) -> usize;
}
