/// Shader trait and shader descriptor

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Pixel/fragment shader
    Pixel,
}

/// Descriptor for creating a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    /// Compiled shader bytecode (SPIR-V)
    pub code: &'a [u8],
    /// Shader stage
    pub stage: ShaderStage,
    /// Entry point function name
    pub entry_point: String,
}

/// Shader module trait
///
/// Implemented by backend-specific shader types (e.g., VulkanShader).
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;
}
