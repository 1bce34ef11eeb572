//! Unit tests for Vulkan format conversion functions
//!
//! Pure conversions, no GPU required.

use super::*;

// ============================================================================
// TEXTURE FORMATS
// ============================================================================

#[test]
fn test_texture_format_to_vk_color_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_SRGB), vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_texture_format_to_vk_depth_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(
        texture_format_to_vk(TextureFormat::D24_UNORM_S8_UINT),
        vk::Format::D24_UNORM_S8_UINT
    );
}

#[test]
fn test_surface_formats_map_back() {
    for format in [
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB,
        TextureFormat::D32_FLOAT,
    ] {
        assert_eq!(vk_to_texture_format(texture_format_to_vk(format)), Some(format));
    }
    assert_eq!(vk_to_texture_format(vk::Format::A2B10G10R10_UNORM_PACK32), None);
}

#[test]
fn test_aspect_masks() {
    assert_eq!(aspect_mask(TextureFormat::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(TextureFormat::D32_FLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(TextureFormat::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// BUFFER FORMATS
// ============================================================================

#[test]
fn test_buffer_format_to_vk_float_formats() {
    assert_eq!(buffer_format_to_vk(BufferFormat::R32_SFLOAT), vk::Format::R32_SFLOAT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32_SFLOAT), vk::Format::R32G32_SFLOAT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32B32_SFLOAT), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(
        buffer_format_to_vk(BufferFormat::R32G32B32A32_SFLOAT),
        vk::Format::R32G32B32A32_SFLOAT
    );
}

#[test]
fn test_buffer_format_to_vk_uint_and_byte_formats() {
    assert_eq!(buffer_format_to_vk(BufferFormat::R32_UINT), vk::Format::R32_UINT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32B32A32_UINT), vk::Format::R32G32B32A32_UINT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
}

// ============================================================================
// SAMPLE COUNTS
// ============================================================================

#[test]
fn test_sample_counts() {
    assert_eq!(sample_count_to_vk(1), Some(vk::SampleCountFlags::TYPE_1));
    assert_eq!(sample_count_to_vk(4), Some(vk::SampleCountFlags::TYPE_4));
    assert_eq!(sample_count_to_vk(3), None);
    assert_eq!(sample_count_to_vk(0), None);
}

// ============================================================================
// RESOURCE STATES
// ============================================================================

#[test]
fn test_state_layouts() {
    assert_eq!(state_to_vk(ResourceState::Undefined).0, vk::ImageLayout::UNDEFINED);
    assert_eq!(state_to_vk(ResourceState::Common).0, vk::ImageLayout::GENERAL);
    assert_eq!(state_to_vk(ResourceState::CopyDest).0, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(state_to_vk(ResourceState::RenderTarget).0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(
        state_to_vk(ResourceState::DepthWrite).0,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
    assert_eq!(state_to_vk(ResourceState::Present).0, vk::ImageLayout::PRESENT_SRC_KHR);
}

#[test]
fn test_resolve_states_use_transfer_layouts() {
    let (src_layout, src_access, src_stage) = state_to_vk(ResourceState::ResolveSource);
    let (dst_layout, dst_access, dst_stage) = state_to_vk(ResourceState::ResolveDest);

    assert_eq!(src_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(dst_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(src_access, vk::AccessFlags::TRANSFER_READ);
    assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
    assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
}

// ============================================================================
// PIPELINE STATE
// ============================================================================

#[test]
fn test_stage_flags() {
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::VERTEX), vk::ShaderStageFlags::VERTEX);
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::PIXEL), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(
        stage_flags_to_vk(ShaderStageFlags::ALL_GRAPHICS),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(shader_stage_to_vk(ShaderStage::Pixel), vk::ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_binding_types() {
    assert_eq!(binding_type_to_vk(BindingType::SampledTexture), vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(binding_type_to_vk(BindingType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        binding_type_to_vk(BindingType::ReadOnlyStorageBuffer),
        vk::DescriptorType::STORAGE_BUFFER
    );
    assert_eq!(binding_type_to_vk(BindingType::StorageBuffer), vk::DescriptorType::STORAGE_BUFFER);
}

#[test]
fn test_blend_and_compare() {
    assert_eq!(blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_op_to_vk(BlendOp::Subtract), vk::BlendOp::SUBTRACT);
    assert_eq!(compare_op_to_vk(CompareOp::LessOrEqual), vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
    assert_eq!(front_face_to_vk(FrontFace::Clockwise), vk::FrontFace::CLOCKWISE);
}

#[test]
fn test_sampler_modes() {
    assert_eq!(
        filter_to_vk(Filter::Linear),
        (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR)
    );
    assert_eq!(address_mode_to_vk(AddressMode::Wrap), vk::SamplerAddressMode::REPEAT);
    assert_eq!(address_mode_to_vk(AddressMode::Clamp), vk::SamplerAddressMode::CLAMP_TO_EDGE);
}
