/// SamplerCache - internal VkSampler management for the Vulkan backend
///
/// Static samplers are baked into descriptor set layouts as immutable
/// samplers. Identical (filter, address mode) pairs share one VkSampler,
/// created on first use and destroyed with the GpuContext.

use galaxy_3d_runtime::galaxy3d::device::{AddressMode, Filter};
use ash::vk;
use rustc_hash::FxHashMap;

use crate::vulkan_format::{address_mode_to_vk, filter_to_vk};

#[derive(Default)]
pub(crate) struct SamplerCache {
    cache: FxHashMap<(Filter, AddressMode), vk::Sampler>,
}

impl SamplerCache {
    /// Get or create the sampler for `filter` / `address_mode`
    pub(crate) fn get(
        &mut self,
        device: &ash::Device,
        filter: Filter,
        address_mode: AddressMode,
    ) -> Result<vk::Sampler, vk::Result> {
        if let Some(&sampler) = self.cache.get(&(filter, address_mode)) {
            return Ok(sampler);
        }

        let (vk_filter, mipmap) = filter_to_vk(filter);
        let address = address_mode_to_vk(address_mode);

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk_filter)
            .min_filter(vk_filter)
            .mipmap_mode(mipmap)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .unnormalized_coordinates(false);

        let sampler = unsafe { device.create_sampler(&create_info, None)? };
        self.cache.insert((filter, address_mode), sampler);
        Ok(sampler)
    }

    /// Destroy all cached samplers (device must still be alive)
    pub(crate) fn destroy_all(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            unsafe { device.destroy_sampler(sampler, None); }
        }
    }
}
