/// Layout builder - turns a descriptor table into a device binding layout
///
/// Binding numbers are laid out region after region using the table's
/// capacities, so a register always maps to the same binding whether or not
/// the slots before it are bound:
///
/// - read-only register `i` -> binding `i`
/// - constant register `j` -> `read_only_capacity + j`
/// - writable register `k` -> `read_only_capacity + constant_capacity + k`
/// - static sampler register `s` -> `total_capacity + s`

use crate::error::Result;
use crate::graphics_device::{
    AddressMode, BindingLayoutDesc, BindingResource, BindingSlotDesc, BindingType, BindingWrite,
    Filter, ShaderStageFlags, StaticSamplerDesc,
};
use crate::binding::{BoundView, DescriptorTable, Region, RegionCapacities};
use crate::engine_bail_warn;

/// Sampler baked into a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSampler {
    /// Shader register (`s` register)
    pub register: u32,
    pub filter: Filter,
    pub address_mode: AddressMode,
}

impl StaticSampler {
    /// Linear filtering with wrapped coordinates
    pub fn linear_wrap(register: u32) -> Self {
        Self { register, filter: Filter::Linear, address_mode: AddressMode::Wrap }
    }

    pub fn point_clamp(register: u32) -> Self {
        Self { register, filter: Filter::Nearest, address_mode: AddressMode::Clamp }
    }
}

/// Contiguous run of bound registers of one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub region: Region,
    pub base_register: u32,
    pub count: u32,
    pub base_binding: u32,
}

pub struct LayoutBuilder<'a> {
    table: &'a DescriptorTable,
    samplers: Vec<StaticSampler>,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(table: &'a DescriptorTable) -> Self {
        Self { table, samplers: Vec::new() }
    }

    pub fn static_sampler(mut self, sampler: StaticSampler) -> Self {
        self.samplers.push(sampler);
        self
    }

    pub fn static_samplers(mut self, samplers: &[StaticSampler]) -> Self {
        self.samplers.extend_from_slice(samplers);
        self
    }

    pub fn build(self) -> Result<CompiledLayout> {
        let capacities = self.table.capacities();
        let mut ranges = Vec::new();
        let mut entries = Vec::new();

        for region in Region::ALL {
            let views = self.table.views(region);
            if views.is_empty() {
                continue;
            }
            let base_binding = capacities.base(region);
            ranges.push(DescriptorRange {
                region,
                base_register: 0,
                count: views.len() as u32,
                base_binding,
            });
            for (register, view) in views.iter().enumerate() {
                entries.push(BindingSlotDesc {
                    binding: base_binding + register as u32,
                    binding_type: binding_type(region, view),
                    stage_flags: ShaderStageFlags::ALL_GRAPHICS,
                });
            }
        }

        let sampler_base = capacities.total();
        let mut static_samplers: Vec<StaticSamplerDesc> = Vec::with_capacity(self.samplers.len());
        for sampler in &self.samplers {
            let Some(binding) = sampler_base.checked_add(sampler.register) else {
                engine_bail_warn!(Configuration; "galaxy3d::LayoutBuilder",
                    "Static sampler register s{} is out of range", sampler.register);
            };
            if static_samplers.iter().any(|s| s.binding == binding) {
                engine_bail_warn!(Configuration; "galaxy3d::LayoutBuilder",
                    "Static sampler register s{} declared twice", sampler.register);
            }
            static_samplers.push(StaticSamplerDesc {
                binding,
                filter: sampler.filter,
                address_mode: sampler.address_mode,
                stage_flags: ShaderStageFlags::PIXEL,
            });
        }

        Ok(CompiledLayout {
            capacities,
            ranges,
            desc: BindingLayoutDesc { entries, static_samplers },
        })
    }
}

fn binding_type(region: Region, view: &BoundView) -> BindingType {
    match (region, view) {
        (_, BoundView::Texture { .. }) => BindingType::SampledTexture,
        (_, BoundView::Constant { .. }) => BindingType::UniformBuffer,
        (Region::Writable, BoundView::Buffer { .. }) => BindingType::StorageBuffer,
        (_, BoundView::Buffer { .. }) => BindingType::ReadOnlyStorageBuffer,
    }
}

/// Result of `LayoutBuilder::build`
#[derive(Debug, Clone)]
pub struct CompiledLayout {
    capacities: RegionCapacities,
    ranges: Vec<DescriptorRange>,
    desc: BindingLayoutDesc,
}

impl CompiledLayout {
    pub fn ranges(&self) -> &[DescriptorRange] {
        &self.ranges
    }

    /// Device layout description
    pub fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }

    /// Binding number of a register, `None` past the region's capacity
    pub fn binding_for(&self, region: Region, register: u32) -> Option<u32> {
        (register < self.capacities.get(region)).then(|| self.capacities.base(region) + register)
    }

    pub fn sampler_binding(&self, register: u32) -> Option<u32> {
        let binding = self.capacities.total().checked_add(register)?;
        self.desc.static_samplers.iter().any(|s| s.binding == binding).then_some(binding)
    }

    /// Binding writes realizing every view of `table`
    pub fn writes<'t>(&self, table: &'t DescriptorTable) -> Vec<BindingWrite<'t>> {
        let mut writes = Vec::new();
        for region in Region::ALL {
            let base = self.capacities.base(region);
            for (register, view) in table.views(region).iter().enumerate() {
                let resource = match view {
                    BoundView::Texture { texture, .. } => BindingResource::SampledTexture(texture.as_ref()),
                    BoundView::Buffer { buffer, .. } => BindingResource::StorageBuffer(buffer.as_ref()),
                    BoundView::Constant { buffer, size, .. } => BindingResource::UniformBuffer(buffer.as_ref(), *size),
                };
                writes.push(BindingWrite { binding: base + register as u32, resource });
            }
        }
        writes
    }
}

#[cfg(test)]
#[path = "layout_builder_tests.rs"]
mod tests;
