// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Binding layouts of the three passes and the binding sets each variant owns.
//!
//! Every pass binds two sets: set 0 holds pipeline-level data (owned by the
//! orchestrator), set 1 holds the variant's skin palette and, for the color pass,
//! the essence's materials: the material buffer, a sampler and
//! [`MAX_MATERIAL_TEXTURES`] texture slots. Slots the essence does not fill are
//! bound to the fallback texture. Variant sets are allocated once, at creation,
//! for every frame slot; afterwards only buffer contents change.

use super::PassKind;
use crate::scene_lane::SkinPalette;
use marrow_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BufferBindingType, GraphicsDevice, ResourceError,
    SamplerBindingType, SamplerId, ShaderStages, TextureSampleType, TextureViewDimension,
    TextureViewId,
};
use marrow_data::essence::{Essence, MAX_MATERIAL_TEXTURES};

const STORAGE_RO: BufferBindingType = BufferBindingType::Storage { read_only: true };

/// Binding of the material sampler in the color pass set 1.
pub const MATERIAL_SAMPLER_BINDING: u32 = 2;
/// Binding of the first material texture slot in the color pass set 1.
pub const MATERIAL_TEXTURE_BINDING: u32 = 3;

/// Resources bound in place of material textures an essence does not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialFallback {
    /// A small opaque white texture.
    pub texture: TextureViewId,
    /// Filtering sampler used by essences that bring no textures.
    pub sampler: SamplerId,
}

/// Entries of the pipeline-level set (set 0) of `kind`.
pub fn global_layout_entries(kind: PassKind) -> Vec<BindGroupLayoutEntry> {
    match kind {
        PassKind::Shadow { .. } => vec![BindGroupLayoutEntry::buffer(
            0,
            ShaderStages::VERTEX_FRAGMENT,
            BufferBindingType::Uniform,
            true,
        )],
        PassKind::DepthPrePass => vec![BindGroupLayoutEntry::buffer(
            0,
            ShaderStages::VERTEX,
            BufferBindingType::Uniform,
            false,
        )],
        PassKind::Color => vec![
            BindGroupLayoutEntry::buffer(
                0,
                ShaderStages::VERTEX_FRAGMENT,
                BufferBindingType::Uniform,
                false,
            ),
            BindGroupLayoutEntry::texture(
                1,
                ShaderStages::FRAGMENT,
                TextureSampleType::Depth,
                TextureViewDimension::Cube,
            ),
            BindGroupLayoutEntry::sampler(2, ShaderStages::FRAGMENT, SamplerBindingType::Comparison),
        ],
    }
}

/// Entries of the per-variant set (set 1) of `kind`.
pub fn variant_layout_entries(kind: PassKind) -> Vec<BindGroupLayoutEntry> {
    match kind {
        PassKind::Shadow { .. } | PassKind::DepthPrePass => {
            vec![BindGroupLayoutEntry::buffer(0, ShaderStages::VERTEX, STORAGE_RO, false)]
        }
        PassKind::Color => {
            let mut entries = vec![
                BindGroupLayoutEntry::buffer(0, ShaderStages::VERTEX, STORAGE_RO, false),
                BindGroupLayoutEntry::buffer(1, ShaderStages::FRAGMENT, STORAGE_RO, false),
                BindGroupLayoutEntry::sampler(
                    MATERIAL_SAMPLER_BINDING,
                    ShaderStages::FRAGMENT,
                    SamplerBindingType::Filtering,
                ),
            ];
            entries.extend((0..MAX_MATERIAL_TEXTURES as u32).map(|slot| {
                BindGroupLayoutEntry::texture(
                    MATERIAL_TEXTURE_BINDING + slot,
                    ShaderStages::FRAGMENT,
                    TextureSampleType::Float { filterable: true },
                    TextureViewDimension::D2,
                )
            }));
            entries
        }
    }
}

/// Material entries of the color pass set 1, everything but the palette.
fn material_entries(essence: &Essence, fallback: &MaterialFallback) -> Vec<BindGroupEntry> {
    let textures = essence.textures();
    let mut entries = Vec::with_capacity(MAX_MATERIAL_TEXTURES + 2);
    entries.push(BindGroupEntry::buffer(1, essence.material_buffer(), 0, None));
    entries.push(BindGroupEntry::sampler(
        MATERIAL_SAMPLER_BINDING,
        essence.sampler().unwrap_or(fallback.sampler),
    ));
    entries.extend((0..MAX_MATERIAL_TEXTURES).map(|slot| {
        BindGroupEntry::texture_view(
            MATERIAL_TEXTURE_BINDING + slot as u32,
            textures.get(slot).copied().unwrap_or(fallback.texture),
        )
    }));
    entries
}

/// Layouts of the per-variant sets, created once by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantLayouts {
    /// Set 1 of the shadow pass.
    pub shadow: BindGroupLayoutId,
    /// Set 1 of the depth pre-pass.
    pub depth: BindGroupLayoutId,
    /// Set 1 of the color pass.
    pub color: BindGroupLayoutId,
    /// Bound in the color set where an essence has no texture or sampler.
    pub fallback: MaterialFallback,
}

impl VariantLayouts {
    /// Creates the three per-variant layouts.
    pub fn create(
        device: &dyn GraphicsDevice,
        fallback: MaterialFallback,
    ) -> Result<Self, ResourceError> {
        let mut ids = [BindGroupLayoutId(0); 3];
        for (i, kind) in [PassKind::FIRST, PassKind::DepthPrePass, PassKind::Color]
            .into_iter()
            .enumerate()
        {
            let entries = variant_layout_entries(kind);
            let label = format!("Variant set ({})", kind.label());
            match device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(&label),
                entries: &entries,
            }) {
                Ok(id) => ids[i] = id,
                Err(e) => {
                    for &id in &ids[..i] {
                        if let Err(cleanup) = device.destroy_bind_group_layout(id) {
                            log::warn!(
                                "Failed to release variant layout {:?} after '{}' failed: {:?}",
                                id,
                                label,
                                cleanup
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            shadow: ids[0],
            depth: ids[1],
            color: ids[2],
            fallback,
        })
    }

    /// Destroys the three layouts.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for id in [self.shadow, self.depth, self.color] {
            if let Err(e) = device.destroy_bind_group_layout(id) {
                log::warn!("Failed to destroy variant layout {:?}: {:?}", id, e);
            }
        }
    }
}

/// The binding sets of one variant: one per pass per frame slot.
#[derive(Debug)]
pub struct VariantBindings {
    sets: Vec<[BindGroupId; 3]>,
}

impl VariantBindings {
    /// Allocates the sets of every frame slot, wired to that slot's palette buffer
    /// and to the essence's shared materials.
    ///
    /// Allocation failure is returned to the caller after releasing the sets
    /// already created; a variant without all of its sets cannot be drawn.
    pub fn new(
        device: &dyn GraphicsDevice,
        layouts: &VariantLayouts,
        palette: &SkinPalette,
        essence: &Essence,
        label: &str,
    ) -> Result<Self, ResourceError> {
        let materials = material_entries(essence, &layouts.fallback);
        let mut created: Vec<BindGroupId> = Vec::with_capacity(palette.buffers().len() * 3);
        let mut sets = Vec::with_capacity(palette.buffers().len());

        for (slot, &skin_buffer) in palette.buffers().iter().enumerate() {
            let mut ids = [BindGroupId(0); 3];
            for kind in [PassKind::FIRST, PassKind::DepthPrePass, PassKind::Color] {
                let (layout, entries) = match kind {
                    PassKind::Shadow { .. } => (
                        layouts.shadow,
                        vec![BindGroupEntry::buffer(0, skin_buffer, 0, None)],
                    ),
                    PassKind::DepthPrePass => (
                        layouts.depth,
                        vec![BindGroupEntry::buffer(0, skin_buffer, 0, None)],
                    ),
                    PassKind::Color => {
                        let mut entries = Vec::with_capacity(materials.len() + 1);
                        entries.push(BindGroupEntry::buffer(0, skin_buffer, 0, None));
                        entries.extend_from_slice(&materials);
                        (layouts.color, entries)
                    }
                };
                let set_label = format!("{label} {} [slot {slot}]", kind.label());
                let result = device.create_bind_group(&BindGroupDescriptor {
                    label: Some(&set_label),
                    layout,
                    entries: &entries,
                });
                match result {
                    Ok(id) => {
                        created.push(id);
                        ids[kind.binding_index()] = id;
                    }
                    Err(e) => {
                        log::error!("Failed to allocate binding set '{}': {}", set_label, e);
                        release(device, &created);
                        return Err(e);
                    }
                }
            }
            sets.push(ids);
        }

        Ok(Self { sets })
    }

    /// The set bound as set 1 by `kind` in frame slot `slot`.
    pub fn get(&self, slot: usize, kind: PassKind) -> BindGroupId {
        self.sets[slot][kind.binding_index()]
    }

    /// Number of frame slots covered.
    pub fn slot_count(&self) -> usize {
        self.sets.len()
    }

    /// Releases every set.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        let all: Vec<BindGroupId> = self.sets.iter().flatten().copied().collect();
        release(device, &all);
        self.sets.clear();
    }
}

fn release(device: &dyn GraphicsDevice, groups: &[BindGroupId]) {
    for &group in groups {
        if let Err(e) = device.destroy_bind_group(group) {
            log::warn!("Failed to destroy binding set {:?}: {:?}", group, e);
        }
    }
}
