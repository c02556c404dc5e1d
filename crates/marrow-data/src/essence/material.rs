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

//! Material factors and their GPU layout.

use bytemuck::{Pod, Zeroable};

/// PBR material parameters of a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Base color multiplier (linear RGBA).
    pub base_color_factor: [f32; 4],
    /// Emissive color multiplier (linear RGB).
    pub emissive_factor: [f32; 3],
    /// Metalness multiplier.
    pub metallic_factor: f32,
    /// Roughness multiplier.
    pub roughness_factor: f32,
    /// Alpha-test threshold; `None` for opaque materials.
    pub alpha_cutoff: Option<f32>,
    /// Index of the base color texture.
    pub base_color_texture: Option<usize>,
    /// Index of the metallic-roughness texture.
    pub metallic_roughness_texture: Option<usize>,
    /// Index of the normal map.
    pub normal_texture: Option<usize>,
    /// Index of the emissive texture.
    pub emissive_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            emissive_factor: [0.0; 3],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_cutoff: None,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            emissive_texture: None,
        }
    }
}

/// One entry of the per-primitive material storage buffer.
///
/// Texture indices are `-1` when the texture is absent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Base color multiplier.
    pub base_color_factor: [f32; 4],
    /// Emissive multiplier, `w` unused.
    pub emissive_factor: [f32; 4],
    /// Metalness multiplier.
    pub metallic_factor: f32,
    /// Roughness multiplier.
    pub roughness_factor: f32,
    /// Alpha-test threshold, negative when disabled.
    pub alpha_cutoff: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: f32,
    /// Base color, metallic-roughness, normal and emissive texture indices.
    pub texture_indices: [i32; 4],
}

fn texture_slot(index: Option<usize>) -> i32 {
    index.map_or(-1, |i| i as i32)
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        let [r, g, b] = material.emissive_factor;
        Self {
            base_color_factor: material.base_color_factor,
            emissive_factor: [r, g, b, 0.0],
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            alpha_cutoff: material.alpha_cutoff.unwrap_or(-1.0),
            _padding: 0.0,
            texture_indices: [
                texture_slot(material.base_color_texture),
                texture_slot(material.metallic_roughness_texture),
                texture_slot(material.normal_texture),
                texture_slot(material.emissive_texture),
            ],
        }
    }
}
