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

//! Parsed model description handed over by the asset layer.

use crate::animation::AnimationClip;
use crate::essence::material::Material;
use marrow_core::math::{Mat4, Quat, Vec3};
use marrow_core::renderer::{BufferId, IndexFormat, SamplerId, TextureViewId};

/// Static description of one node of the model hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescription {
    /// Node name, for tools and debugging.
    pub name: String,
    /// Indices of the child nodes.
    pub children: Vec<usize>,
    /// Index of the sub-mesh drawn at this node.
    pub mesh: Option<usize>,
    /// Index of the skin deforming this node's sub-mesh.
    pub skin: Option<usize>,
    /// Rest translation.
    pub translation: Vec3,
    /// Rest rotation.
    pub rotation: Quat,
    /// Rest scale.
    pub scale: Vec3,
    /// Static matrix composed after the TRS (bind-pose adjustment).
    pub matrix: Mat4,
}

impl Default for NodeDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            children: Vec::new(),
            mesh: None,
            skin: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            matrix: Mat4::IDENTITY,
        }
    }
}

/// A range of the shared index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// First index in the index buffer.
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Value added to each index before fetching the vertex.
    pub vertex_offset: i32,
    /// Index into the material table.
    pub material: usize,
}

/// The primitives attached to one mesh node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMesh {
    /// Primitives in draw order.
    pub primitives: Vec<Primitive>,
}

/// Joints and inverse bind matrices of one skin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinDescription {
    /// Skin name, for tools and debugging.
    pub name: String,
    /// Node indices of the joints, in palette order.
    pub joints: Vec<usize>,
    /// One inverse bind matrix per joint.
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// GPU geometry already uploaded by the asset layer. Owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuGeometry {
    /// Interleaved vertex buffer (position, normal, uv, joints, weights).
    pub vertex_buffer: BufferId,
    /// Index buffer shared by every primitive.
    pub index_buffer: BufferId,
    /// Element type of `index_buffer`.
    pub index_format: IndexFormat,
}

/// Everything the asset layer extracted from one model file.
#[derive(Debug, Clone)]
pub struct MeshDescription {
    /// Debug name of the model.
    pub name: String,
    /// Node hierarchy. Roots are the nodes nobody lists as a child.
    pub nodes: Vec<NodeDescription>,
    /// Sub-meshes referenced by `NodeDescription::mesh`.
    pub meshes: Vec<SubMesh>,
    /// Materials referenced by `Primitive::material`.
    pub materials: Vec<Material>,
    /// Texture views referenced by material texture indices.
    pub textures: Vec<TextureViewId>,
    /// Sampler used with `textures`.
    pub sampler: Option<SamplerId>,
    /// Skins referenced by `NodeDescription::skin`.
    pub skins: Vec<SkinDescription>,
    /// Animation clips.
    pub animations: Vec<AnimationClip>,
    /// Vertex and index buffers.
    pub geometry: GpuGeometry,
}
