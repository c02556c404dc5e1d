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

//! The immutable, shared half of a model.
//!
//! An [`Essence`] is built once per unique asset from a [`MeshDescription`]. It
//! validates the description, derives everything a variant needs to walk the
//! hierarchy (parents, roots, draw order, joint flags, skin palette layout) and
//! owns the per-primitive material buffer. Variants hold it behind an `Arc` and only
//! ever read it, so any number of update workers may share it.

mod description;
mod material;

pub use self::description::{
    GpuGeometry, MeshDescription, NodeDescription, Primitive, SkinDescription, SubMesh,
};
pub use self::material::{Material, MaterialUniform};

use crate::animation::{AnimationClip, AnimationError, ClipSelector, Track};
use crate::node::Trs;
use ahash::AHashMap;
use marrow_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError, SamplerId,
    TextureViewId,
};
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

/// Number of material texture slots of the color pass binding set.
///
/// Texture indices stored in [`MaterialUniform`] address these slots directly.
pub const MAX_MATERIAL_TEXTURES: usize = 8;

/// A model description that cannot be turned into an [`Essence`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EssenceError {
    /// A node lists a child index past the end of the node table.
    #[error("Node {node} references missing child {child}")]
    ChildOutOfRange {
        /// The parent node.
        node: usize,
        /// The offending child index.
        child: usize,
    },
    /// A node is listed as a child more than once.
    #[error("Node {node} has more than one parent")]
    MultipleParents {
        /// The node with several parents.
        node: usize,
    },
    /// Some nodes are unreachable from any root.
    #[error("Node {node} is part of a cycle")]
    Cycle {
        /// A node on the cycle.
        node: usize,
    },
    /// A node references a sub-mesh that does not exist.
    #[error("Node {node} references missing mesh {mesh}")]
    MeshOutOfRange {
        /// The node.
        node: usize,
        /// The offending mesh index.
        mesh: usize,
    },
    /// A node references a skin that does not exist.
    #[error("Node {node} references missing skin {skin}")]
    SkinOutOfRange {
        /// The node.
        node: usize,
        /// The offending skin index.
        skin: usize,
    },
    /// A skin lists a joint index past the end of the node table.
    #[error("Skin {skin} references missing joint node {joint}")]
    JointOutOfRange {
        /// The skin.
        skin: usize,
        /// The offending node index.
        joint: usize,
    },
    /// A skin has a different number of inverse bind matrices and joints.
    #[error("Skin {skin} has {found} inverse bind matrices for {expected} joints")]
    InverseBindCount {
        /// The skin.
        skin: usize,
        /// Number of joints.
        expected: usize,
        /// Number of inverse bind matrices.
        found: usize,
    },
    /// A primitive references a material that does not exist.
    #[error("Mesh {mesh} references missing material {material}")]
    MaterialOutOfRange {
        /// The sub-mesh.
        mesh: usize,
        /// The offending material index.
        material: usize,
    },
    /// The model carries more textures than the color pass can bind.
    #[error("{count} material textures exceed the limit of {max}")]
    TooManyTextures {
        /// Number of textures in the description.
        count: usize,
        /// Number of texture slots available.
        max: usize,
    },
    /// A material references a texture that does not exist.
    #[error("Material {material} references missing texture {texture}")]
    TextureOutOfRange {
        /// The material.
        material: usize,
        /// The offending texture index.
        texture: usize,
    },
    /// Textures were supplied without a sampler to read them with.
    #[error("Material textures need a sampler")]
    MissingSampler,
    /// An animation channel targets a node that does not exist.
    #[error("Clip '{clip}' animates missing node {node}")]
    ChannelNodeOutOfRange {
        /// The clip name.
        clip: String,
        /// The offending node index.
        node: usize,
    },
    /// An animation channel is malformed.
    #[error("Clip '{clip}' channel {channel}: {reason}")]
    MalformedChannel {
        /// The clip name.
        clip: String,
        /// Index of the channel inside the clip.
        channel: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The material buffer could not be allocated.
    #[error("Failed to create material buffer: {0}")]
    Resource(#[from] ResourceError),
}

/// Read-only, shared rendering data of one model type.
#[derive(Debug)]
pub struct Essence {
    name: String,
    device: Arc<dyn GraphicsDevice>,
    nodes: Vec<NodeDescription>,
    parents: Vec<Option<usize>>,
    roots: Vec<usize>,
    draw_order: Vec<usize>,
    mesh_nodes: Vec<usize>,
    joint_flags: Vec<bool>,
    meshes: Vec<SubMesh>,
    primitive_base: Vec<u32>,
    primitive_count: u32,
    materials: Vec<Material>,
    textures: Vec<TextureViewId>,
    sampler: Option<SamplerId>,
    skins: Vec<SkinDescription>,
    skin_offsets: Vec<u32>,
    joint_count: u32,
    clips: Vec<AnimationClip>,
    clip_index: AHashMap<String, usize>,
    geometry: GpuGeometry,
    material_buffer: BufferId,
}

impl Essence {
    /// Validates `description`, derives the hierarchy tables and uploads the
    /// per-primitive material buffer.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        description: MeshDescription,
    ) -> Result<Arc<Self>, EssenceError> {
        let MeshDescription {
            name,
            nodes,
            meshes,
            materials,
            textures,
            sampler,
            skins,
            animations,
            geometry,
        } = description;

        let parents = derive_parents(&nodes)?;
        validate_node_refs(&nodes, meshes.len(), skins.len())?;
        validate_skins(&skins, nodes.len())?;
        validate_meshes(&meshes, materials.len())?;
        validate_textures(&materials, textures.len(), sampler.is_some())?;
        validate_clips(&animations, nodes.len())?;

        let roots: Vec<usize> = (0..nodes.len()).filter(|&i| parents[i].is_none()).collect();
        let draw_order = depth_first_order(&nodes, &roots);
        if draw_order.len() != nodes.len() {
            let mut seen = vec![false; nodes.len()];
            for &i in &draw_order {
                seen[i] = true;
            }
            let node = seen.iter().position(|s| !s).unwrap_or(0);
            return Err(EssenceError::Cycle { node });
        }

        let mesh_nodes: Vec<usize> = draw_order
            .iter()
            .copied()
            .filter(|&i| nodes[i].mesh.is_some())
            .collect();

        let mut joint_flags = vec![false; nodes.len()];
        let mut skin_offsets = Vec::with_capacity(skins.len());
        let mut joint_count = 0u32;
        for skin in &skins {
            skin_offsets.push(joint_count);
            joint_count += skin.joints.len() as u32;
            for &joint in &skin.joints {
                joint_flags[joint] = true;
            }
        }

        let mut primitive_base = Vec::with_capacity(meshes.len());
        let mut uniforms = Vec::new();
        for mesh in &meshes {
            primitive_base.push(uniforms.len() as u32);
            uniforms.extend(
                mesh.primitives
                    .iter()
                    .map(|p| MaterialUniform::from(&materials[p.material])),
            );
        }
        let primitive_count = uniforms.len() as u32;
        if uniforms.is_empty() {
            // Zero-sized buffers are not bindable.
            uniforms.push(MaterialUniform::from(&Material::default()));
        }

        let mut clip_index = AHashMap::with_capacity(animations.len());
        for (i, clip) in animations.iter().enumerate() {
            if clip.name.is_empty() {
                continue;
            }
            if clip_index.contains_key(&clip.name) {
                log::warn!(
                    "Essence '{}': duplicate clip name '{}', keeping the first one",
                    name,
                    clip.name
                );
                continue;
            }
            clip_index.insert(clip.name.clone(), i);
        }

        let material_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("{name} materials"))),
                size: std::mem::size_of_val(uniforms.as_slice()) as u64,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(uniforms.as_slice()),
        )?;

        log::info!(
            "Essence '{}' created: {} nodes, {} primitives, {} joints, {} clips",
            name,
            nodes.len(),
            primitive_count,
            joint_count,
            animations.len()
        );

        Ok(Arc::new(Self {
            name,
            device,
            nodes,
            parents,
            roots,
            draw_order,
            mesh_nodes,
            joint_flags,
            meshes,
            primitive_base,
            primitive_count,
            materials,
            textures,
            sampler,
            skins,
            skin_offsets,
            joint_count,
            clips: animations,
            clip_index,
            geometry,
            material_buffer,
        }))
    }

    /// Debug name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The static node table.
    pub fn nodes(&self) -> &[NodeDescription] {
        &self.nodes
    }

    /// Number of nodes of the hierarchy.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The parent of every node.
    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }

    /// Nodes without a parent.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Every node, parents before children, in depth-first order from the roots.
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    /// Nodes carrying a sub-mesh, in draw order.
    pub fn mesh_nodes(&self) -> &[usize] {
        &self.mesh_nodes
    }

    /// Whether `node` is a joint of some skin.
    pub fn is_joint(&self, node: usize) -> bool {
        self.joint_flags[node]
    }

    /// The rest pose of `node`.
    pub fn rest_pose(&self, node: usize) -> Trs {
        let desc = &self.nodes[node];
        Trs::new(desc.translation, desc.rotation, desc.scale)
    }

    /// The sub-mesh table.
    pub fn meshes(&self) -> &[SubMesh] {
        &self.meshes
    }

    /// Id of the first primitive of `mesh` in the material buffer.
    pub fn primitive_base(&self, mesh: usize) -> u32 {
        self.primitive_base[mesh]
    }

    /// Number of primitives over all sub-meshes.
    pub fn primitive_count(&self) -> u32 {
        self.primitive_count
    }

    /// The material table.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Texture views referenced by the materials.
    pub fn textures(&self) -> &[TextureViewId] {
        &self.textures
    }

    /// Sampler used with the material textures.
    pub fn sampler(&self) -> Option<SamplerId> {
        self.sampler
    }

    /// The skin table.
    pub fn skins(&self) -> &[SkinDescription] {
        &self.skins
    }

    /// First palette slot of `skin`.
    pub fn skin_offset(&self, skin: usize) -> u32 {
        self.skin_offsets[skin]
    }

    /// Number of joint matrices over all skins. Fixed for the essence's lifetime.
    pub fn joint_count(&self) -> u32 {
        self.joint_count
    }

    /// Vertex and index buffers.
    pub fn geometry(&self) -> &GpuGeometry {
        &self.geometry
    }

    /// Per-primitive material parameters, indexed by primitive id.
    pub fn material_buffer(&self) -> BufferId {
        self.material_buffer
    }

    /// The clip table.
    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// Returns the clip at `index`.
    pub fn clip(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }

    /// Names of the clips, in table order.
    pub fn clip_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.clips.iter().map(|c| c.name.as_str())
    }

    /// Finds a clip by name.
    pub fn clip_index(&self, name: &str) -> Option<usize> {
        self.clip_index.get(name).copied()
    }

    /// Resolves a selector to a clip index.
    pub fn resolve_clip(&self, selector: &ClipSelector) -> Result<usize, AnimationError> {
        match selector {
            ClipSelector::Name(name) => self
                .clip_index(name)
                .ok_or_else(|| AnimationError::UnknownClip(name.clone())),
            ClipSelector::Index(index) if *index < self.clips.len() => Ok(*index),
            ClipSelector::Index(index) => Err(AnimationError::ClipIndexOutOfRange {
                index: *index,
                count: self.clips.len(),
            }),
        }
    }
}

impl Drop for Essence {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.material_buffer) {
            log::warn!(
                "Failed to destroy material buffer of essence '{}': {:?}",
                self.name,
                e
            );
        }
    }
}

fn derive_parents(nodes: &[NodeDescription]) -> Result<Vec<Option<usize>>, EssenceError> {
    let mut parents = vec![None; nodes.len()];
    for (node, desc) in nodes.iter().enumerate() {
        for &child in &desc.children {
            if child >= nodes.len() {
                return Err(EssenceError::ChildOutOfRange { node, child });
            }
            if parents[child].is_some() {
                return Err(EssenceError::MultipleParents { node: child });
            }
            parents[child] = Some(node);
        }
    }
    Ok(parents)
}

fn validate_node_refs(
    nodes: &[NodeDescription],
    mesh_count: usize,
    skin_count: usize,
) -> Result<(), EssenceError> {
    for (node, desc) in nodes.iter().enumerate() {
        if let Some(mesh) = desc.mesh.filter(|&m| m >= mesh_count) {
            return Err(EssenceError::MeshOutOfRange { node, mesh });
        }
        if let Some(skin) = desc.skin.filter(|&s| s >= skin_count) {
            return Err(EssenceError::SkinOutOfRange { node, skin });
        }
    }
    Ok(())
}

fn validate_skins(skins: &[SkinDescription], node_count: usize) -> Result<(), EssenceError> {
    for (skin, desc) in skins.iter().enumerate() {
        if let Some(&joint) = desc.joints.iter().find(|&&j| j >= node_count) {
            return Err(EssenceError::JointOutOfRange { skin, joint });
        }
        if desc.inverse_bind_matrices.len() != desc.joints.len() {
            return Err(EssenceError::InverseBindCount {
                skin,
                expected: desc.joints.len(),
                found: desc.inverse_bind_matrices.len(),
            });
        }
    }
    Ok(())
}

fn validate_meshes(meshes: &[SubMesh], material_count: usize) -> Result<(), EssenceError> {
    for (mesh, desc) in meshes.iter().enumerate() {
        if let Some(p) = desc.primitives.iter().find(|p| p.material >= material_count) {
            return Err(EssenceError::MaterialOutOfRange {
                mesh,
                material: p.material,
            });
        }
    }
    Ok(())
}

fn validate_textures(
    materials: &[Material],
    texture_count: usize,
    has_sampler: bool,
) -> Result<(), EssenceError> {
    if texture_count > MAX_MATERIAL_TEXTURES {
        return Err(EssenceError::TooManyTextures {
            count: texture_count,
            max: MAX_MATERIAL_TEXTURES,
        });
    }
    if texture_count > 0 && !has_sampler {
        return Err(EssenceError::MissingSampler);
    }
    for (material, desc) in materials.iter().enumerate() {
        let referenced = [
            desc.base_color_texture,
            desc.metallic_roughness_texture,
            desc.normal_texture,
            desc.emissive_texture,
        ];
        if let Some(texture) = referenced.into_iter().flatten().find(|&t| t >= texture_count) {
            return Err(EssenceError::TextureOutOfRange { material, texture });
        }
    }
    Ok(())
}

fn validate_clips(clips: &[AnimationClip], node_count: usize) -> Result<(), EssenceError> {
    for clip in clips {
        for (channel, desc) in clip.channels.iter().enumerate() {
            if desc.node >= node_count {
                return Err(EssenceError::ChannelNodeOutOfRange {
                    clip: clip.name.clone(),
                    node: desc.node,
                });
            }
            let times = desc.track.times();
            let malformed = |reason| EssenceError::MalformedChannel {
                clip: clip.name.clone(),
                channel,
                reason,
            };
            if times.len() != desc.track.value_count() {
                return Err(malformed("keyframe time and value counts differ"));
            }
            if times.windows(2).any(|w| !(w[0] <= w[1])) {
                return Err(malformed("keyframe times are not sorted"));
            }
            if let Track::Rotation(k) = &desc.track {
                if k.values.iter().any(|q| !q.is_finite()) {
                    return Err(malformed("rotation keyframe is not finite"));
                }
            }
        }
    }
    Ok(())
}

fn depth_first_order(nodes: &[NodeDescription], roots: &[usize]) -> Vec<usize> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        order.push(node);
        stack.extend(nodes[node].children.iter().rev().copied());
    }
    order
}
