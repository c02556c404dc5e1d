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

//! Runtime node state owned by one variant.

use marrow_core::math::{compose_trs, Mat4, Quat, Vec3};

/// A decomposed transform: translation, rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    /// Translation component.
    pub translation: Vec3,
    /// Rotation component, kept normalized.
    pub rotation: Quat,
    /// Non-uniform scale component.
    pub scale: Vec3,
}

impl Trs {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Creates a transform from its components.
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Returns the `T * R * S` matrix of this transform.
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        compose_trs(self.translation, self.rotation, self.scale)
    }

    /// Interpolates from `self` (at `t = 0`) towards `other` (at `t = 1`).
    ///
    /// Translation and scale are mixed linearly, rotation is slerped.
    #[inline]
    pub fn blend(&self, other: &Trs, t: f32) -> Trs {
        Trs {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One node of a variant's private copy of the model hierarchy.
///
/// The static part (children, mesh, skin) lives in the essence; the node is found
/// there under the same index.
#[derive(Debug, Clone)]
pub struct Node {
    /// The pose written by the active clip.
    pub current: Trs,
    /// The pose written by the outgoing clip during a cross-fade.
    pub previous: Trs,
    /// Cached local matrix (blended TRS composed with the static node matrix).
    pub local: Mat4,
    /// Cached global matrix (ancestors' locals, root-first, times `local`).
    pub global: Mat4,
    /// `placement * global`, only maintained for mesh nodes.
    pub model: Mat4,
    /// Inverse of `global`, only maintained for joints and skinned mesh nodes.
    pub inverse_global: Mat4,
    /// The local transform must be rebuilt before the next propagation.
    pub local_dirty: bool,
    /// Some descendant has `local_dirty` set.
    pub subtree_dirty: bool,
    /// Update generation in which `global` last changed.
    pub changed_generation: u64,
}

impl Node {
    /// Creates a node resting in `rest`. Everything is marked dirty so the first
    /// propagation computes the whole tree.
    pub fn new(rest: Trs) -> Self {
        Self {
            current: rest,
            previous: rest,
            local: Mat4::IDENTITY,
            global: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            inverse_global: Mat4::IDENTITY,
            local_dirty: true,
            subtree_dirty: false,
            changed_generation: 0,
        }
    }

    /// Whether `global` was recomputed during update `generation`.
    #[inline]
    pub fn changed_in(&self, generation: u64) -> bool {
        self.changed_generation == generation
    }
}
