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

//! Per-draw parameter blocks pushed before each indexed draw.
//!
//! `skin_offset` is the first palette slot of the drawn node's skin, or `-1` for
//! rigid meshes.

use bytemuck::{Pod, Zeroable};
use marrow_core::math::{to_gpu, Mat4};

/// Largest parameter block pushed by any pass, in bytes.
pub const MAX_PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<ColorPush>() as u32;

/// Parameters of one draw into a shadow cube face.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowPush {
    /// Model-to-world transform.
    pub model: [[f32; 4]; 4],
    /// Cube face being rendered.
    pub face: u32,
    /// First palette slot, `-1` when not skinned.
    pub skin_offset: i32,
    /// Padding to a 16-byte boundary.
    pub _padding: [u32; 2],
}

impl ShadowPush {
    /// Builds the block for one draw.
    pub fn new(model: &Mat4, face: u32, skin_offset: Option<u32>) -> Self {
        Self {
            model: to_gpu(model),
            face,
            skin_offset: skin_slot(skin_offset),
            _padding: [0; 2],
        }
    }
}

/// Parameters of one draw in the depth pre-pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DepthPush {
    /// Model-to-world transform.
    pub model: [[f32; 4]; 4],
    /// First palette slot, `-1` when not skinned.
    pub skin_offset: i32,
    /// Padding to a 16-byte boundary.
    pub _padding: [u32; 3],
}

impl DepthPush {
    /// Builds the block for one draw.
    pub fn new(model: &Mat4, skin_offset: Option<u32>) -> Self {
        Self {
            model: to_gpu(model),
            skin_offset: skin_slot(skin_offset),
            _padding: [0; 3],
        }
    }
}

/// Parameters of one draw in the color pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorPush {
    /// Model-to-world transform of the drawn node.
    pub model: [[f32; 4]; 4],
    /// Inverse global transform of the drawn node. Skinned vertices are
    /// transformed by `model * node_inverse * skin`, which cancels the node's own
    /// transform.
    pub node_inverse: [[f32; 4]; 4],
    /// First palette slot, `-1` when not skinned.
    pub skin_offset: i32,
    /// Index into the essence's material buffer.
    pub primitive_id: u32,
    /// Padding to a 16-byte boundary.
    pub _padding: [u32; 2],
}

impl ColorPush {
    /// Builds the block for one draw.
    pub fn new(model: &Mat4, node_inverse: &Mat4, skin_offset: Option<u32>, primitive_id: u32) -> Self {
        Self {
            model: to_gpu(model),
            node_inverse: to_gpu(node_inverse),
            skin_offset: skin_slot(skin_offset),
            primitive_id,
            _padding: [0; 2],
        }
    }
}

fn skin_slot(offset: Option<u32>) -> i32 {
    offset.map_or(-1, |o| o as i32)
}
