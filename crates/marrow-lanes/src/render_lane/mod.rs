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

//! Rendering lane: the vocabulary shared by the frame loop and the variants.
//!
//! A frame always records the same sequence of passes, see [`PassKind::FRAME_SEQUENCE`].
//! Per-pass differences are expressed by matching on [`PassKind`] rather than by one
//! type per pass.

mod binding_sets;
mod frame_uniforms;
mod push_constants;
mod uniforms;

pub use binding_sets::*;
pub use frame_uniforms::*;
pub use push_constants::*;
pub use uniforms::*;

/// Number of faces of the point-light shadow cube map.
pub const SHADOW_CUBE_FACES: u32 = 6;

/// The passes recorded every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Depth-only rendering into one face of the light's cube map.
    Shadow {
        /// Cube face, `0..6` in +X, -X, +Y, -Y, +Z, -Z order.
        face: u32,
    },
    /// Depth-only rendering from the camera.
    DepthPrePass,
    /// Final shaded rendering.
    Color,
}

impl PassKind {
    /// The first pass of every frame.
    pub const FIRST: PassKind = PassKind::Shadow { face: 0 };

    /// Every pass of one frame, in recording order.
    pub const FRAME_SEQUENCE: [PassKind; 8] = [
        PassKind::Shadow { face: 0 },
        PassKind::Shadow { face: 1 },
        PassKind::Shadow { face: 2 },
        PassKind::Shadow { face: 3 },
        PassKind::Shadow { face: 4 },
        PassKind::Shadow { face: 5 },
        PassKind::DepthPrePass,
        PassKind::Color,
    ];

    /// The pass that follows this one. The color pass is followed by the first
    /// shadow face of the next frame.
    pub fn next(self) -> PassKind {
        match self {
            PassKind::Shadow { face } if face + 1 < SHADOW_CUBE_FACES => {
                PassKind::Shadow { face: face + 1 }
            }
            PassKind::Shadow { .. } => PassKind::DepthPrePass,
            PassKind::DepthPrePass => PassKind::Color,
            PassKind::Color => PassKind::FIRST,
        }
    }

    /// Index of the per-variant binding set used by this pass (all shadow faces
    /// share one set).
    pub fn binding_index(self) -> usize {
        match self {
            PassKind::Shadow { .. } => 0,
            PassKind::DepthPrePass => 1,
            PassKind::Color => 2,
        }
    }

    /// Debug label of the pass.
    pub fn label(self) -> &'static str {
        match self {
            PassKind::Shadow { face: 0 } => "Shadow +X",
            PassKind::Shadow { face: 1 } => "Shadow -X",
            PassKind::Shadow { face: 2 } => "Shadow +Y",
            PassKind::Shadow { face: 3 } => "Shadow -Y",
            PassKind::Shadow { face: 4 } => "Shadow +Z",
            PassKind::Shadow { .. } => "Shadow -Z",
            PassKind::DepthPrePass => "Depth Pre-Pass",
            PassKind::Color => "Color",
        }
    }
}
