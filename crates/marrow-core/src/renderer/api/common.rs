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

//! Opaque handles and small shared types used across the rendering API.

use bitflags::bitflags;

/// The maximum number of frames the CPU may record ahead of the GPU.
///
/// Every CPU-mutable GPU resource is replicated at most this many times.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// An opaque handle to a texture view (render target, shadow face, material texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewId(pub usize);

/// An opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

/// An opaque handle to a compiled render pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a finished, submittable command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub usize);

/// The element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    #[default]
    Uint32,
}

bitflags! {
    /// Shader stages a binding or push-constant range is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// The vertex stage.
        const VERTEX = 1 << 0;
        /// The fragment stage.
        const FRAGMENT = 1 << 1;
        /// The compute stage.
        const COMPUTE = 1 << 2;
        /// Both raster stages.
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// Identifies one frame of the update/render loop.
///
/// `serial` counts frames since start-up, `slot` is the frame-in-flight copy of every
/// per-frame resource this frame may write (`serial mod frames_in_flight`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameIndex {
    /// Monotonic frame counter.
    pub serial: u64,
    /// The frame-in-flight slot owned by this frame.
    pub slot: usize,
}

impl FrameIndex {
    /// Creates the frame index for `serial` with `frames_in_flight` resource copies.
    pub fn new(serial: u64, frames_in_flight: usize) -> Self {
        debug_assert!(frames_in_flight > 0);
        Self {
            serial,
            slot: (serial % frames_in_flight as u64) as usize,
        }
    }

    /// Returns the index of the frame after this one.
    pub fn next(self, frames_in_flight: usize) -> Self {
        Self::new(self.serial + 1, frames_in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slots_cycle_through_frames_in_flight() {
        let mut frame = FrameIndex::new(0, 3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let slot = frame.slot;
                frame = frame.next(3);
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(frame.serial, 7);
    }

    #[test]
    fn vertex_fragment_contains_both_stages() {
        assert!(ShaderStages::VERTEX_FRAGMENT.contains(ShaderStages::VERTEX));
        assert!(ShaderStages::VERTEX_FRAGMENT.contains(ShaderStages::FRAGMENT));
        assert!(!ShaderStages::VERTEX_FRAGMENT.contains(ShaderStages::COMPUTE));
    }
}
