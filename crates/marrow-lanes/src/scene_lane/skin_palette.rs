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

//! CPU staging and frame-buffered GPU copies of a variant's joint matrices.

use marrow_core::math::Mat4;
use marrow_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError,
};
use marrow_data::dirty::DirtyCounter;
use marrow_data::essence::Essence;
use marrow_data::node::Node;
use std::borrow::Cow;

/// Size in bytes of one joint matrix in the palette buffer.
pub const JOINT_MATRIX_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

/// The skinning matrices of one variant.
///
/// Every skin owns a fixed, contiguous range of the palette (see
/// `Essence::skin_offset`). The staging array is written on the CPU during update;
/// each frame slot has its own GPU buffer which receives the whole staging array
/// while the dirty counter is non-zero.
#[derive(Debug)]
pub struct SkinPalette {
    staging: Vec<Mat4>,
    buffers: Vec<BufferId>,
    dirty: DirtyCounter,
}

impl SkinPalette {
    /// Allocates one palette buffer per frame slot.
    ///
    /// The palette always holds at least one matrix so the buffer stays bindable.
    /// On failure, the buffers created so far are released.
    pub fn new(
        device: &dyn GraphicsDevice,
        essence: &Essence,
        frames_in_flight: usize,
        label: &str,
    ) -> Result<Self, ResourceError> {
        let len = (essence.joint_count() as usize).max(1);
        let mut buffers = Vec::with_capacity(frames_in_flight);
        for slot in 0..frames_in_flight {
            let created = device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(format!("{label} skin palette [slot {slot}]"))),
                size: len as u64 * JOINT_MATRIX_SIZE,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            });
            match created {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    release_buffers(device, &buffers);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            staging: vec![Mat4::IDENTITY; len],
            buffers,
            dirty: DirtyCounter::new(frames_in_flight),
        })
    }

    /// Recomputes the joint matrices whose node changed in update `generation`.
    ///
    /// Returns `true` if any matrix changed, in which case every frame slot is
    /// scheduled for a re-upload.
    pub fn refresh(&mut self, essence: &Essence, nodes: &[Node], generation: u64) -> bool {
        let mut changed = false;
        for (skin_index, skin) in essence.skins().iter().enumerate() {
            let offset = essence.skin_offset(skin_index) as usize;
            for (j, (&joint, inverse_bind)) in skin
                .joints
                .iter()
                .zip(skin.inverse_bind_matrices.iter())
                .enumerate()
            {
                let node = &nodes[joint];
                if node.changed_in(generation) {
                    self.staging[offset + j] = node.global * *inverse_bind;
                    changed = true;
                }
            }
        }
        if changed {
            self.dirty.mark();
        }
        changed
    }

    /// Copies the staging array into the buffer of `slot` if some slot is still
    /// stale. Returns whether an upload happened.
    pub fn upload(&mut self, device: &dyn GraphicsDevice, slot: usize) -> Result<bool, ResourceError> {
        if !self.dirty.is_dirty() {
            return Ok(false);
        }
        device.write_buffer(self.buffers[slot], 0, bytemuck::cast_slice(self.staging.as_slice()))?;
        self.dirty.consume();
        Ok(true)
    }

    /// The palette buffer of frame slot `slot`.
    pub fn buffer(&self, slot: usize) -> BufferId {
        self.buffers[slot]
    }

    /// Every per-slot palette buffer.
    pub fn buffers(&self) -> &[BufferId] {
        &self.buffers
    }

    /// The CPU-side joint matrices.
    pub fn matrices(&self) -> &[Mat4] {
        &self.staging
    }

    /// Number of uploads still pending.
    pub fn pending_uploads(&self) -> usize {
        self.dirty.remaining()
    }

    /// Releases the per-slot buffers.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        release_buffers(device, &self.buffers);
        self.buffers.clear();
    }
}

fn release_buffers(device: &dyn GraphicsDevice, buffers: &[BufferId]) {
    for &buffer in buffers {
        if let Err(e) = device.destroy_buffer(buffer) {
            log::warn!("Failed to destroy skin palette buffer {:?}: {:?}", buffer, e);
        }
    }
}
