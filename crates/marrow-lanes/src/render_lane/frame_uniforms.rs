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

//! Frame-buffered GPU copies of a CPU-side uniform value.
//!
//! ```text
//! set(v)         -> counter = N
//! frame f, slot 0: upload, counter = N-1
//! frame f+1, slot 1: upload, counter = N-2
//! ...            -> counter = 0, uploads stop until the next set()
//! ```
//!
//! Each slot is only written after the frame fence released it, so a slot still
//! read by the GPU is never overwritten.

use bytemuck::Pod;
use marrow_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError,
};
use marrow_data::dirty::DirtyCounter;
use std::borrow::Cow;

/// A uniform value replicated once per frame slot, re-uploaded only after it
/// changes.
#[derive(Debug)]
pub struct FrameBuffered<T: Pod> {
    value: T,
    buffers: Vec<BufferId>,
    dirty: DirtyCounter,
    label: &'static str,
}

impl<T: Pod> FrameBuffered<T> {
    /// Allocates one uniform buffer per frame slot. Every slot receives `initial`
    /// during the first `frames_in_flight` uploads.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if buffer creation fails; buffers created before
    /// the failure are released.
    pub fn new(
        device: &dyn GraphicsDevice,
        initial: T,
        frames_in_flight: usize,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut buffers = Vec::with_capacity(frames_in_flight);
        for slot in 0..frames_in_flight {
            let buffer_label = match slot {
                0 => Cow::Borrowed(label),
                _ => Cow::Owned(format!("{label} [slot {slot}]")),
            };
            let created = device.create_buffer(&BufferDescriptor {
                label: Some(buffer_label),
                size: std::mem::size_of::<T>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            });
            match created {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    Self::release(device, &buffers, label);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            value: initial,
            buffers,
            dirty: DirtyCounter::new(frames_in_flight),
            label,
        })
    }

    /// Replaces the CPU-side value. Returns `false`, and schedules nothing, when
    /// the new value is bit-identical to the cached one.
    pub fn set(&mut self, value: T) -> bool {
        if bytemuck::bytes_of(&self.value) == bytemuck::bytes_of(&value) {
            return false;
        }
        self.value = value;
        self.dirty.mark();
        true
    }

    /// Writes the value into the buffer of `slot` if some slot is still stale.
    /// Returns whether an upload happened.
    pub fn upload(&mut self, device: &dyn GraphicsDevice, slot: usize) -> Result<bool, ResourceError> {
        if !self.dirty.is_dirty() {
            return Ok(false);
        }
        device.write_buffer(self.buffers[slot], 0, bytemuck::bytes_of(&self.value))?;
        self.dirty.consume();
        log::trace!("{} uploaded into slot {}", self.label, slot);
        Ok(true)
    }

    /// The cached value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The buffer of frame slot `slot`.
    pub fn buffer(&self, slot: usize) -> BufferId {
        self.buffers[slot]
    }

    /// Number of uploads still pending.
    pub fn pending_uploads(&self) -> usize {
        self.dirty.remaining()
    }

    /// Releases the per-slot buffers.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        Self::release(device, &self.buffers, self.label);
        self.buffers.clear();
    }

    fn release(device: &dyn GraphicsDevice, buffers: &[BufferId], label: &str) {
        for &buffer in buffers {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy {} buffer {:?}: {:?}", label, buffer, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_infra::HeadlessDevice;

    #[test]
    fn change_reaches_every_slot_exactly_once() {
        let device = HeadlessDevice::new();
        let mut uniform = FrameBuffered::new(&device, [0.0f32; 4], 3, "Test").unwrap();
        // Initial value goes to every slot once.
        let initial: usize = (0..6).filter(|f| uniform.upload(&device, f % 3).unwrap()).count();
        assert_eq!(initial, 3);

        assert!(uniform.set([1.0, 0.0, 0.0, 0.0]));
        let uploads: Vec<bool> = (0..6).map(|f| uniform.upload(&device, f % 3).unwrap()).collect();
        assert_eq!(uploads, vec![true, true, true, false, false, false]);
        for slot in 0..3 {
            assert_eq!(
                device.buffer_contents(uniform.buffer(slot)).unwrap()[..4],
                1.0f32.to_le_bytes()
            );
        }
    }

    #[test]
    fn unchanged_value_schedules_nothing() {
        let device = HeadlessDevice::new();
        let mut uniform = FrameBuffered::new(&device, 7u32, 2, "Test").unwrap();
        while uniform.upload(&device, 0).unwrap() {}
        assert!(!uniform.set(7));
        assert_eq!(uniform.pending_uploads(), 0);
    }

    #[test]
    fn destroy_releases_every_slot() {
        let device = HeadlessDevice::new();
        let mut uniform = FrameBuffered::new(&device, 0u32, 3, "Test").unwrap();
        assert_eq!(device.live_buffer_count(), 3);
        uniform.destroy(&device);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
