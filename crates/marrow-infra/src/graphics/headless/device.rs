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

use super::command::{HeadlessCommandEncoder, RecordedCommandBuffer, RecordedPass};
use marrow_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BindingResource, BindingType, BufferDescriptor,
    BufferId, BufferUsage, CommandBufferId, CommandEncoder, GraphicsDevice, ResourceError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A device-level operation, logged in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    /// A buffer was created.
    CreateBuffer(BufferId),
    /// A buffer was destroyed.
    DestroyBuffer(BufferId),
    /// Bytes were written into a buffer.
    WriteBuffer {
        /// Target buffer.
        buffer: BufferId,
        /// Byte offset of the write.
        offset: u64,
        /// Number of bytes written.
        len: usize,
    },
    /// A bind group was created.
    CreateBindGroup(BindGroupId),
    /// A bind group was destroyed.
    DestroyBindGroup(BindGroupId),
    /// A command buffer was submitted.
    Submit(CommandBufferId),
}

#[derive(Debug)]
struct HeadlessBufferEntry {
    label: Option<String>,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct FailurePlan {
    buffers_left: Option<usize>,
    bind_groups_left: Option<usize>,
    layouts_left: Option<usize>,
}

impl FailurePlan {
    /// Consumes one allocation from `budget`, returning `false` once it is spent.
    fn take(budget: &mut Option<usize>) -> bool {
        match budget {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct HeadlessDeviceInternal {
    buffers: Mutex<HashMap<BufferId, HeadlessBufferEntry>>,
    layouts: Mutex<HashMap<BindGroupLayoutId, Vec<BindGroupLayoutEntry>>>,
    bind_groups: Mutex<HashMap<BindGroupId, (BindGroupLayoutId, Vec<BindGroupEntry>)>>,
    pending_command_buffers: Mutex<HashMap<CommandBufferId, RecordedCommandBuffer>>,
    submitted: Mutex<Vec<RecordedCommandBuffer>>,
    ops: Mutex<Vec<DeviceOp>>,
    failures: Mutex<FailurePlan>,
    next_buffer_id: AtomicUsize,
    next_layout_id: AtomicUsize,
    next_bind_group_id: AtomicUsize,
    next_command_buffer_id: AtomicUsize,
}

impl HeadlessDeviceInternal {
    fn record(&self, op: DeviceOp) {
        self.ops.lock().unwrap().push(op);
    }

    pub(crate) fn store_finished(
        &self,
        label: Option<String>,
        passes: Vec<RecordedPass>,
    ) -> CommandBufferId {
        let id = CommandBufferId(self.next_command_buffer_id.fetch_add(1, Ordering::Relaxed));
        self.pending_command_buffers
            .lock()
            .unwrap()
            .insert(id, RecordedCommandBuffer { id, label, passes });
        id
    }
}

/// A graphics device that keeps every resource in host memory and records
/// command buffers instead of executing them.
///
/// Buffers hold real bytes, so uploads can be read back and compared. Bind
/// groups are validated against their layout and the live buffers. The device
/// can be told to fail after a number of allocations to exercise cleanup paths.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl HeadlessDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        log::info!("HeadlessDevice: created");
        Self::default()
    }

    /// Makes every buffer creation fail once `count` more buffers were created.
    pub fn fail_buffers_after(&self, count: usize) {
        self.internal.failures.lock().unwrap().buffers_left = Some(count);
    }

    /// Makes every bind group creation fail once `count` more groups were created.
    pub fn fail_bind_groups_after(&self, count: usize) {
        self.internal.failures.lock().unwrap().bind_groups_left = Some(count);
    }

    /// Makes every bind group layout creation fail once `count` more layouts were
    /// created.
    pub fn fail_layouts_after(&self, count: usize) {
        self.internal.failures.lock().unwrap().layouts_left = Some(count);
    }

    /// Removes any failure injection.
    pub fn clear_failures(&self) {
        *self.internal.failures.lock().unwrap() = FailurePlan::default();
    }

    /// Returns a copy of the bytes currently stored in a buffer.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.internal
            .buffers
            .lock()
            .unwrap()
            .get(&id)
            .map(|entry| entry.data.clone())
    }

    /// Returns the debug label a buffer was created with.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        self.internal
            .buffers
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|entry| entry.label.clone())
    }

    /// Returns the usage flags a buffer was created with.
    pub fn buffer_usage(&self, id: BufferId) -> Option<BufferUsage> {
        self.internal
            .buffers
            .lock()
            .unwrap()
            .get(&id)
            .map(|entry| entry.usage)
    }

    /// Number of buffers not yet destroyed.
    pub fn live_buffer_count(&self) -> usize {
        self.internal.buffers.lock().unwrap().len()
    }

    /// Number of bind groups not yet destroyed.
    pub fn live_bind_group_count(&self) -> usize {
        self.internal.bind_groups.lock().unwrap().len()
    }

    /// The resources a live bind group was created with.
    pub fn bind_group_entries(&self, id: BindGroupId) -> Option<Vec<BindGroupEntry>> {
        self.internal
            .bind_groups
            .lock()
            .unwrap()
            .get(&id)
            .map(|(_, entries)| entries.clone())
    }

    /// Number of bind group layouts not yet destroyed.
    pub fn live_layout_count(&self) -> usize {
        self.internal.layouts.lock().unwrap().len()
    }

    /// Number of writes made into `buffer` since the log was last cleared.
    pub fn write_count(&self, buffer: BufferId) -> usize {
        self.internal
            .ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, DeviceOp::WriteBuffer { buffer: b, .. } if *b == buffer))
            .count()
    }

    /// Total number of buffer writes since the log was last cleared.
    pub fn total_write_count(&self) -> usize {
        self.internal
            .ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, DeviceOp::WriteBuffer { .. }))
            .count()
    }

    /// The operation log.
    pub fn ops(&self) -> Vec<DeviceOp> {
        self.internal.ops.lock().unwrap().clone()
    }

    /// Empties the operation log.
    pub fn clear_ops(&self) {
        self.internal.ops.lock().unwrap().clear();
    }

    /// Every command buffer submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<RecordedCommandBuffer> {
        self.internal.submitted.lock().unwrap().clone()
    }

    /// Drains the submitted command buffers.
    pub fn take_submitted(&self) -> Vec<RecordedCommandBuffer> {
        std::mem::take(&mut *self.internal.submitted.lock().unwrap())
    }

    fn check_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<(), ResourceError> {
        let layouts = self.internal.layouts.lock().unwrap();
        let layout = layouts
            .get(&descriptor.layout)
            .ok_or(ResourceError::InvalidHandle)?;
        if layout.len() != descriptor.entries.len() {
            return Err(ResourceError::BackendError(format!(
                "bind group '{}' has {} entries, layout expects {}",
                descriptor.label.unwrap_or_default(),
                descriptor.entries.len(),
                layout.len()
            )));
        }

        let buffers = self.internal.buffers.lock().unwrap();
        for entry in descriptor.entries {
            let Some(slot) = layout.iter().find(|l| l.binding == entry.binding) else {
                return Err(ResourceError::BackendError(format!(
                    "binding {} is not part of the layout",
                    entry.binding
                )));
            };
            let kind_matches = matches!(
                (&slot.ty, entry.resource),
                (BindingType::Buffer { .. }, BindingResource::Buffer(_))
                    | (BindingType::Texture { .. }, BindingResource::TextureView(_))
                    | (BindingType::Sampler(_), BindingResource::Sampler(_))
            );
            if !kind_matches {
                return Err(ResourceError::BackendError(format!(
                    "binding {} holds a resource of the wrong kind",
                    entry.binding
                )));
            }
            if let BindingResource::Buffer(binding) = entry.resource {
                let buffer = buffers.get(&binding.buffer).ok_or(ResourceError::NotFound)?;
                let end = binding.offset + binding.size.map_or(0, |s| s.get());
                if end > buffer.data.len() as u64 {
                    return Err(ResourceError::OutOfBounds);
                }
            }
        }
        Ok(())
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or_default();
        if !FailurePlan::take(&mut self.internal.failures.lock().unwrap().buffers_left) {
            log::error!("HeadlessDevice: Refusing buffer '{label}' (injected exhaustion)");
            return Err(ResourceError::Exhausted(format!("buffer '{label}'")));
        }

        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        self.internal.buffers.lock().unwrap().insert(
            id,
            HeadlessBufferEntry {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        self.internal.record(DeviceOp::CreateBuffer(id));
        log::trace!(
            "HeadlessDevice: Created buffer '{label}' with ID: {id:?}, size: {} bytes",
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        let id = self.create_buffer(descriptor)?;
        if let Some(entry) = self.internal.buffers.lock().unwrap().get_mut(&id) {
            entry.data[..data.len()].copy_from_slice(data);
        }
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        if self.internal.buffers.lock().unwrap().remove(&id).is_none() {
            log::warn!("HeadlessDevice: Attempted to destroy unknown buffer {id:?}");
            return Err(ResourceError::NotFound);
        }
        self.internal.record(DeviceOp::DestroyBuffer(id));
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        {
            let mut buffers = self.internal.buffers.lock().unwrap();
            let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
            let start = offset as usize;
            let end = start
                .checked_add(data.len())
                .ok_or(ResourceError::OutOfBounds)?;
            if end > entry.data.len() {
                return Err(ResourceError::OutOfBounds);
            }
            entry.data[start..end].copy_from_slice(data);
        }
        self.internal.record(DeviceOp::WriteBuffer {
            buffer: id,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        if !FailurePlan::take(&mut self.internal.failures.lock().unwrap().layouts_left) {
            let label = descriptor.label.unwrap_or_default();
            log::error!(
                "HeadlessDevice: Refusing bind group layout '{label}' (injected exhaustion)"
            );
            return Err(ResourceError::Exhausted(format!("bind group layout '{label}'")));
        }
        let id = BindGroupLayoutId(self.internal.next_layout_id.fetch_add(1, Ordering::Relaxed));
        self.internal
            .layouts
            .lock()
            .unwrap()
            .insert(id, descriptor.entries.to_vec());
        log::debug!(
            "HeadlessDevice: Created bind group layout '{}' with ID: {id:?}",
            descriptor.label.unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_bind_group_layout(&self, id: BindGroupLayoutId) -> Result<(), ResourceError> {
        self.internal
            .layouts
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        self.check_bind_group(descriptor)?;
        if !FailurePlan::take(&mut self.internal.failures.lock().unwrap().bind_groups_left) {
            let label = descriptor.label.unwrap_or_default();
            log::error!("HeadlessDevice: Refusing bind group '{label}' (injected exhaustion)");
            return Err(ResourceError::Exhausted(format!("bind group '{label}'")));
        }

        let id = BindGroupId(
            self.internal
                .next_bind_group_id
                .fetch_add(1, Ordering::Relaxed),
        );
        self.internal
            .bind_groups
            .lock()
            .unwrap()
            .insert(id, (descriptor.layout, descriptor.entries.to_vec()));
        self.internal.record(DeviceOp::CreateBindGroup(id));
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        if self.internal.bind_groups.lock().unwrap().remove(&id).is_none() {
            log::warn!("HeadlessDevice: Attempted to destroy unknown bind group {id:?}");
            return Err(ResourceError::NotFound);
        }
        self.internal.record(DeviceOp::DestroyBindGroup(id));
        Ok(())
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder {
            device: self.internal.clone(),
            label: label.map(str::to_owned),
            passes: Vec::new(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let pending = self
            .internal
            .pending_command_buffers
            .lock()
            .unwrap()
            .remove(&command_buffer);
        match pending {
            Some(buffer) => {
                self.internal.submitted.lock().unwrap().push(buffer);
                self.internal.record(DeviceOp::Submit(command_buffer));
            }
            None => log::error!(
                "Attempted to submit a CommandBufferId ({command_buffer:?}) that does not exist."
            ),
        }
    }
}
