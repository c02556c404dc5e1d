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

use super::device::HeadlessDeviceInternal;
use marrow_core::renderer::{
    BindGroupId, BufferId, CommandBufferId, CommandEncoder, IndexFormat,
    RenderPass, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, RenderPipelineId, ShaderStages,
};
use std::ops::Range;
use std::sync::Arc;

/// One command recorded inside a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassCommand {
    /// `set_pipeline`.
    SetPipeline(RenderPipelineId),
    /// `set_bind_group`.
    SetBindGroup {
        /// Set index.
        index: u32,
        /// Bound group.
        group: BindGroupId,
        /// Dynamic offsets.
        offsets: Vec<u32>,
    },
    /// `set_vertex_buffer`.
    SetVertexBuffer {
        /// Vertex buffer slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// `set_index_buffer`.
    SetIndexBuffer {
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Index element type.
        format: IndexFormat,
    },
    /// `set_push_constants`.
    PushConstants {
        /// Visible stages.
        stages: ShaderStages,
        /// Byte offset.
        offset: u32,
        /// Pushed bytes.
        data: Vec<u8>,
    },
    /// `draw_indexed`.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Value added to each index.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
}

/// A render pass as it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    /// Debug label of the pass.
    pub label: Option<String>,
    /// Color attachments.
    pub color_attachments: Vec<RenderPassColorAttachment>,
    /// Depth attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
    /// Commands in recording order.
    pub commands: Vec<PassCommand>,
}

impl RecordedPass {
    /// Number of indexed draws in the pass.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PassCommand::DrawIndexed { .. }))
            .count()
    }
}

/// A finished command buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommandBuffer {
    /// Id handed out by `finish`.
    pub id: CommandBufferId,
    /// Debug label of the encoder.
    pub label: Option<String>,
    /// Passes in recording order.
    pub passes: Vec<RecordedPass>,
}

pub(crate) struct HeadlessCommandEncoder {
    pub(crate) device: Arc<HeadlessDeviceInternal>,
    pub(crate) label: Option<String>,
    pub(crate) passes: Vec<RecordedPass>,
}

struct HeadlessRenderPass<'a> {
    pass: &'a mut RecordedPass,
}

impl RenderPass for HeadlessRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.pass.commands.push(PassCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, dynamic_offsets: &[u32]) {
        self.pass.commands.push(PassCommand::SetBindGroup {
            index,
            group: bind_group,
            offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.pass.commands.push(PassCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat) {
        self.pass.commands.push(PassCommand::SetIndexBuffer {
            buffer,
            offset,
            format: index_format,
        });
    }

    fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) {
        self.pass.commands.push(PassCommand::PushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.commands.push(PassCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        self.passes.push(RecordedPass {
            label: descriptor.label.map(str::to_owned),
            color_attachments: descriptor.color_attachments.to_vec(),
            depth_stencil_attachment: descriptor.depth_stencil_attachment,
            commands: Vec::new(),
        });
        let index = self.passes.len() - 1;
        Box::new(HeadlessRenderPass {
            pass: &mut self.passes[index],
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let encoder = *self;
        encoder.device.store_finished(encoder.label, encoder.passes)
    }
}
