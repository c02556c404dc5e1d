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

use crate::renderer::api::*;
use std::ops::Range;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPass` is obtained from a [`CommandEncoder`] and ends when dropped.
pub trait RenderPass {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);

    /// Binds a resource set at `index`, with one dynamic offset per dynamic binding.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, dynamic_offsets: &[u32]);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat);

    /// Uploads a small per-draw parameter block.
    fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]);

    /// Records an indexed draw call.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` builds a [`CommandBufferId`]. Only one pass can be active at a
/// time since the returned pass borrows the encoder mutably.
pub trait CommandEncoder: Send {
    /// Begins a new render pass. Dropping the returned object ends the pass.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder>;

    /// Finalizes the command recording and returns a handle to the command buffer.
    ///
    /// Dropping an encoder without calling `finish` discards everything it recorded.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
