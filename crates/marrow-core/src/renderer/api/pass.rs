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

//! Descriptors and types for render passes.

use crate::renderer::api::common::TextureViewId;

/// Describes the operation to perform on an attachment at the start of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// The existing contents of the attachment are loaded into the pass.
    Load,
    /// The attachment is cleared to the specified value before the pass begins.
    Clear(V),
}

/// Describes the operation to perform on an attachment at the end of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// The results of the render pass are stored to the attachment's memory.
    Store,
    /// The results are discarded, leaving the attachment's memory undefined.
    Discard,
}

/// Defines the load and store operations for a single render pass attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// The operation to perform at the beginning of the pass.
    pub load: LoadOp<V>,
    /// The operation to perform at the end of the pass.
    pub store: StoreOp,
}

/// A color attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The view that will be rendered to.
    pub view: TextureViewId,
    /// The view receiving the resolved output of a multisampled `view`.
    pub resolve_target: Option<TextureViewId>,
    /// The load and store operations for this color attachment (linear RGBA clear).
    pub ops: Operations<[f32; 4]>,
}

/// A depth attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// The view of the depth texture (for the shadow pass, one cube face).
    pub view: TextureViewId,
    /// The load and store operations for the depth aspect.
    pub depth_ops: Option<Operations<f32>>,
}

/// A descriptor for a render pass.
#[derive(Debug, Default)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label for the render pass.
    pub label: Option<&'a str>,
    /// The color attachments used in the pass. Empty for depth-only passes.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// An optional depth attachment for this pass.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}
