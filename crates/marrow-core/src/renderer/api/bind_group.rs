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

//! Defines data structures for bind groups and bind group layouts.
//!
//! Bind groups are the mechanism for binding resources (buffers, textures, samplers)
//! to shaders. They abstract over descriptor sets in Vulkan and bind groups in WebGPU.

use crate::renderer::api::{
    buffer::BufferId,
    common::{SamplerId, ShaderStages, TextureViewId},
};
use std::num::NonZeroU64;

/// An opaque handle to a bind group layout resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// Describes a single binding entry in a bind group layout.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    /// The binding index inside the set.
    pub binding: u32,
    /// Which shader stages can access this binding.
    pub visibility: ShaderStages,
    /// The type of resource being bound.
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    /// Helper to create a layout entry for a buffer resource.
    pub fn buffer(
        binding: u32,
        visibility: ShaderStages,
        ty: BufferBindingType,
        has_dynamic_offset: bool,
    ) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Buffer {
                ty,
                has_dynamic_offset,
                min_binding_size: None,
            },
        }
    }

    /// Helper to create a layout entry for a sampled texture.
    pub fn texture(
        binding: u32,
        visibility: ShaderStages,
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
    ) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Texture {
                sample_type,
                view_dimension,
            },
        }
    }

    /// Helper to create a layout entry for a sampler.
    pub fn sampler(binding: u32, visibility: ShaderStages, ty: SamplerBindingType) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::Sampler(ty),
        }
    }
}

/// Describes the type of buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBindingType {
    /// A uniform buffer.
    Uniform,
    /// A storage buffer.
    Storage {
        /// Whether the buffer is read-only in the shader.
        read_only: bool,
    },
}

/// The dimension of a bound texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewDimension {
    /// A 2D texture view.
    D2,
    /// A cube texture view.
    Cube,
}

/// The type of texture sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSampleType {
    /// A floating-point texture sample.
    Float {
        /// Whether the texture can be filtered.
        filterable: bool,
    },
    /// A depth texture sample.
    Depth,
}

/// The type of sampler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerBindingType {
    /// A filtering sampler.
    Filtering,
    /// A comparison sampler, used for shadow lookups.
    Comparison,
}

/// The type of resource bound at a binding point.
#[derive(Debug, Clone)]
pub enum BindingType {
    /// A buffer binding (uniform or storage).
    Buffer {
        /// The type of buffer binding.
        ty: BufferBindingType,
        /// Whether this buffer has dynamic offsets.
        has_dynamic_offset: bool,
        /// Minimum size required for the buffer binding.
        min_binding_size: Option<NonZeroU64>,
    },
    /// A sampled texture binding.
    Texture {
        /// The type of sampler that can sample this texture.
        sample_type: TextureSampleType,
        /// The dimension of the texture view.
        view_dimension: TextureViewDimension,
    },
    /// A sampler binding.
    Sampler(SamplerBindingType),
}

/// Describes a bind group layout to be created.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The entries in this bind group layout.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// Describes a buffer binding with offset and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// The buffer to bind.
    pub buffer: BufferId,
    /// Offset into the buffer in bytes.
    pub offset: u64,
    /// Size of the binding, or `None` to bind from offset to the end of the buffer.
    pub size: Option<NonZeroU64>,
}

/// Describes a single resource binding in a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// Binds a buffer with optional offset and size.
    Buffer(BufferBinding),
    /// Binds a texture view.
    TextureView(TextureViewId),
    /// Binds a sampler.
    Sampler(SamplerId),
}

/// Describes a bind group to be created.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The layout this bind group conforms to.
    pub layout: BindGroupLayoutId,
    /// The resources to bind at each binding point.
    pub entries: &'a [BindGroupEntry],
}

/// A single entry in a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The binding index.
    pub binding: u32,
    /// The resource to bind.
    pub resource: BindingResource,
}

impl BindGroupEntry {
    /// Helper to create an entry binding a whole buffer, or a sized window of it.
    pub fn buffer(binding: u32, buffer: BufferId, offset: u64, size: Option<NonZeroU64>) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer(BufferBinding {
                buffer,
                offset,
                size,
            }),
        }
    }

    /// Helper to create an entry binding a texture view.
    pub fn texture_view(binding: u32, view: TextureViewId) -> Self {
        Self {
            binding,
            resource: BindingResource::TextureView(view),
        }
    }

    /// Helper to create an entry binding a sampler.
    pub fn sampler(binding: u32, sampler: SamplerId) -> Self {
        Self {
            binding,
            resource: BindingResource::Sampler(sampler),
        }
    }
}
