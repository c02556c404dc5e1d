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

//! Provides the public, backend-agnostic rendering contracts for Marrow.
//!
//! This module defines the "common language" for all rendering operations: the
//! abstract `traits` (like [`GraphicsDevice`]), the descriptors handed to them (like
//! [`BufferDescriptor`]) and the error types returned by them.
//!
//! The 'how' is provided by a backend implementing these traits (see the
//! `marrow-infra` crate). The lanes and agents only ever talk to the traits.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{RenderError, ResourceError};
pub use self::traits::{CommandEncoder, FrameFence, GraphicsDevice, RenderPass};
