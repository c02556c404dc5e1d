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

//! Backend-agnostic rendering API.
//!
//! - **[`buffer`]**: GPU buffer handles, usages and descriptors.
//! - **[`bind_group`]**: binding layouts and the resource sets bound to shaders.
//! - **[`pass`]**: render pass descriptors and attachment operations.
//! - **[`common`]**: opaque ids, shared enums and frame-in-flight bookkeeping.

pub mod bind_group;
pub mod buffer;
pub mod common;
pub mod pass;

pub use self::bind_group::*;
pub use self::buffer::*;
pub use self::common::*;
pub use self::pass::*;
