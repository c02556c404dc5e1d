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

//! # Marrow Infra
//!
//! Concrete implementations of the contracts defined in `marrow-core`.
//!
//! The only backend shipped here is [`HeadlessDevice`]: an in-memory GPU that keeps
//! buffer contents, records every pass and draw, and can be told to fail
//! allocations. Tests and the headless sandbox run the whole pipeline against it.

#![warn(missing_docs)]

pub mod graphics;

pub use graphics::headless::{
    DeviceOp, FenceEvent, HeadlessDevice, HeadlessFence, PassCommand, RecordedCommandBuffer,
    RecordedPass,
};
