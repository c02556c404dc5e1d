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

//! # Marrow Core
//!
//! Foundational crate containing the renderer contracts, core types and
//! configuration shared by every other Marrow crate. Nothing in here talks to a
//! concrete graphics API: backends implement the traits in [`renderer::traits`].

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod renderer;

pub use config::{ConfigError, RendererConfig, ShadowConfig};
