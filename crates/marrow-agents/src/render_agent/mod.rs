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

//! The **[A]gent** of the rendering subsystem.
//!
//! [`PipelineOrchestrator`] owns every variant, the pipeline-level uniform
//! buffers and binding sets, and drives the frame protocol: `update` (wait on the
//! frame slot, upload uniforms, update variants in parallel) followed by `render`
//! (six shadow faces, the depth pre-pass and the color pass, submitted as one
//! command buffer).

mod agent;
mod error;
mod registry;

pub use agent::*;
pub use error::PipelineError;
pub use marrow_lanes::render_lane::MaterialFallback;
pub use registry::VariantHandle;
