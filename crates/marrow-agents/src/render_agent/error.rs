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

use crate::update_agent::SchedulerError;
use marrow_core::config::ConfigError;
use marrow_core::renderer::{RenderError, ResourceError};
use marrow_data::animation::AnimationError;

/// An error returned by the [`PipelineOrchestrator`](super::PipelineOrchestrator).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The renderer configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A frame or variant operation failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// An animation request was rejected; the variant keeps its state.
    #[error(transparent)]
    Animation(#[from] AnimationError),
    /// The update scheduler failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl From<ResourceError> for PipelineError {
    fn from(error: ResourceError) -> Self {
        PipelineError::Render(RenderError::ResourceError(error))
    }
}
