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

//! Global settings for the rendering pipeline.

use crate::renderer::api::MAX_FRAMES_IN_FLIGHT;
use serde::Deserialize;
use std::fmt;

/// Settings for the point-light cube shadow pass.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Near plane of the cube-face projections.
    pub near: f32,
    /// Far plane of the cube-face projections.
    pub far: f32,
    /// Depth value every shadow face is cleared to.
    pub depth_clear: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            near: 0.05,
            far: 50.0,
            depth_clear: 1.0,
        }
    }
}

/// A collection of global settings that shape the update/render protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frames the CPU may run ahead of the GPU. Every CPU-mutable
    /// GPU resource is replicated this many times.
    pub frames_in_flight: usize,
    /// Size of the worker pool used to update variants in parallel.
    pub worker_threads: usize,
    /// Shadow pass settings.
    pub shadow: ShadowConfig,
    /// Clear color of the color pass (linear RGBA).
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            shadow: ShadowConfig::default(),
            clear_color: [0.02, 0.02, 0.03, 1.0],
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from RON text. Missing fields take their default.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig =
            ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every setting is within the range the pipeline supports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::FramesInFlight(self.frames_in_flight));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::WorkerThreads);
        }
        if !(self.shadow.near > 0.0 && self.shadow.near < self.shadow.far) {
            return Err(ConfigError::ShadowPlanes {
                near: self.shadow.near,
                far: self.shadow.far,
            });
        }
        Ok(())
    }
}

/// An error raised while loading or validating a [`RendererConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The RON text could not be parsed.
    Parse(String),
    /// `frames_in_flight` is outside `1..=MAX_FRAMES_IN_FLIGHT`.
    FramesInFlight(usize),
    /// `worker_threads` is zero.
    WorkerThreads,
    /// The shadow planes do not satisfy `0 < near < far`.
    ShadowPlanes {
        /// Requested near plane.
        near: f32,
        /// Requested far plane.
        far: f32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Failed to parse renderer config: {msg}"),
            ConfigError::FramesInFlight(n) => write!(
                f,
                "frames_in_flight must be between 1 and {MAX_FRAMES_IN_FLIGHT}, got {n}"
            ),
            ConfigError::WorkerThreads => write!(f, "worker_threads must be at least 1"),
            ConfigError::ShadowPlanes { near, far } => {
                write!(f, "Invalid shadow planes: near={near}, far={far}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
