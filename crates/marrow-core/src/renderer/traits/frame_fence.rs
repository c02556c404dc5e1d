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

use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// Frame-in-flight synchronisation between the CPU and the GPU.
///
/// A frame slot is owned by the CPU only once the GPU finished the last submission
/// that read it. Writing into a slot before `wait` returned corrupts frames still
/// in flight.
pub trait FrameFence: Send + Sync + Debug {
    /// Blocks until the GPU finished the last submission that used `slot`.
    ///
    /// Returns immediately if nothing is pending on that slot.
    fn wait(&self, slot: usize) -> Result<(), RenderError>;

    /// Marks `slot` as in use by the submission that was just made.
    fn signal(&self, slot: usize);
}
