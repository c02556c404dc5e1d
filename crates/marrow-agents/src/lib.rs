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

//! # Marrow Agents
//!
//! Agents sit on top of the lanes and decide *when* things run. The
//! [`update_agent`] fans per-variant updates out over a worker pool; the
//! [`render_agent`] owns the variants, the pipeline-level resources and the
//! frame loop that records the shadow, depth and color passes.

#![warn(missing_docs)]

pub mod render_agent;
pub mod update_agent;
