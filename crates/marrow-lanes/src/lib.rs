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

//! # Marrow Lanes
//!
//! The hot paths run for every variant every frame.
//!
//! - [`scene_lane`]: animation blending, transform propagation, skin palettes and
//!   the [`scene_lane::Variant`] that strings them together.
//! - [`render_lane`]: the pass vocabulary, per-draw parameter blocks, per-frame
//!   uniform sets and the binding sets allocated for each variant.

#![warn(missing_docs)]

pub mod render_lane;
pub mod scene_lane;
