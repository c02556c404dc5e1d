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

//! Scene lane: per-variant animation, hierarchy and skinning.
//!
//! Within one update the stages run strictly in this order:
//! animation sampling, transform propagation, skin palette refresh, upload.

mod animation_blend;
mod skin_palette;
mod transform_propagation;
mod variant;

pub use animation_blend::*;
pub use skin_palette::*;
pub use transform_propagation::*;
pub use variant::*;
