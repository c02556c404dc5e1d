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

//! # Marrow Data
//!
//! The data layer: what a model *is* ([`essence::Essence`], shared and immutable),
//! what an instance *has* ([`node::Node`], [`animation::AnimationState`]) and the
//! bookkeeping that keeps frame-in-flight copies consistent ([`dirty::DirtyCounter`]).
//! No per-frame algorithm lives here; see `marrow-lanes` for those.

#![warn(missing_docs)]

pub mod animation;
pub mod dirty;
pub mod essence;
pub mod node;
