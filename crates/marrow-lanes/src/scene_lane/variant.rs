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

//! One placed, animatable instance of an essence.

use super::animation_blend::{advance_clock, blend_animation, BlendOutcome};
use super::skin_palette::SkinPalette;
use super::transform_propagation::{mark_all_dirty, propagate_transforms, PropagationParams};
use crate::render_lane::{
    ColorPush, DepthPush, PassKind, ShadowPush, VariantBindings, VariantLayouts,
};
use marrow_core::math::Mat4;
use marrow_core::renderer::{
    FrameIndex, GraphicsDevice, RenderError, RenderPass, ResourceError, ShaderStages,
};
use marrow_data::animation::{AnimationError, AnimationState, ClipSelector};
use marrow_data::essence::{Essence, Primitive};
use marrow_data::node::Node;
use std::sync::Arc;

/// Callback invoked before every primitive draw so the caller can bind
/// draw-specific resources (a per-primitive override set, for instance).
pub type BindCallback<'a> = dyn FnMut(&mut dyn RenderPass, &Primitive, &Node) + 'a;

/// What one [`Variant::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantUpdate {
    /// Outcome of the animation step.
    pub blend: BlendOutcome,
    /// Number of nodes whose global transform changed.
    pub nodes_changed: usize,
    /// Whether the skin palette of the frame slot was re-uploaded.
    pub skin_uploaded: bool,
}

/// A placed instance of an [`Essence`]: its own node hierarchy, animation state,
/// skin palette and binding sets.
///
/// A variant is mutated only by its own update task; the essence it references
/// is read-only.
#[derive(Debug)]
pub struct Variant {
    essence: Arc<Essence>,
    nodes: Vec<Node>,
    animation: AnimationState,
    palette: SkinPalette,
    bindings: VariantBindings,
    placement: Mat4,
    placement_changed: bool,
    visible: bool,
    generation: u64,
    updated_frame: Option<u64>,
    label: String,
}

impl Variant {
    /// Creates a variant resting in the essence's rest pose, with its skin palette
    /// buffers and binding sets for every frame slot.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure after releasing everything created so far.
    pub fn new(
        device: &dyn GraphicsDevice,
        essence: Arc<Essence>,
        layouts: &VariantLayouts,
        frames_in_flight: usize,
        label: impl Into<String>,
    ) -> Result<Self, ResourceError> {
        let label = label.into();
        let mut palette = SkinPalette::new(device, &essence, frames_in_flight, &label)?;
        let bindings = match VariantBindings::new(
            device,
            layouts,
            &palette,
            &essence,
            &label,
        ) {
            Ok(bindings) => bindings,
            Err(e) => {
                palette.destroy(device);
                return Err(e);
            }
        };

        let nodes = (0..essence.node_count())
            .map(|i| Node::new(essence.rest_pose(i)))
            .collect();

        Ok(Self {
            essence,
            nodes,
            animation: AnimationState::default(),
            palette,
            bindings,
            placement: Mat4::IDENTITY,
            placement_changed: true,
            visible: true,
            generation: 0,
            updated_frame: None,
            label,
        })
    }

    /// Sets the world placement and the visibility of the variant for the coming
    /// update.
    pub fn set_placement(&mut self, world: Mat4, visible: bool) {
        if world != self.placement {
            self.placement = world;
            self.placement_changed = true;
        }
        self.visible = visible;
    }

    /// Switches to another clip, cross-fading from the current pose over
    /// `transition` seconds.
    ///
    /// # Errors
    ///
    /// An unknown clip, an invalid transition or a non-finite start offset leaves
    /// the playback state and the pose untouched.
    pub fn set_active_animation(
        &mut self,
        selector: &ClipSelector,
        transition: f32,
        looped: bool,
        start_offset: f32,
    ) -> Result<(), AnimationError> {
        if !(transition >= 0.0) {
            return Err(AnimationError::InvalidTransition(transition));
        }
        if !start_offset.is_finite() {
            return Err(AnimationError::InvalidStartOffset(start_offset));
        }
        let index = self.essence.resolve_clip(selector)?;
        let Some(clip) = self.essence.clip(index) else {
            return Err(AnimationError::ClipIndexOutOfRange {
                index,
                count: self.essence.clips().len(),
            });
        };

        if transition > 0.0 && self.animation.active.is_some() {
            // The outgoing pose starts from what is on screen right now.
            let blend = self.animation.blend_fraction();
            for node in &mut self.nodes {
                node.previous = match blend {
                    Some(t) => node.previous.blend(&node.current, t),
                    None => node.current,
                };
            }
        }

        let was_fading = self.animation.is_fading();
        self.animation
            .transition_to(index, clip.start + start_offset, looped, transition);
        if was_fading && !self.animation.is_fading() {
            // Locals still hold the blended pose; nodes the new clip does not
            // animate would keep it.
            mark_all_dirty(&mut self.nodes);
        }
        let reached_end = advance_clock(&mut self.animation.active_time, 0.0, clip, looped);
        self.animation.finished = reached_end;

        log::debug!(
            "Variant '{}' plays clip '{}' (transition {:.2}s, looped: {})",
            self.label,
            clip.name,
            transition,
            looped
        );
        Ok(())
    }

    /// Whether the active clip is over. A variant without a clip reports `true`.
    pub fn is_animation_finished(&self) -> bool {
        self.animation.is_finished()
    }

    /// Runs one frame of the variant: animation, propagation, skin palette refresh
    /// and the upload into `frame`'s slot, in that order.
    pub fn update(
        &mut self,
        device: &dyn GraphicsDevice,
        dt: f32,
        frame: FrameIndex,
    ) -> Result<VariantUpdate, ResourceError> {
        let dt = if dt.is_finite() {
            dt
        } else {
            log::warn!("Variant '{}': ignoring non-finite frame time {}", self.label, dt);
            0.0
        };
        self.generation += 1;

        let blend = blend_animation(
            &self.essence,
            &mut self.animation,
            &mut self.nodes,
            dt,
            self.visible,
        );

        let params = PropagationParams {
            placement: &self.placement,
            placement_changed: self.placement_changed,
            blend: self.animation.blend_fraction(),
            generation: self.generation,
        };
        let nodes_changed = propagate_transforms(&self.essence, &mut self.nodes, params);
        self.placement_changed = false;

        self.palette
            .refresh(&self.essence, &self.nodes, self.generation);
        let skin_uploaded = self.palette.upload(device, frame.slot)?;

        self.updated_frame = Some(frame.serial);
        Ok(VariantUpdate {
            blend,
            nodes_changed,
            skin_uploaded,
        })
    }

    /// Records the draws of this variant into `pass`.
    ///
    /// Binds the variant's set 1 for `kind` and `frame`, then pushes the per-draw
    /// block and issues one indexed draw per primitive of every mesh node, calling
    /// `bind` right before each draw. Hidden variants record nothing. Returns the
    /// number of draws.
    ///
    /// # Errors
    ///
    /// Drawing a variant that was not updated for `frame` is an ordering violation;
    /// debug builds abort.
    pub fn draw(
        &self,
        pass: &mut dyn RenderPass,
        frame: FrameIndex,
        kind: PassKind,
        bind: &mut BindCallback<'_>,
    ) -> Result<u32, RenderError> {
        if self.updated_frame != Some(frame.serial) {
            let msg = format!(
                "variant '{}' drawn in frame {} but last updated in {:?}",
                self.label, frame.serial, self.updated_frame
            );
            debug_assert!(false, "{msg}");
            return Err(RenderError::OrderingViolation(msg));
        }
        if !self.visible {
            return Ok(0);
        }

        let essence = &*self.essence;
        let geometry = essence.geometry();
        pass.set_bind_group(1, self.bindings.get(frame.slot, kind), &[]);
        pass.set_vertex_buffer(0, geometry.vertex_buffer, 0);
        pass.set_index_buffer(geometry.index_buffer, 0, geometry.index_format);

        let mut draws = 0;
        for &index in essence.mesh_nodes() {
            let desc = &essence.nodes()[index];
            let Some(mesh) = desc.mesh else {
                continue;
            };
            let node = &self.nodes[index];
            let skin_offset = desc.skin.map(|s| essence.skin_offset(s));
            // Skinned vertices are already in model space after skinning.
            let model = if skin_offset.is_some() {
                self.placement
            } else {
                node.model
            };

            match kind {
                PassKind::Shadow { face } => pass.set_push_constants(
                    ShaderStages::VERTEX_FRAGMENT,
                    0,
                    bytemuck::bytes_of(&ShadowPush::new(&model, face, skin_offset)),
                ),
                PassKind::DepthPrePass => pass.set_push_constants(
                    ShaderStages::VERTEX,
                    0,
                    bytemuck::bytes_of(&DepthPush::new(&model, skin_offset)),
                ),
                PassKind::Color => {}
            }

            let node_inverse = if skin_offset.is_some() {
                node.inverse_global
            } else {
                Mat4::IDENTITY
            };
            let base = essence.primitive_base(mesh);
            for (p, primitive) in essence.meshes()[mesh].primitives.iter().enumerate() {
                if kind == PassKind::Color {
                    let push = ColorPush::new(&node.model, &node_inverse, skin_offset, base + p as u32);
                    pass.set_push_constants(
                        ShaderStages::VERTEX_FRAGMENT,
                        0,
                        bytemuck::bytes_of(&push),
                    );
                }
                bind(&mut *pass, primitive, node);
                pass.draw_indexed(
                    primitive.first_index..primitive.first_index + primitive.index_count,
                    primitive.vertex_offset,
                    0..1,
                );
                draws += 1;
            }
        }
        Ok(draws)
    }

    /// Releases the variant's GPU resources.
    pub fn destroy(mut self, device: &dyn GraphicsDevice) {
        self.bindings.destroy(device);
        self.palette.destroy(device);
        log::debug!("Variant '{}' destroyed", self.label);
    }

    /// The shared model data.
    pub fn essence(&self) -> &Arc<Essence> {
        &self.essence
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The runtime nodes, indexed like the essence's node table.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Global transform of `node`.
    pub fn global_transform(&self, node: usize) -> Mat4 {
        self.nodes[node].global
    }

    /// `placement * global` of mesh node `node`.
    pub fn model_transform(&self, node: usize) -> Mat4 {
        self.nodes[node].model
    }

    /// The CPU-side skin palette.
    pub fn skin_matrices(&self) -> &[Mat4] {
        self.palette.matrices()
    }

    /// The skin palette and its per-slot buffers.
    pub fn skin_palette(&self) -> &SkinPalette {
        &self.palette
    }

    /// The binding sets of this variant.
    pub fn bindings(&self) -> &VariantBindings {
        &self.bindings
    }

    /// The playback state.
    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    /// Index of the active clip.
    pub fn active_clip(&self) -> Option<usize> {
        self.animation.active
    }

    /// Play time of the active clip.
    pub fn active_time(&self) -> f32 {
        self.animation.active_time
    }

    /// Current world placement.
    pub fn placement(&self) -> Mat4 {
        self.placement
    }

    /// Whether the variant is drawn.
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
