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

//! Defines the PipelineOrchestrator, the central object of the frame loop.

use super::error::PipelineError;
use super::registry::{VariantHandle, VariantRegistry};
use crate::update_agent::{SchedulerReport, UpdateScheduler};
use marrow_core::config::RendererConfig;
use marrow_core::math::{Mat4, Vec3};
use marrow_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutId, CommandEncoder, FrameFence, FrameIndex, GraphicsDevice, LoadOp,
    Operations, RenderError, RenderPass, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipelineId, ResourceError,
    SamplerId, StoreOp, TextureViewId,
};
use marrow_data::animation::ClipSelector;
use marrow_data::essence::{Essence, Primitive};
use marrow_data::node::Node;
use marrow_lanes::render_lane::{
    global_layout_entries, shadow_faces, CameraState, FrameBuffered, FrameUniform, LightState,
    MaterialFallback, PassKind, ShadowFaces, VariantLayouts, SHADOW_CUBE_FACES,
    SHADOW_FACE_STRIDE,
};
use marrow_lanes::scene_lane::Variant;
use std::num::NonZeroU64;
use std::sync::Arc;

/// Callback used by [`PipelineOrchestrator::render_with`] to bind draw-specific
/// resources right before each primitive is drawn.
pub type PassBindCallback<'a> =
    dyn FnMut(PassKind, &mut dyn RenderPass, &Primitive, &Node) + 'a;

/// The pipeline state objects of the three passes, created by the backend
/// bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPipelines {
    /// Depth-only pipeline rendering into a cube face.
    pub shadow: RenderPipelineId,
    /// Depth-only pipeline of the camera pre-pass.
    pub depth: RenderPipelineId,
    /// Shaded pipeline of the color pass.
    pub color: RenderPipelineId,
}

impl PassPipelines {
    fn get(&self, kind: PassKind) -> RenderPipelineId {
        match kind {
            PassKind::Shadow { .. } => self.shadow,
            PassKind::DepthPrePass => self.depth,
            PassKind::Color => self.color,
        }
    }
}

/// The point-light shadow cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapTargets {
    /// One depth attachment view per cube face, +X, -X, +Y, -Y, +Z, -Z.
    pub face_views: [TextureViewId; SHADOW_CUBE_FACES as usize],
    /// The whole cube, sampled by the color pass.
    pub cube_view: TextureViewId,
    /// Comparison sampler used with `cube_view`.
    pub sampler: SamplerId,
}

/// The attachments of the camera passes for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTargets {
    /// Color attachment of the color pass.
    pub color: TextureViewId,
    /// Depth attachment written by the pre-pass and tested by the color pass.
    pub depth: TextureViewId,
}

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Serial of the frame.
    pub frame: u64,
    /// Passes recorded.
    pub passes: u32,
    /// Draws over the six shadow faces.
    pub shadow_draws: u32,
    /// Draws of the depth pre-pass.
    pub depth_draws: u32,
    /// Draws of the color pass.
    pub color_draws: u32,
    /// Variants updated.
    pub variants_updated: usize,
    /// Skin palettes uploaded.
    pub skin_uploads: usize,
    /// Pipeline-level uniform buffers uploaded.
    pub uniform_uploads: usize,
}

impl FrameStats {
    fn record(&mut self, kind: PassKind, draws: u32) {
        self.passes += 1;
        match kind {
            PassKind::Shadow { .. } => self.shadow_draws += draws,
            PassKind::DepthPrePass => self.depth_draws += draws,
            PassKind::Color => self.color_draws += draws,
        }
    }

    /// Total draw calls of the frame.
    pub fn draw_calls(&self) -> u32 {
        self.shadow_draws + self.depth_draws + self.color_draws
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Updated(FrameIndex),
}

/// Set 0 of every pass, per frame slot.
#[derive(Debug, Default)]
struct GlobalBindings {
    layouts: Vec<BindGroupLayoutId>,
    groups: Vec<BindGroupId>,
    sets: Vec<[BindGroupId; 3]>,
}

impl GlobalBindings {
    fn create(
        device: &dyn GraphicsDevice,
        frame_uniform: &FrameBuffered<FrameUniform>,
        shadow_uniform: &FrameBuffered<ShadowFaces>,
        shadow_map: &ShadowMapTargets,
        frames_in_flight: usize,
    ) -> Result<Self, ResourceError> {
        let mut bindings = Self::default();
        let result = bindings.populate(
            device,
            frame_uniform,
            shadow_uniform,
            shadow_map,
            frames_in_flight,
        );
        match result {
            Ok(()) => Ok(bindings),
            Err(e) => {
                log::error!("Failed to create the pipeline binding sets: {}", e);
                bindings.destroy(device);
                Err(e)
            }
        }
    }

    fn populate(
        &mut self,
        device: &dyn GraphicsDevice,
        frame_uniform: &FrameBuffered<FrameUniform>,
        shadow_uniform: &FrameBuffered<ShadowFaces>,
        shadow_map: &ShadowMapTargets,
        frames_in_flight: usize,
    ) -> Result<(), ResourceError> {
        let kinds = [PassKind::FIRST, PassKind::DepthPrePass, PassKind::Color];
        for kind in kinds {
            let entries = global_layout_entries(kind);
            let label = format!("Pipeline set ({})", kind.label());
            self.layouts
                .push(device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some(&label),
                    entries: &entries,
                })?);
        }

        let face_size = NonZeroU64::new(SHADOW_FACE_STRIDE);
        for slot in 0..frames_in_flight {
            let mut ids = [BindGroupId(0); 3];
            for kind in kinds {
                let entries = match kind {
                    PassKind::Shadow { .. } => vec![BindGroupEntry::buffer(
                        0,
                        shadow_uniform.buffer(slot),
                        0,
                        face_size,
                    )],
                    PassKind::DepthPrePass => {
                        vec![BindGroupEntry::buffer(0, frame_uniform.buffer(slot), 0, None)]
                    }
                    PassKind::Color => vec![
                        BindGroupEntry::buffer(0, frame_uniform.buffer(slot), 0, None),
                        BindGroupEntry::texture_view(1, shadow_map.cube_view),
                        BindGroupEntry::sampler(2, shadow_map.sampler),
                    ],
                };
                let label = format!("Pipeline set ({}) [slot {slot}]", kind.label());
                let id = device.create_bind_group(&BindGroupDescriptor {
                    label: Some(&label),
                    layout: self.layouts[kind.binding_index()],
                    entries: &entries,
                })?;
                self.groups.push(id);
                ids[kind.binding_index()] = id;
            }
            self.sets.push(ids);
        }
        Ok(())
    }

    fn get(&self, slot: usize, kind: PassKind) -> BindGroupId {
        self.sets[slot][kind.binding_index()]
    }

    fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.sets.clear();
        for group in self.groups.drain(..) {
            if let Err(e) = device.destroy_bind_group(group) {
                log::warn!("Failed to destroy pipeline set {:?}: {:?}", group, e);
            }
        }
        for layout in self.layouts.drain(..) {
            if let Err(e) = device.destroy_bind_group_layout(layout) {
                log::warn!("Failed to destroy pipeline layout {:?}: {:?}", layout, e);
            }
        }
    }
}

/// Owns the variants and drives the update/render protocol of every frame.
///
/// One orchestrator is one independent renderer: it holds no global state, so
/// several can live side by side (tests do).
pub struct PipelineOrchestrator {
    device: Arc<dyn GraphicsDevice>,
    fence: Arc<dyn FrameFence>,
    config: RendererConfig,
    pipelines: PassPipelines,
    shadow_map: ShadowMapTargets,
    variant_layouts: VariantLayouts,
    globals: GlobalBindings,
    frame_uniform: FrameBuffered<FrameUniform>,
    shadow_uniform: FrameBuffered<ShadowFaces>,
    camera: CameraState,
    light: LightState,
    registry: VariantRegistry,
    // Destroyed variants waiting for the frames that used them to retire.
    retired: Vec<(u64, Box<Variant>)>,
    scheduler: UpdateScheduler,
    next_frame: FrameIndex,
    phase: FramePhase,
    pending_stats: FrameStats,
    created_variants: u64,
}

impl PipelineOrchestrator {
    /// Creates the pipeline-level resources and starts the update workers.
    ///
    /// `material_fallback` is bound in the color pass wherever an essence brings
    /// fewer material textures than there are slots, or no sampler.
    ///
    /// # Errors
    ///
    /// An invalid `config` or a failed allocation; nothing is left allocated.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        fence: Arc<dyn FrameFence>,
        config: RendererConfig,
        pipelines: PassPipelines,
        shadow_map: ShadowMapTargets,
        material_fallback: MaterialFallback,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let frames = config.frames_in_flight;
        let camera = CameraState::default();
        let light = LightState::default();

        let mut frame_uniform = FrameBuffered::new(
            device.as_ref(),
            FrameUniform::new(&camera, &light, &config.shadow),
            frames,
            "Frame uniforms",
        )?;
        let mut shadow_uniform = match FrameBuffered::new(
            device.as_ref(),
            shadow_faces(&light, &config.shadow),
            frames,
            "Shadow face uniforms",
        ) {
            Ok(uniform) => uniform,
            Err(e) => {
                frame_uniform.destroy(device.as_ref());
                return Err(e.into());
            }
        };

        let release_uniforms = |frame: &mut FrameBuffered<FrameUniform>,
                                shadow: &mut FrameBuffered<ShadowFaces>| {
            frame.destroy(device.as_ref());
            shadow.destroy(device.as_ref());
        };

        let variant_layouts = match VariantLayouts::create(device.as_ref(), material_fallback) {
            Ok(layouts) => layouts,
            Err(e) => {
                release_uniforms(&mut frame_uniform, &mut shadow_uniform);
                return Err(e.into());
            }
        };
        let globals = match GlobalBindings::create(
            device.as_ref(),
            &frame_uniform,
            &shadow_uniform,
            &shadow_map,
            frames,
        ) {
            Ok(globals) => globals,
            Err(e) => {
                variant_layouts.destroy(device.as_ref());
                release_uniforms(&mut frame_uniform, &mut shadow_uniform);
                return Err(e.into());
            }
        };
        let scheduler = match UpdateScheduler::new(Arc::clone(&device), config.worker_threads) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                let mut globals = globals;
                globals.destroy(device.as_ref());
                variant_layouts.destroy(device.as_ref());
                release_uniforms(&mut frame_uniform, &mut shadow_uniform);
                return Err(e.into());
            }
        };

        log::info!(
            "PipelineOrchestrator ready: {} frame(s) in flight, {} update worker(s)",
            frames,
            scheduler.worker_count()
        );

        Ok(Self {
            device,
            fence,
            config,
            pipelines,
            shadow_map,
            variant_layouts,
            globals,
            frame_uniform,
            shadow_uniform,
            camera,
            light,
            registry: VariantRegistry::default(),
            retired: Vec::new(),
            scheduler,
            next_frame: FrameIndex::new(0, frames),
            phase: FramePhase::Idle,
            pending_stats: FrameStats::default(),
            created_variants: 0,
        })
    }

    // --- Variants ---

    /// Creates a variant of `essence` in its rest pose.
    ///
    /// The variant gets its skin palette buffers and one binding set per frame
    /// slot per pass. A variant created between `update` and `render` is brought
    /// up to date for the current frame so it can be drawn right away.
    ///
    /// # Errors
    ///
    /// Allocation failures; every resource created for the variant is released.
    pub fn create_variant(&mut self, essence: Arc<Essence>) -> Result<VariantHandle, PipelineError> {
        let label = format!("{} #{}", essence.name(), self.created_variants);
        let mut variant = Variant::new(
            self.device.as_ref(),
            essence,
            &self.variant_layouts,
            self.config.frames_in_flight,
            label,
        )?;
        if let FramePhase::Updated(frame) = self.phase {
            if let Err(e) = variant.update(self.device.as_ref(), 0.0, frame) {
                variant.destroy(self.device.as_ref());
                return Err(e.into());
            }
        }
        self.created_variants += 1;
        let handle = self.registry.insert(variant);
        log::debug!("Variant {:?} created", handle);
        Ok(handle)
    }

    /// Removes a variant. Its GPU resources are released once the frames that
    /// may still read them have completed.
    pub fn destroy_variant(&mut self, handle: VariantHandle) -> Result<(), PipelineError> {
        let variant = self
            .registry
            .remove(handle)
            .ok_or(RenderError::InvalidVariant)?;
        match self.next_frame.serial.checked_sub(1) {
            // Nothing was ever submitted: no frame can be reading the resources.
            None => variant.destroy(self.device.as_ref()),
            Some(last_used) => self.retired.push((last_used, variant)),
        }
        Ok(())
    }

    /// Sets the world placement and visibility of a variant for the next update.
    pub fn set_placement(
        &mut self,
        handle: VariantHandle,
        world: Mat4,
        visible: bool,
    ) -> Result<(), PipelineError> {
        self.variant_mut(handle)?.set_placement(world, visible);
        Ok(())
    }

    /// Plays another clip on a variant, cross-fading over `transition` seconds.
    ///
    /// # Errors
    ///
    /// A stale handle, an unknown clip or an invalid transition; the variant keeps
    /// playing what it played before.
    pub fn set_active_animation(
        &mut self,
        handle: VariantHandle,
        clip: impl Into<ClipSelector>,
        transition: f32,
        looped: bool,
        start_offset: f32,
    ) -> Result<(), PipelineError> {
        let selector = clip.into();
        let variant = self.variant_mut(handle)?;
        if let Err(e) = variant.set_active_animation(&selector, transition, looped, start_offset) {
            log::warn!("Variant '{}': {}", variant.label(), e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Whether the active clip of a variant is over (`true` without a clip).
    pub fn is_animation_finished(&self, handle: VariantHandle) -> Result<bool, PipelineError> {
        Ok(self.variant(handle)?.is_animation_finished())
    }

    /// Read access to a variant.
    pub fn variant(&self, handle: VariantHandle) -> Result<&Variant, PipelineError> {
        self.registry
            .get(handle)
            .ok_or_else(|| RenderError::InvalidVariant.into())
    }

    fn variant_mut(&mut self, handle: VariantHandle) -> Result<&mut Variant, PipelineError> {
        self.registry
            .get_mut(handle)
            .ok_or_else(|| RenderError::InvalidVariant.into())
    }

    /// Global transform of `node` in a variant.
    pub fn global_transform(&self, handle: VariantHandle, node: usize) -> Result<Mat4, PipelineError> {
        Ok(self.variant(handle)?.global_transform(node))
    }

    /// Model transform (`placement * global`) of mesh node `node` in a variant.
    pub fn model_transform(&self, handle: VariantHandle, node: usize) -> Result<Mat4, PipelineError> {
        Ok(self.variant(handle)?.model_transform(node))
    }

    /// CPU-side skin palette of a variant.
    pub fn skin_matrices(&self, handle: VariantHandle) -> Result<&[Mat4], PipelineError> {
        Ok(self.variant(handle)?.skin_matrices())
    }

    /// Active clip index and its play time.
    pub fn active_animation(&self, handle: VariantHandle) -> Result<Option<(usize, f32)>, PipelineError> {
        let variant = self.variant(handle)?;
        Ok(variant.active_clip().map(|clip| (clip, variant.active_time())))
    }

    /// Number of live variants.
    pub fn variant_count(&self) -> usize {
        self.registry.len()
    }

    // --- Camera and light ---

    /// Sets the camera view matrix. Returns `false` when the value is unchanged.
    pub fn update_camera_view(&mut self, view: Mat4) -> bool {
        if self.camera.view == view {
            return false;
        }
        self.camera.view = view;
        self.refresh_frame_uniform()
    }

    /// Sets the camera projection matrix. Returns `false` when the value is unchanged.
    pub fn update_camera_projection(&mut self, projection: Mat4) -> bool {
        if self.camera.projection == projection {
            return false;
        }
        self.camera.projection = projection;
        self.refresh_frame_uniform()
    }

    /// Sets the camera position. Returns `false` when the value is unchanged.
    pub fn update_camera_position(&mut self, position: Vec3) -> bool {
        if self.camera.position == position {
            return false;
        }
        self.camera.position = position;
        self.refresh_frame_uniform()
    }

    /// Moves the point light; this also re-aims the six shadow faces. Returns
    /// `false` when the value is unchanged.
    pub fn update_light_position(&mut self, position: Vec3) -> bool {
        if self.light.position == position {
            return false;
        }
        self.light.position = position;
        self.shadow_uniform
            .set(shadow_faces(&self.light, &self.config.shadow));
        self.refresh_frame_uniform()
    }

    /// Sets the point light color and intensity. Returns `false` when both are
    /// unchanged.
    pub fn update_light_color(&mut self, color: Vec3, intensity: f32) -> bool {
        if self.light.color == color && self.light.intensity == intensity {
            return false;
        }
        self.light.color = color;
        self.light.intensity = intensity;
        self.refresh_frame_uniform()
    }

    fn refresh_frame_uniform(&mut self) -> bool {
        self.frame_uniform
            .set(FrameUniform::new(&self.camera, &self.light, &self.config.shadow))
    }

    /// Current camera state.
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Current light state.
    pub fn light(&self) -> &LightState {
        &self.light
    }

    /// Uploads still owed to frame slots by the camera/light uniforms.
    pub fn pending_uniform_uploads(&self) -> usize {
        self.frame_uniform.pending_uploads() + self.shadow_uniform.pending_uploads()
    }

    /// The configuration the orchestrator runs with.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The frame the next `update` begins.
    pub fn next_frame(&self) -> FrameIndex {
        self.next_frame
    }

    // --- Frame loop ---

    /// Begins the next frame: waits until its slot is free on the GPU, uploads the
    /// dirty uniforms into it and updates every variant in parallel.
    ///
    /// Calling `update` twice without `render` abandons the first frame.
    ///
    /// # Errors
    ///
    /// A fence, upload or scheduler failure. The frame is abandoned and `render`
    /// will refuse to run until the next successful `update`.
    pub fn update(&mut self, dt: f32) -> Result<FrameIndex, PipelineError> {
        if let FramePhase::Updated(stale) = self.phase {
            log::warn!("Frame {} was updated but never rendered; abandoning it", stale.serial);
        }
        self.phase = FramePhase::Idle;

        let frame = self.next_frame;
        self.fence.wait(frame.slot)?;
        self.next_frame = frame.next(self.config.frames_in_flight);
        self.release_retired(frame.serial);

        let mut stats = FrameStats {
            frame: frame.serial,
            ..Default::default()
        };
        let device = self.device.as_ref();
        stats.uniform_uploads += self.frame_uniform.upload(device, frame.slot)? as usize;
        stats.uniform_uploads += self.shadow_uniform.upload(device, frame.slot)? as usize;

        let run = self.scheduler.run(self.registry.slots_mut(), dt, frame);
        let report: SchedulerReport = match run {
            Ok(report) => report,
            Err(e) => {
                let reclaimed = self.registry.reclaim_vacant();
                if reclaimed > 0 {
                    log::error!(
                        "{} variant(s) lost during frame {}; their handles are now invalid",
                        reclaimed,
                        frame.serial
                    );
                }
                return Err(e.into());
            }
        };
        stats.variants_updated = report.updated;
        stats.skin_uploads = report.skin_uploads;

        log::debug!(
            "Frame {} updated: {} variant(s), {} node(s) changed, {} skin upload(s)",
            frame.serial,
            report.updated,
            report.nodes_changed,
            report.skin_uploads
        );
        self.pending_stats = stats;
        self.phase = FramePhase::Updated(frame);
        Ok(frame)
    }

    /// Records and submits the passes of the frame begun by `update`, without any
    /// per-draw binding.
    pub fn render(&mut self, targets: &FrameTargets) -> Result<FrameStats, PipelineError> {
        self.render_with(targets, &mut |_, _, _, _| {})
    }

    /// Records the six shadow faces, the depth pre-pass and the color pass into
    /// one command buffer, submits it and signals the frame slot's fence.
    ///
    /// `bind` runs before every primitive draw of every pass.
    ///
    /// # Errors
    ///
    /// Rendering without a preceding `update` for this frame is an ordering
    /// violation and aborts debug builds. Any failure while recording drops the
    /// command buffer unsubmitted.
    pub fn render_with(
        &mut self,
        targets: &FrameTargets,
        bind: &mut PassBindCallback<'_>,
    ) -> Result<FrameStats, PipelineError> {
        let frame = match self.phase {
            FramePhase::Updated(frame) => frame,
            FramePhase::Idle => {
                let msg = format!(
                    "render called for frame {} without a preceding update",
                    self.next_frame.serial
                );
                debug_assert!(false, "{msg}");
                return Err(RenderError::OrderingViolation(msg).into());
            }
        };
        self.phase = FramePhase::Idle;
        let mut stats = std::mem::take(&mut self.pending_stats);

        let label = format!("Frame {}", frame.serial);
        let mut encoder = self.device.create_command_encoder(Some(&label));
        for kind in PassKind::FRAME_SEQUENCE {
            match self.record_pass(encoder.as_mut(), kind, frame, targets, bind) {
                Ok(draws) => stats.record(kind, draws),
                Err(e) => {
                    log::error!(
                        "Frame {} abandoned while recording '{}': {}",
                        frame.serial,
                        kind.label(),
                        e
                    );
                    return Err(e.into());
                }
            }
        }

        let command_buffer = encoder.finish();
        self.device.submit_command_buffer(command_buffer);
        self.fence.signal(frame.slot);

        log::debug!(
            "Frame {} submitted: {} pass(es), {} draw call(s)",
            frame.serial,
            stats.passes,
            stats.draw_calls()
        );
        Ok(stats)
    }

    fn record_pass(
        &self,
        encoder: &mut dyn CommandEncoder,
        kind: PassKind,
        frame: FrameIndex,
        targets: &FrameTargets,
        bind: &mut PassBindCallback<'_>,
    ) -> Result<u32, RenderError> {
        let clear_depth = Some(Operations {
            load: LoadOp::Clear(self.config.shadow.depth_clear),
            store: StoreOp::Store,
        });
        let color_attachments = [RenderPassColorAttachment {
            view: targets.color,
            resolve_target: None,
            ops: Operations {
                load: LoadOp::Clear(self.config.clear_color),
                store: StoreOp::Store,
            },
        }];
        let colors: &[RenderPassColorAttachment] = match kind {
            PassKind::Color => &color_attachments,
            _ => &[],
        };
        let depth = match kind {
            PassKind::Shadow { face } => RenderPassDepthStencilAttachment {
                view: self.shadow_map.face_views[face as usize],
                depth_ops: clear_depth,
            },
            PassKind::DepthPrePass => RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: clear_depth,
            },
            // The color pass tests against the pre-pass depth.
            PassKind::Color => RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: Some(Operations {
                    load: LoadOp::Load,
                    store: StoreOp::Store,
                }),
            },
        };

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(kind.label()),
            color_attachments: colors,
            depth_stencil_attachment: Some(depth),
        });
        pass.set_pipeline(self.pipelines.get(kind));
        let global = self.globals.get(frame.slot, kind);
        match kind {
            PassKind::Shadow { face } => {
                let offset = face * SHADOW_FACE_STRIDE as u32;
                pass.set_bind_group(0, global, &[offset]);
            }
            _ => pass.set_bind_group(0, global, &[]),
        }

        let mut forward = |p: &mut dyn RenderPass, primitive: &Primitive, node: &Node| {
            bind(kind, p, primitive, node)
        };
        let mut draws = 0;
        for variant in self.registry.iter() {
            draws += variant.draw(pass.as_mut(), frame, kind, &mut forward)?;
        }
        Ok(draws)
    }

    fn release_retired(&mut self, current_serial: u64) {
        let frames = self.config.frames_in_flight as u64;
        let device = self.device.as_ref();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|(last_used, _)| current_serial >= last_used + frames);
        self.retired = waiting;
        for (_, variant) in ready {
            variant.destroy(device);
        }
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        for slot in 0..self.config.frames_in_flight {
            if let Err(e) = self.fence.wait(slot) {
                log::warn!("Fence wait on slot {} failed during shutdown: {}", slot, e);
            }
        }
        let device = self.device.as_ref();
        for variant in self.registry.drain() {
            variant.destroy(device);
        }
        for (_, variant) in self.retired.drain(..) {
            variant.destroy(device);
        }
        self.globals.destroy(device);
        self.variant_layouts.destroy(device);
        self.frame_uniform.destroy(device);
        self.shadow_uniform.destroy(device);
        log::info!("PipelineOrchestrator shut down");
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .field("variants", &self.registry.len())
            .field("next_frame", &self.next_frame)
            .field("phase", &self.phase)
            .finish()
    }
}
