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

mod common;

use approx::assert_relative_eq;
use common::{kick_clip, lift_clip, slide_clip, Rig, BODY, FALLBACK, HIP, KNEE};
use marrow_core::math::{mat4_approx_eq, Mat4, Vec3, EPSILON};
use marrow_core::renderer::{
    BindGroupEntry, BindingResource, FrameIndex, GraphicsDevice, RenderError, RenderPass,
    SamplerId, TextureViewId,
};
use marrow_data::animation::{AnimationError, ClipSelector};
use marrow_data::essence::{Material, Primitive, MAX_MATERIAL_TEXTURES};
use marrow_data::node::Node;
use marrow_infra::PassCommand;
use marrow_lanes::render_lane::{ColorPush, PassKind, MATERIAL_SAMPLER_BINDING};

fn frame(serial: u64, frames_in_flight: usize) -> FrameIndex {
    FrameIndex::new(serial, frames_in_flight)
}

fn translation_of(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

// ─── End-to-end ───────────────────────────────────────────────────────────

#[test]
fn half_second_into_linear_clip_translates_by_half() {
    // --- 1. ARRANGE ---
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, false, 0.0)
        .unwrap();

    // --- 2. ACT ---
    variant.update(&rig.device, 0.5, frame(0, 2)).unwrap();

    // --- 3. ASSERT ---
    let expected = Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0));
    assert!(mat4_approx_eq(&variant.global_transform(HIP), &expected, EPSILON));
    // Both joints move rigidly with the hip, so both skin matrices equal the offset.
    assert!(mat4_approx_eq(&variant.skin_matrices()[0], &expected, EPSILON));
    assert!(mat4_approx_eq(&variant.skin_matrices()[1], &expected, EPSILON));
    let knee = translation_of(&variant.global_transform(KNEE));
    assert_relative_eq!(knee, Vec3::new(0.5, 1.0, 0.0), epsilon = EPSILON);
}

#[test]
fn uploaded_palette_matches_staging_matrices() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&ClipSelector::Index(0), 0.0, true, 0.25)
        .unwrap();

    variant.update(&rig.device, 0.0, frame(0, 2)).unwrap();

    let bytes = rig
        .device
        .buffer_contents(variant.skin_palette().buffer(0))
        .unwrap();
    let uploaded: Vec<Mat4> = bytemuck::pod_collect_to_vec(&bytes);
    assert_eq!(uploaded, variant.skin_matrices());
    assert_relative_eq!(
        translation_of(&uploaded[0]),
        Vec3::new(0.25, 0.0, 0.0),
        epsilon = EPSILON
    );
}

// ─── Rest pose ────────────────────────────────────────────────────────────

#[test]
fn variant_without_clips_uploads_rest_pose_once_per_slot() {
    // --- 1. ARRANGE ---
    let rig = Rig::new(Vec::new());
    let mut variant = rig.variant(3);
    rig.device.clear_ops();

    // --- 2. ACT ---
    let uploads: Vec<bool> = (0..6)
        .map(|serial| {
            variant
                .update(&rig.device, 1.0 / 60.0, frame(serial, 3))
                .unwrap()
                .skin_uploaded
        })
        .collect();

    // --- 3. ASSERT ---
    assert_eq!(uploads, vec![true, true, true, false, false, false]);
    for &buffer in variant.skin_palette().buffers() {
        assert_eq!(rig.device.write_count(buffer), 1);
    }
    assert!(variant.is_animation_finished());
    let knee = translation_of(&variant.global_transform(KNEE));
    assert_relative_eq!(knee, Vec3::new(0.0, 1.0, 0.0));
    assert!(mat4_approx_eq(&variant.skin_matrices()[1], &Mat4::IDENTITY, EPSILON));
}

// ─── Dirty counters and non-looping clips ────────────────────────────────

#[test]
fn finished_clip_uploads_each_slot_once_then_goes_quiet() {
    let frames = 3;
    let rig = Rig::animated();
    let mut variant = rig.variant(frames);
    for serial in 0..frames as u64 {
        variant.update(&rig.device, 0.0, frame(serial, frames)).unwrap();
    }
    // Start at the very end of a non-looping clip: the next step clamps and finishes.
    variant
        .set_active_animation(&"slide".into(), 0.0, false, 1.0)
        .unwrap();
    rig.device.clear_ops();

    let mut uploads = 0;
    let mut finished_at = None;
    for serial in frames as u64..frames as u64 + 10 {
        let outcome = variant.update(&rig.device, 0.1, frame(serial, frames)).unwrap();
        uploads += outcome.skin_uploaded as usize;
        if outcome.blend.finished {
            finished_at = Some(serial);
        }
    }

    assert_eq!(uploads, frames, "every slot sees the change exactly once");
    assert_eq!(rig.device.total_write_count(), frames);
    assert_eq!(finished_at, Some(frames as u64));
    assert!(variant.is_animation_finished());
    assert_relative_eq!(variant.active_time(), 1.0);
    let hip = translation_of(&variant.global_transform(HIP));
    assert_relative_eq!(hip, Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
}

#[test]
fn finished_clip_stops_touching_nodes() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 2.0, frame(0, 2)).unwrap();
    assert!(variant.is_animation_finished());

    let outcome = variant.update(&rig.device, 0.5, frame(1, 2)).unwrap();

    assert!(!outcome.blend.sampled);
    assert_eq!(outcome.nodes_changed, 0);
}

// ─── Cross-fade ───────────────────────────────────────────────────────────

#[test]
fn cross_fade_starts_on_outgoing_pose_and_ends_on_active_pose() {
    // --- 1. ARRANGE ---
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.5, frame(0, 2)).unwrap();

    // --- 2. ACT ---
    variant
        .set_active_animation(&"lift".into(), 1.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.0, frame(1, 2)).unwrap();
    let at_start = variant.global_transform(HIP);
    let halfway = variant.update(&rig.device, 0.5, frame(2, 2)).unwrap();
    let at_half = variant.global_transform(HIP);
    let done = variant.update(&rig.device, 0.5, frame(3, 2)).unwrap();
    let at_end = variant.global_transform(HIP);

    // --- 3. ASSERT ---
    // Full weight on the outgoing clip: the slide pose at 0.5s, bit for bit.
    assert_eq!(at_start, Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)));
    assert!(!halfway.blend.fade_completed);
    // Half weight: outgoing clamped at (1,0,0), active at (0,0.5,0).
    assert_relative_eq!(
        translation_of(&at_half),
        Vec3::new(0.5, 0.25, 0.0),
        epsilon = EPSILON
    );
    assert!(done.blend.fade_completed);
    // No fade left: exactly the active clip's pose.
    assert_eq!(at_end, Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)));
    assert!(variant.animation().outgoing.is_none());
}

#[test]
fn instant_switch_during_a_fade_drops_the_blended_pose() {
    // --- 1. ARRANGE ---
    let rig = Rig::new(vec![slide_clip(), lift_clip(), kick_clip()]);
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.2, frame(0, 2)).unwrap();
    variant
        .set_active_animation(&"lift".into(), 1.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.3, frame(1, 2)).unwrap();

    // --- 2. ACT ---
    variant
        .set_active_animation(&"kick".into(), 0.0, false, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.1, frame(2, 2)).unwrap();

    // --- 3. ASSERT ---
    // The kick leaves the hip where the lift put it, not at the 30% blend.
    assert_relative_eq!(
        translation_of(&variant.global_transform(HIP)),
        Vec3::new(0.0, 0.3, 0.0),
        epsilon = EPSILON
    );
    assert_relative_eq!(
        translation_of(&variant.global_transform(KNEE)),
        Vec3::new(0.0, 1.3, 0.1),
        epsilon = EPSILON
    );
    assert!(!variant.animation().is_fading());
}

#[test]
fn hidden_variant_advances_the_fade_and_resamples_when_shown() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, true, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.25, frame(0, 2)).unwrap();
    variant
        .set_active_animation(&"lift".into(), 0.5, true, 0.0)
        .unwrap();

    variant.set_placement(Mat4::IDENTITY, false);
    let hidden = variant.update(&rig.device, 1.0, frame(1, 2)).unwrap();
    assert!(!hidden.blend.sampled);
    assert!(hidden.blend.fade_completed);

    variant.set_placement(Mat4::IDENTITY, true);
    let shown = variant.update(&rig.device, 0.0, frame(2, 2)).unwrap();
    assert!(shown.blend.sampled);
    let hip = translation_of(&variant.global_transform(HIP));
    assert_relative_eq!(hip, Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
}

// ─── Configuration errors ─────────────────────────────────────────────────

#[test]
fn unknown_clip_keeps_the_current_animation() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, true, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.3, frame(0, 2)).unwrap();
    let before = variant.animation().clone();

    let by_name = variant.set_active_animation(&"dance".into(), 0.2, true, 0.0);
    let by_index = variant.set_active_animation(&ClipSelector::Index(9), 0.2, true, 0.0);
    let bad_fade = variant.set_active_animation(&"lift".into(), f32::NAN, true, 0.0);
    let bad_offset = variant.set_active_animation(&"lift".into(), 0.2, true, f32::INFINITY);

    assert_eq!(by_name, Err(AnimationError::UnknownClip("dance".into())));
    assert_eq!(
        by_index,
        Err(AnimationError::ClipIndexOutOfRange { index: 9, count: 2 })
    );
    assert!(matches!(bad_fade, Err(AnimationError::InvalidTransition(_))));
    assert!(matches!(
        bad_offset,
        Err(AnimationError::InvalidStartOffset(_))
    ));
    assert_eq!(variant.animation(), &before);
}

#[test]
fn non_finite_frame_time_holds_the_clock() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant
        .set_active_animation(&"slide".into(), 0.0, true, 0.0)
        .unwrap();
    variant.update(&rig.device, 0.25, frame(0, 2)).unwrap();

    variant.update(&rig.device, f32::NAN, frame(1, 2)).unwrap();
    assert_eq!(variant.active_time(), 0.25);
    variant.update(&rig.device, 0.25, frame(2, 2)).unwrap();

    assert_relative_eq!(variant.active_time(), 0.5, epsilon = EPSILON);
    assert_relative_eq!(
        translation_of(&variant.global_transform(HIP)),
        Vec3::new(0.5, 0.0, 0.0),
        epsilon = EPSILON
    );
}

// ─── Placement ────────────────────────────────────────────────────────────

#[test]
fn placement_change_moves_models_without_touching_globals() {
    let rig = Rig::new(Vec::new());
    let mut variant = rig.variant(2);
    variant.update(&rig.device, 0.0, frame(0, 2)).unwrap();

    let world = Mat4::from_translation(Vec3::new(10.0, 0.0, -4.0));
    variant.set_placement(world, true);
    let outcome = variant.update(&rig.device, 0.0, frame(1, 2)).unwrap();

    assert_eq!(outcome.nodes_changed, 0);
    assert_eq!(variant.model_transform(BODY), world);
    assert_eq!(variant.global_transform(BODY), Mat4::IDENTITY);
}

// ─── Draw recording ───────────────────────────────────────────────────────

#[test]
fn color_draw_pushes_one_block_per_primitive_and_calls_back() {
    // --- 1. ARRANGE ---
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    let f = frame(0, 2);
    variant.update(&rig.device, 0.0, f).unwrap();
    let mut encoder = rig.device.create_command_encoder(Some("color"));
    let mut callbacks = Vec::new();

    // --- 2. ACT ---
    let draws = {
        let mut pass = encoder.begin_render_pass(&Default::default());
        let mut record = |_: &mut dyn RenderPass, primitive: &Primitive, _: &Node| {
            callbacks.push(primitive.first_index)
        };
        let count = variant
            .draw(pass.as_mut(), f, PassKind::Color, &mut record)
            .unwrap();
        count
    };
    let id = encoder.finish();
    rig.device.submit_command_buffer(id);

    // --- 3. ASSERT ---
    assert_eq!(draws, 2);
    assert_eq!(callbacks, vec![0, 36]);
    let submitted = rig.device.take_submitted();
    let commands = &submitted[0].passes[0].commands;
    assert!(matches!(
        commands[0],
        PassCommand::SetBindGroup { index: 1, .. }
    ));
    let pushes: Vec<ColorPush> = commands
        .iter()
        .filter_map(|c| match c {
            PassCommand::PushConstants { data, .. } => Some(bytemuck::pod_read_unaligned(data)),
            _ => None,
        })
        .collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].skin_offset, 0);
    assert_eq!(pushes[1].primitive_id, 1);
    assert!(matches!(
        commands.last(),
        Some(PassCommand::DrawIndexed { indices, base_vertex: 24, .. }) if *indices == (36..48)
    ));
}

#[test]
fn hidden_variant_records_nothing() {
    let rig = Rig::animated();
    let mut variant = rig.variant(2);
    variant.set_placement(Mat4::IDENTITY, false);
    let f = frame(0, 2);
    variant.update(&rig.device, 0.016, f).unwrap();
    let mut encoder = rig.device.create_command_encoder(None);

    let mut pass = encoder.begin_render_pass(&Default::default());
    let draws = variant
        .draw(pass.as_mut(), f, PassKind::DepthPrePass, &mut |_, _, _| {})
        .unwrap();

    assert_eq!(draws, 0);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "last updated in"))]
fn drawing_before_update_is_an_ordering_violation() {
    let rig = Rig::animated();
    let variant = rig.variant(2);
    let mut encoder = rig.device.create_command_encoder(None);
    let mut pass = encoder.begin_render_pass(&Default::default());

    let result = variant.draw(pass.as_mut(), frame(0, 2), PassKind::Color, &mut |_, _, _| {});

    assert!(matches!(result, Err(RenderError::OrderingViolation(_))));
}

// ─── Life cycle ───────────────────────────────────────────────────────────

#[test]
fn color_sets_bind_every_material_texture() {
    // --- 1. ARRANGE ---
    let mut description = common::two_joint_description(Vec::new());
    description.textures = vec![TextureViewId(40), TextureViewId(41)];
    description.sampler = Some(SamplerId(5));
    description.materials = vec![Material {
        base_color_texture: Some(0),
        normal_texture: Some(1),
        ..Default::default()
    }];
    let rig = Rig::from_description(description);

    // --- 2. ACT ---
    let variant = rig.variant(2);

    // --- 3. ASSERT ---
    for slot in 0..2 {
        let entries = rig
            .device
            .bind_group_entries(variant.bindings().get(slot, PassKind::Color))
            .expect("live color set");
        let views: Vec<TextureViewId> = entries
            .iter()
            .filter_map(|entry| match entry.resource {
                BindingResource::TextureView(view) => Some(view),
                _ => None,
            })
            .collect();
        assert_eq!(views.len(), MAX_MATERIAL_TEXTURES);
        assert_eq!(&views[..2], &[TextureViewId(40), TextureViewId(41)]);
        assert!(views[2..].iter().all(|&view| view == FALLBACK.texture));
        assert!(entries.contains(&BindGroupEntry::sampler(
            MATERIAL_SAMPLER_BINDING,
            SamplerId(5)
        )));
        assert!(entries.contains(&BindGroupEntry::buffer(
            1,
            rig.essence.material_buffer(),
            0,
            None
        )));
    }
}

#[test]
fn untextured_essence_binds_the_fallback_material_resources() {
    let rig = Rig::animated();
    let variant = rig.variant(1);

    let entries = rig
        .device
        .bind_group_entries(variant.bindings().get(0, PassKind::Color))
        .expect("live color set");

    assert!(entries.contains(&BindGroupEntry::sampler(
        MATERIAL_SAMPLER_BINDING,
        FALLBACK.sampler
    )));
    assert!(entries
        .iter()
        .filter(|entry| matches!(entry.resource, BindingResource::TextureView(_)))
        .all(|entry| entry.resource == BindingResource::TextureView(FALLBACK.texture)));
}

#[test]
fn failed_layout_creation_releases_the_layouts_already_made() {
    let device = marrow_infra::HeadlessDevice::new();
    device.fail_layouts_after(2);

    let result = marrow_lanes::render_lane::VariantLayouts::create(&device, FALLBACK);

    assert!(matches!(
        result,
        Err(marrow_core::renderer::ResourceError::Exhausted(_))
    ));
    assert_eq!(device.live_layout_count(), 0);
}

#[test]
fn destroy_releases_palette_and_binding_sets() {
    let rig = Rig::animated();
    let buffers_before = rig.device.live_buffer_count();
    let variant = rig.variant(3);
    assert_eq!(rig.device.live_buffer_count(), buffers_before + 3);
    assert_eq!(rig.device.live_bind_group_count(), 9);

    variant.destroy(&rig.device);

    assert_eq!(rig.device.live_buffer_count(), buffers_before);
    assert_eq!(rig.device.live_bind_group_count(), 0);
}

#[test]
fn failed_binding_set_allocation_releases_the_palette() {
    let rig = Rig::animated();
    let buffers_before = rig.device.live_buffer_count();
    rig.device.fail_bind_groups_after(4);

    let result = marrow_lanes::scene_lane::Variant::new(
        &rig.device,
        rig.essence.clone(),
        &rig.layouts,
        2,
        "doomed",
    );

    assert!(matches!(
        result,
        Err(marrow_core::renderer::ResourceError::Exhausted(_))
    ));
    assert_eq!(rig.device.live_buffer_count(), buffers_before);
    assert_eq!(rig.device.live_bind_group_count(), 0);
}
