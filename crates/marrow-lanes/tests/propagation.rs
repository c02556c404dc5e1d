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

use marrow_core::math::{mat4_approx_eq, Mat4, Quat, Vec3};
use marrow_core::renderer::{BufferId, IndexFormat};
use marrow_data::animation::{AnimationClip, Channel, Keyframes, Track};
use marrow_data::essence::{Essence, GpuGeometry, MeshDescription, NodeDescription};
use marrow_data::node::Node;
use marrow_infra::HeadlessDevice;
use marrow_lanes::scene_lane::{
    advance_clock, mark_local_dirty, propagate_transforms, sample_clip, PoseSlot,
    PropagationParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A vector with every component in `-1..1`.
fn random_vec3(rng: &mut StdRng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    )
}

/// A random tree where node `i > 0` hangs under a random earlier node.
fn random_tree(rng: &mut StdRng, len: usize) -> (Arc<Essence>, Vec<Option<usize>>) {
    let parents: Vec<Option<usize>> = (0..len)
        .map(|i| if i == 0 { None } else { Some(rng.gen_range(0..i)) })
        .collect();
    let mut nodes: Vec<NodeDescription> = (0..len)
        .map(|i| NodeDescription {
            name: format!("n{i}"),
            translation: random_vec3(rng) * 3.0,
            rotation: Quat::from_axis_angle(
                random_vec3(rng).try_normalize().unwrap_or(Vec3::Y),
                rng.gen_range(-3.0..3.0),
            ),
            scale: Vec3::splat(1.0 + rng.gen::<f32>() * 0.5),
            ..Default::default()
        })
        .collect();
    for (child, parent) in parents.iter().enumerate() {
        if let Some(p) = parent {
            nodes[*p].children.push(child);
        }
    }
    let desc = MeshDescription {
        name: "random".into(),
        nodes,
        meshes: Vec::new(),
        materials: Vec::new(),
        textures: Vec::new(),
        sampler: None,
        skins: Vec::new(),
        animations: Vec::new(),
        geometry: GpuGeometry {
            vertex_buffer: BufferId(0),
            index_buffer: BufferId(0),
            index_format: IndexFormat::Uint16,
        },
    };
    let essence =
        Essence::new(Arc::new(HeadlessDevice::new()), desc).expect("random tree is valid");
    (essence, parents)
}

/// Reference global: the product of every ancestor's local, root first.
fn reference_global(nodes: &[Node], parents: &[Option<usize>], index: usize) -> Mat4 {
    let mut chain = vec![index];
    while let Some(p) = parents[*chain.last().unwrap_or(&index)] {
        chain.push(p);
    }
    chain
        .iter()
        .rev()
        .fold(Mat4::IDENTITY, |acc, &i| acc * nodes[i].current.to_matrix())
}

fn params(generation: u64) -> PropagationParams<'static> {
    PropagationParams {
        placement: &Mat4::IDENTITY,
        placement_changed: false,
        blend: None,
        generation,
    }
}

#[test]
fn globals_match_ancestor_products_under_random_dirty_sets() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _tree in 0..8 {
        let len = rng.gen_range(2..42);
        let (essence, parents) = random_tree(&mut rng, len);
        let mut nodes: Vec<Node> = (0..len).map(|i| Node::new(essence.rest_pose(i))).collect();
        propagate_transforms(&essence, &mut nodes, params(1));

        for generation in 2..12 {
            for _ in 0..rng.gen_range(0..4) {
                let victim = rng.gen_range(0..len);
                nodes[victim].current.translation += random_vec3(&mut rng);
                nodes[victim].current.rotation =
                    (nodes[victim].current.rotation * Quat::from_rotation_y(rng.gen_range(-1.0..1.0))).normalize();
                mark_local_dirty(&mut nodes, essence.parents(), victim);
            }

            propagate_transforms(&essence, &mut nodes, params(generation));

            for i in 0..len {
                let expected = reference_global(&nodes, &parents, i);
                assert!(
                    mat4_approx_eq(&nodes[i].global, &expected, 1e-3),
                    "node {i} of a {len}-node tree diverged in generation {generation}"
                );
            }
        }
    }
}

#[test]
fn only_changed_nodes_and_their_descendants_are_recomputed() {
    let mut rng = StdRng::seed_from_u64(42);
    let (essence, parents) = random_tree(&mut rng, 30);
    let mut nodes: Vec<Node> = (0..30).map(|i| Node::new(essence.rest_pose(i))).collect();
    propagate_transforms(&essence, &mut nodes, params(1));

    let victim = 17;
    mark_local_dirty(&mut nodes, essence.parents(), victim);
    let changed = propagate_transforms(&essence, &mut nodes, params(2));

    let is_descendant = |mut i: usize| loop {
        if i == victim {
            break true;
        }
        match parents[i] {
            Some(p) => i = p,
            None => break false,
        }
    };
    let expected = (0..30).filter(|&i| is_descendant(i)).count();
    assert_eq!(changed, expected);
    for (i, node) in nodes.iter().enumerate() {
        assert_eq!(node.changed_in(2), is_descendant(i), "node {i}");
    }
}

#[test]
fn looping_clip_samples_identically_whole_durations_apart() {
    let clip = AnimationClip::new(
        "swing",
        vec![
            Channel {
                node: 0,
                track: Track::Rotation(Keyframes::new(
                    vec![0.0, 0.5, 1.5],
                    vec![
                        Quat::IDENTITY,
                        Quat::from_rotation_z(1.0),
                        Quat::from_rotation_z(-0.5),
                    ],
                )),
            },
            Channel {
                node: 0,
                track: Track::Translation(Keyframes::new(
                    vec![0.0, 1.5],
                    vec![Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)],
                )),
            },
        ],
    );
    let parents = [None];

    for &t in &[0.25_f32, 0.5, 0.75, 1.25] {
        let mut reference = vec![Node::new(Default::default())];
        sample_clip(&clip, t, &mut reference, &parents, PoseSlot::Current);

        for k in 1..4 {
            let mut time = 0.0;
            advance_clock(&mut time, t + clip.duration() * k as f32, &clip, true);
            let mut looped = vec![Node::new(Default::default())];
            sample_clip(&clip, time, &mut looped, &parents, PoseSlot::Current);

            assert_eq!(
                looped[0].current, reference[0].current,
                "t={t} differs after {k} loops"
            );
        }
    }
}
