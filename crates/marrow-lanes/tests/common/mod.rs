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

//! Shared model builders for the lane integration tests.

#![allow(dead_code)]

use marrow_core::math::{Mat4, Vec3};
use marrow_core::renderer::{BufferId, IndexFormat, SamplerId, TextureViewId};
use marrow_data::animation::{AnimationClip, Channel, Keyframes, Track};
use marrow_data::essence::{
    Essence, GpuGeometry, Material, MeshDescription, NodeDescription, Primitive,
    SkinDescription, SubMesh,
};
use marrow_infra::HeadlessDevice;
use marrow_lanes::render_lane::{MaterialFallback, VariantLayouts};
use marrow_lanes::scene_lane::Variant;
use std::sync::Arc;

pub const ROOT: usize = 0;
pub const BODY: usize = 1;
pub const HIP: usize = 2;
pub const KNEE: usize = 3;

pub const FALLBACK: MaterialFallback = MaterialFallback {
    texture: TextureViewId(900),
    sampler: SamplerId(90),
};

/// `slide` moves the hip from the origin to (1,0,0) in one second.
pub fn slide_clip() -> AnimationClip {
    AnimationClip::new(
        "slide",
        vec![Channel {
            node: HIP,
            track: Track::Translation(Keyframes::new(
                vec![0.0, 1.0],
                vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)],
            )),
        }],
    )
}

/// `lift` moves the hip from the origin to (0,2,0) in two seconds.
pub fn lift_clip() -> AnimationClip {
    AnimationClip::new(
        "lift",
        vec![Channel {
            node: HIP,
            track: Track::Translation(Keyframes::new(
                vec![0.0, 2.0],
                vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)],
            )),
        }],
    )
}

/// `kick` swings the knee forward by one unit in one second and leaves the hip
/// alone.
pub fn kick_clip() -> AnimationClip {
    AnimationClip::new(
        "kick",
        vec![Channel {
            node: KNEE,
            track: Track::Translation(Keyframes::new(
                vec![0.0, 1.0],
                vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 1.0)],
            )),
        }],
    )
}

/// A root with a skinned body mesh (two primitives) and a hip -> knee joint chain.
/// The knee rests one unit above the hip.
pub fn two_joint_description(animations: Vec<AnimationClip>) -> MeshDescription {
    MeshDescription {
        name: "two-joint".into(),
        nodes: vec![
            NodeDescription {
                name: "root".into(),
                children: vec![BODY, HIP],
                ..Default::default()
            },
            NodeDescription {
                name: "body".into(),
                mesh: Some(0),
                skin: Some(0),
                ..Default::default()
            },
            NodeDescription {
                name: "hip".into(),
                children: vec![KNEE],
                ..Default::default()
            },
            NodeDescription {
                name: "knee".into(),
                translation: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            },
        ],
        meshes: vec![SubMesh {
            primitives: vec![
                Primitive {
                    first_index: 0,
                    index_count: 36,
                    vertex_offset: 0,
                    material: 0,
                },
                Primitive {
                    first_index: 36,
                    index_count: 12,
                    vertex_offset: 24,
                    material: 0,
                },
            ],
        }],
        materials: vec![Material::default()],
        textures: Vec::new(),
        sampler: None,
        skins: vec![SkinDescription {
            name: "legs".into(),
            joints: vec![HIP, KNEE],
            inverse_bind_matrices: vec![
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            ],
        }],
        animations,
        geometry: GpuGeometry {
            vertex_buffer: BufferId(usize::MAX - 1),
            index_buffer: BufferId(usize::MAX),
            index_format: IndexFormat::Uint32,
        },
    }
}

pub struct Rig {
    pub device: HeadlessDevice,
    pub layouts: VariantLayouts,
    pub essence: Arc<Essence>,
}

impl Rig {
    pub fn new(animations: Vec<AnimationClip>) -> Self {
        Self::from_description(two_joint_description(animations))
    }

    pub fn from_description(description: MeshDescription) -> Self {
        let device = HeadlessDevice::new();
        let layouts = VariantLayouts::create(&device, FALLBACK).expect("layouts");
        let essence =
            Essence::new(Arc::new(device.clone()), description).expect("fixture model is valid");
        Self {
            device,
            layouts,
            essence,
        }
    }

    pub fn animated() -> Self {
        Self::new(vec![slide_clip(), lift_clip()])
    }

    pub fn variant(&self, frames_in_flight: usize) -> Variant {
        Variant::new(
            &self.device,
            self.essence.clone(),
            &self.layouts,
            frames_in_flight,
            "test variant",
        )
        .expect("variant allocation")
    }
}
