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

//! Orchestrator fixtures on top of the headless backend.

#![allow(dead_code)]

use marrow_agents::render_agent::{
    FrameTargets, MaterialFallback, PassPipelines, PipelineOrchestrator, ShadowMapTargets,
};
use marrow_core::config::RendererConfig;
use marrow_core::math::{Mat4, Vec3};
use marrow_core::renderer::{
    BufferId, IndexFormat, RenderPipelineId, SamplerId, TextureViewId,
};
use marrow_data::animation::{AnimationClip, Channel, Keyframes, Track};
use marrow_data::essence::{
    Essence, GpuGeometry, Material, MeshDescription, NodeDescription, Primitive,
    SkinDescription, SubMesh,
};
use marrow_infra::{HeadlessDevice, HeadlessFence};
use std::sync::Arc;

pub const BODY: usize = 1;
pub const HIP: usize = 2;
pub const KNEE: usize = 3;

pub const PIPELINES: PassPipelines = PassPipelines {
    shadow: RenderPipelineId(10),
    depth: RenderPipelineId(11),
    color: RenderPipelineId(12),
};

pub const SHADOW_MAP: ShadowMapTargets = ShadowMapTargets {
    face_views: [
        TextureViewId(100),
        TextureViewId(101),
        TextureViewId(102),
        TextureViewId(103),
        TextureViewId(104),
        TextureViewId(105),
    ],
    cube_view: TextureViewId(106),
    sampler: SamplerId(7),
};

pub const MATERIAL_FALLBACK: MaterialFallback = MaterialFallback {
    texture: TextureViewId(300),
    sampler: SamplerId(8),
};

pub const TARGETS: FrameTargets = FrameTargets {
    color: TextureViewId(200),
    depth: TextureViewId(201),
};

fn hip_clip(name: &str, duration: f32, end: Vec3) -> AnimationClip {
    AnimationClip::new(
        name,
        vec![Channel {
            node: HIP,
            track: Track::Translation(Keyframes::new(vec![0.0, duration], vec![Vec3::ZERO, end])),
        }],
    )
}

/// Root with a skinned two-primitive body and a hip -> knee chain; the knee sits
/// one unit above the hip. `slide` moves the hip to +X over 1s, `lift` to +2Y over 2s.
pub fn legs(device: &HeadlessDevice) -> Arc<Essence> {
    let description = MeshDescription {
        name: "legs".into(),
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
                translation: Vec3::Y,
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
            inverse_bind_matrices: vec![Mat4::IDENTITY, Mat4::from_translation(-Vec3::Y)],
        }],
        animations: vec![
            hip_clip("slide", 1.0, Vec3::X),
            hip_clip("lift", 2.0, Vec3::new(0.0, 2.0, 0.0)),
        ],
        geometry: GpuGeometry {
            vertex_buffer: BufferId(usize::MAX - 1),
            index_buffer: BufferId(usize::MAX),
            index_format: IndexFormat::Uint32,
        },
    };
    Essence::new(Arc::new(device.clone()), description).expect("fixture model is valid")
}

pub struct Harness {
    pub device: HeadlessDevice,
    pub fence: Arc<HeadlessFence>,
    pub essence: Arc<Essence>,
    pub orchestrator: PipelineOrchestrator,
}

impl Harness {
    pub fn new(frames_in_flight: usize, worker_threads: usize) -> Self {
        let config = RendererConfig {
            frames_in_flight,
            worker_threads,
            ..Default::default()
        };
        let device = HeadlessDevice::new();
        let fence = Arc::new(HeadlessFence::new(frames_in_flight));
        let essence = legs(&device);
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(device.clone()),
            fence.clone(),
            config,
            PIPELINES,
            SHADOW_MAP,
            MATERIAL_FALLBACK,
        )
        .expect("orchestrator");
        Self {
            device,
            fence,
            essence,
            orchestrator,
        }
    }

    /// One full frame.
    pub fn frame(&mut self, dt: f32) -> marrow_agents::render_agent::FrameStats {
        self.orchestrator.update(dt).expect("update");
        self.orchestrator.render(&TARGETS).expect("render")
    }
}
