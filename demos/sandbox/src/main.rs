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

// Marrow Sandbox
// Runs the whole update/render protocol on the headless backend and logs what
// every frame did.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context, Result};
use marrow_agents::render_agent::{
    FrameTargets, MaterialFallback, PassPipelines, PipelineOrchestrator, ShadowMapTargets,
    VariantHandle,
};
use marrow_core::math::{Mat4, Quat, Vec3};
use marrow_core::renderer::{
    BufferDescriptor, BufferUsage, GraphicsDevice, IndexFormat, RenderPipelineId, SamplerId,
    TextureViewId,
};
use marrow_core::RendererConfig;
use marrow_data::animation::{AnimationClip, Channel, Keyframes, Track};
use marrow_data::essence::{
    Essence, GpuGeometry, Material, MeshDescription, NodeDescription, Primitive,
    SkinDescription, SubMesh,
};
use marrow_infra::{HeadlessDevice, HeadlessFence};

const CROWD: usize = 24;
const FRAMES: u64 = 240;
const DT: f32 = 1.0 / 60.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    joints: [u32; 2],
    weights: [f32; 2],
}

/// A two-bone column: the lower ring follows the hip, the upper ring the knee.
fn column_geometry(device: &dyn GraphicsDevice) -> Result<GpuGeometry> {
    let mut vertices = Vec::new();
    for ring in 0..2u32 {
        for corner in 0..4 {
            let angle = corner as f32 * std::f32::consts::FRAC_PI_2;
            vertices.push(Vertex {
                position: [angle.cos() * 0.2, ring as f32, angle.sin() * 0.2],
                joints: [ring, 0],
                weights: [1.0, 0.0],
            });
        }
    }
    let mut indices: Vec<u32> = Vec::new();
    for side in 0..4u32 {
        let (a, b) = (side, (side + 1) % 4);
        indices.extend_from_slice(&[a, b, a + 4, b, b + 4, a + 4]);
    }
    // Caps.
    indices.extend_from_slice(&[0, 2, 1, 0, 3, 2, 4, 5, 6, 4, 6, 7]);

    let vertex_buffer = device.create_buffer_with_data(
        &BufferDescriptor {
            label: Some(Cow::Borrowed("Column vertices")),
            size: std::mem::size_of_val(vertices.as_slice()) as u64,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        },
        bytemuck::cast_slice(&vertices),
    )?;
    let index_buffer = device.create_buffer_with_data(
        &BufferDescriptor {
            label: Some(Cow::Borrowed("Column indices")),
            size: std::mem::size_of_val(indices.as_slice()) as u64,
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        },
        bytemuck::cast_slice(&indices),
    )?;
    Ok(GpuGeometry {
        vertex_buffer,
        index_buffer,
        index_format: IndexFormat::Uint32,
    })
}

fn column(device: Arc<dyn GraphicsDevice>) -> Result<Arc<Essence>> {
    let geometry = column_geometry(device.as_ref())?;
    let sway = AnimationClip::new(
        "sway",
        vec![Channel {
            node: 2,
            track: Track::Rotation(Keyframes::new(
                vec![0.0, 0.5, 1.0],
                vec![
                    Quat::from_rotation_z(-0.3),
                    Quat::from_rotation_z(0.3),
                    Quat::from_rotation_z(-0.3),
                ],
            )),
        }],
    );
    let bounce = AnimationClip::new(
        "bounce",
        vec![Channel {
            node: 2,
            track: Track::Translation(Keyframes::new(
                vec![0.0, 0.4, 0.8],
                vec![Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0), Vec3::ZERO],
            )),
        }],
    );

    let description = MeshDescription {
        name: "column".into(),
        nodes: vec![
            NodeDescription {
                name: "root".into(),
                children: vec![1, 2],
                ..Default::default()
            },
            NodeDescription {
                name: "skin".into(),
                mesh: Some(0),
                skin: Some(0),
                ..Default::default()
            },
            NodeDescription {
                name: "hip".into(),
                children: vec![3],
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
                    index_count: 24,
                    vertex_offset: 0,
                    material: 0,
                },
                Primitive {
                    first_index: 24,
                    index_count: 12,
                    vertex_offset: 0,
                    material: 1,
                },
            ],
        }],
        materials: vec![
            Material {
                base_color_texture: Some(0),
                ..Default::default()
            },
            Material {
                base_color_factor: [0.9, 0.3, 0.1, 1.0],
                ..Default::default()
            },
        ],
        textures: vec![TextureViewId(20)],
        sampler: Some(SamplerId(2)),
        skins: vec![SkinDescription {
            name: "column".into(),
            joints: vec![2, 3],
            inverse_bind_matrices: vec![Mat4::IDENTITY, Mat4::from_translation(-Vec3::Y)],
        }],
        animations: vec![sway, bounce],
        geometry,
    };
    Ok(Essence::new(device, description)?)
}

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file '{path}'"))?;
            Ok(RendererConfig::from_ron_str(&text)?)
        }
        None => Ok(RendererConfig::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Sandbox: {:?}", config);

    let device = HeadlessDevice::new();
    let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    let fence = Arc::new(HeadlessFence::new(config.frames_in_flight));
    let essence = column(shared.clone())?;

    let pipelines = PassPipelines {
        shadow: RenderPipelineId(0),
        depth: RenderPipelineId(1),
        color: RenderPipelineId(2),
    };
    let shadow_map = ShadowMapTargets {
        face_views: std::array::from_fn(TextureViewId),
        cube_view: TextureViewId(6),
        sampler: SamplerId(0),
    };
    let targets = FrameTargets {
        color: TextureViewId(7),
        depth: TextureViewId(8),
    };

    let fallback = MaterialFallback {
        texture: TextureViewId(9),
        sampler: SamplerId(1),
    };

    let mut orchestrator =
        PipelineOrchestrator::new(shared, fence, config, pipelines, shadow_map, fallback)?;
    orchestrator.update_camera_view(Mat4::look_at_rh(
        Vec3::new(0.0, 6.0, 14.0),
        Vec3::ZERO,
        Vec3::Y,
    ));
    orchestrator.update_camera_projection(Mat4::perspective_rh(0.8, 16.0 / 9.0, 0.1, 100.0));
    orchestrator.update_camera_position(Vec3::new(0.0, 6.0, 14.0));

    let crowd: Vec<VariantHandle> = (0..CROWD)
        .map(|i| -> Result<VariantHandle> {
            let handle = orchestrator.create_variant(essence.clone())?;
            let x = (i % 6) as f32 * 1.5 - 3.75;
            let z = (i / 6) as f32 * -1.5;
            orchestrator.set_placement(handle, Mat4::from_translation(Vec3::new(x, 0.0, z)), true)?;
            orchestrator.set_active_animation(handle, "sway", 0.0, true, i as f32 * 0.05)?;
            Ok(handle)
        })
        .collect::<Result<_>>()?;

    let mut draw_calls = 0u64;
    for frame in 0..FRAMES {
        // Every second, half the crowd swaps clips with a short cross-fade.
        if frame % 60 == 30 {
            let clip = if (frame / 60) % 2 == 0 { "bounce" } else { "sway" };
            for &handle in crowd.iter().step_by(2) {
                orchestrator.set_active_animation(handle, clip, 0.25, true, 0.0)?;
            }
        }
        let angle = frame as f32 * DT;
        orchestrator.update_light_position(Vec3::new(angle.cos() * 4.0, 5.0, angle.sin() * 4.0));

        orchestrator.update(DT)?;
        let stats = orchestrator.render(&targets)?;
        draw_calls += u64::from(stats.draw_calls());
        if frame % 60 == 0 {
            log::info!(
                "Frame {}: {} variants, {} draws ({} shadow), {} skin uploads, {} uniform uploads",
                stats.frame,
                stats.variants_updated,
                stats.draw_calls(),
                stats.shadow_draws,
                stats.skin_uploads,
                stats.uniform_uploads
            );
        }
    }

    for handle in crowd {
        orchestrator.destroy_variant(handle)?;
    }
    drop(orchestrator);
    log::info!(
        "Sandbox: {} frames, {} draw calls, {} command buffers, {} buffers still alive",
        FRAMES,
        draw_calls,
        device.submitted().len(),
        device.live_buffer_count()
    );
    Ok(())
}
