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

//! GPU layouts of the pipeline-level uniform buffers and the CPU state they are
//! derived from.

use super::SHADOW_CUBE_FACES;
use bytemuck::{Pod, Zeroable};
use marrow_core::math::{to_gpu, Mat4, Vec3};
use marrow_core::ShadowConfig;

/// Stride between shadow face blocks; matches the usual minimum uniform offset
/// alignment so each face can be selected with a dynamic offset.
pub const SHADOW_FACE_STRIDE: u64 = 256;

/// Camera and light parameters read by the depth pre-pass and the color pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    /// Camera view-projection.
    pub view_proj: [[f32; 4]; 4],
    /// Camera position, `w` unused.
    pub camera_position: [f32; 4],
    /// Point light position, `w` unused.
    pub light_position: [f32; 4],
    /// Point light color (linear RGB) and intensity in `w`.
    pub light_color: [f32; 4],
    /// Shadow near plane, far plane, unused, unused.
    pub shadow_params: [f32; 4],
}

/// The view-projection of one shadow cube face, padded to [`SHADOW_FACE_STRIDE`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowFaceUniform {
    /// Light view-projection for this face.
    pub view_proj: [[f32; 4]; 4],
    /// Light position, `w` unused.
    pub light_position: [f32; 4],
    /// Near plane, far plane, unused, unused.
    pub params: [f32; 4],
    /// Padding up to the face stride.
    pub _padding: [[f32; 4]; 10],
}

/// The six face blocks of the shadow uniform buffer.
pub type ShadowFaces = [ShadowFaceUniform; SHADOW_CUBE_FACES as usize];

/// Camera state cached by the orchestrator's setters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// World-to-view transform.
    pub view: Mat4,
    /// View-to-clip transform.
    pub projection: Mat4,
    /// World-space position.
    pub position: Vec3,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

/// Point light state cached by the orchestrator's setters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    /// World-space position.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl FrameUniform {
    /// Packs the camera and light state.
    pub fn new(camera: &CameraState, light: &LightState, shadow: &ShadowConfig) -> Self {
        Self {
            view_proj: to_gpu(&(camera.projection * camera.view)),
            camera_position: camera.position.extend(1.0).to_array(),
            light_position: light.position.extend(1.0).to_array(),
            light_color: light.color.extend(light.intensity).to_array(),
            shadow_params: [shadow.near, shadow.far, 0.0, 0.0],
        }
    }
}

/// Returns the view-projection rendering cube face `face` of a point light.
///
/// Faces follow the +X, -X, +Y, -Y, +Z, -Z cube map convention with a 90° field of
/// view.
pub fn cube_face_view_proj(light_position: Vec3, face: u32, near: f32, far: f32) -> Mat4 {
    let (direction, up) = match face {
        0 => (Vec3::X, Vec3::NEG_Y),
        1 => (Vec3::NEG_X, Vec3::NEG_Y),
        2 => (Vec3::Y, Vec3::Z),
        3 => (Vec3::NEG_Y, Vec3::NEG_Z),
        4 => (Vec3::Z, Vec3::NEG_Y),
        _ => (Vec3::NEG_Z, Vec3::NEG_Y),
    };
    let view = Mat4::look_to_rh(light_position, direction, up);
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far);
    projection * view
}

/// Builds the six face blocks for a light.
pub fn shadow_faces(light: &LightState, shadow: &ShadowConfig) -> ShadowFaces {
    std::array::from_fn(|face| ShadowFaceUniform {
        view_proj: to_gpu(&cube_face_view_proj(
            light.position,
            face as u32,
            shadow.near,
            shadow.far,
        )),
        light_position: light.position.extend(1.0).to_array(),
        params: [shadow.near, shadow.far, 0.0, 0.0],
        _padding: [[0.0; 4]; 10],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_core::math::Vec4;

    #[test]
    fn shadow_face_block_matches_stride() {
        assert_eq!(
            std::mem::size_of::<ShadowFaceUniform>() as u64,
            SHADOW_FACE_STRIDE
        );
        assert_eq!(std::mem::size_of::<ShadowFaces>(), 6 * 256);
    }

    #[test]
    fn each_face_looks_down_its_axis() {
        let light = Vec3::new(1.0, 2.0, 3.0);
        let axes = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (face, axis) in axes.iter().enumerate() {
            let vp = cube_face_view_proj(light, face as u32, 0.1, 100.0);
            let clip: Vec4 = vp * (light + *axis * 10.0).extend(1.0);
            let ndc = clip.truncate() / clip.w;
            assert!(clip.w > 0.0, "face {face} point must be in front of the light");
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "face {face} centre");
        }
    }
}
