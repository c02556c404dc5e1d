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

//! Math types used across the engine.
//!
//! Marrow does not ship its own linear algebra; it re-exports `glam` so every
//! crate agrees on one `Mat4`/`Quat` layout (column-major, right-handed).

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Tolerance used for approximate float comparisons.
pub const EPSILON: f32 = 1e-5;

/// Returns `true` when every element of `a` and `b` differs by at most `epsilon`.
pub fn mat4_approx_eq(a: &Mat4, b: &Mat4, epsilon: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= epsilon)
}

/// Builds a local transform from translation, rotation and scale (T * R * S).
#[inline]
pub fn compose_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Converts a matrix into the `[[f32; 4]; 4]` layout expected by GPU blocks.
#[inline]
pub fn to_gpu(matrix: &Mat4) -> [[f32; 4]; 4] {
    matrix.to_cols_array_2d()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_trs_applies_scale_then_rotation_then_translation() {
        let m = compose_trs(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let p = m.transform_point3(Vec3::X);
        // (1,0,0) scaled to (2,0,0), rotated to (0,2,0), translated to (1,4,3).
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < EPSILON);
    }

    #[test]
    fn approx_eq_tolerates_small_noise() {
        let a = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let b = Mat4::from_translation(Vec3::new(1.0 + 1e-7, 0.0, 0.0));
        assert!(mat4_approx_eq(&a, &b, EPSILON));
        assert!(!mat4_approx_eq(&a, &Mat4::IDENTITY, EPSILON));
    }
}
