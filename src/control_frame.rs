//! Pose of the oriented control frame the user drags around, and the
//! world-space corners that become the soft box's static anchors.
//!
//! Grounded in `original_source/source/ControlFrame.cpp`: the model matrix
//! is `translation * rotation * scale` and the eight corners are the unit
//! cube `(+/-0.5, +/-0.5, +/-0.5)` pushed through it.

use glam::{DMat4, DQuat, DVec3, EulerRot};

/// Euler angles `(yaw, pitch, roll)`, composed about world axes `(Z, X,
/// Y)` respectively. This fixes the convention spec.md leaves open (§9),
/// matching `glm::orientate4` used by the original implementation.
pub const EULER_ORDER: EulerRot = EulerRot::ZXY;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlFrame {
    pub position: DVec3,
    /// `(yaw, pitch, roll)` in radians; see [`EULER_ORDER`].
    pub orientation: DVec3,
    pub size: f64,
    pub spring_constant: f64,
    pub attenuation: f64,
}

impl Default for ControlFrame {
    fn default() -> Self {
        ControlFrame {
            position: DVec3::ZERO,
            orientation: DVec3::ZERO,
            size: 3.0,
            spring_constant: 10.0,
            attenuation: 0.0,
        }
    }
}

impl ControlFrame {
    /// `T(position) * R(orientation) * S(size)`.
    pub fn model_matrix(&self) -> DMat4 {
        let scale = DMat4::from_scale(DVec3::splat(self.size));
        let rotation = DMat4::from_quat(DQuat::from_euler(
            EULER_ORDER,
            self.orientation.x,
            self.orientation.y,
            self.orientation.z,
        ));
        let translation = DMat4::from_translation(self.position);
        translation * rotation * scale
    }

    /// The eight world-space corners of the unit cube under the current
    /// model matrix, in the enumeration order `k = 4*zs + 2*ys + xs` used
    /// by [`crate::soft_box::SoftBox`] to match frame corners to anchor
    /// springs (spec.md §4.4).
    pub fn corners(&self) -> [DVec3; 8] {
        let m = self.model_matrix();
        let mut out = [DVec3::ZERO; 8];
        for zs in 0..2 {
            for ys in 0..2 {
                for xs in 0..2 {
                    let k = 4 * zs + 2 * ys + xs;
                    let local = DVec3::new(
                        if xs == 0 { -0.5 } else { 0.5 },
                        if ys == 0 { -0.5 } else { 0.5 },
                        if zs == 0 { -0.5 } else { 0.5 },
                    );
                    out[k] = m.transform_point3(local);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_frame_corners_match_scaled_unit_cube() {
        let frame = ControlFrame {
            position: DVec3::ZERO,
            orientation: DVec3::ZERO,
            size: 2.0,
            ..Default::default()
        };
        let corners = frame.corners();
        assert_eq!(corners[0], DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(corners[7], DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(corners[4], DVec3::new(-1.0, -1.0, 1.0));
    }

    #[test]
    fn translated_frame_offsets_every_corner() {
        let frame = ControlFrame {
            position: DVec3::new(2.0, 0.0, 0.0),
            orientation: DVec3::ZERO,
            size: 1.0,
            ..Default::default()
        };
        let corners = frame.corners();
        for corner in corners {
            assert!(corner.x > 1.0);
        }
    }

    #[test]
    fn rotation_preserves_centroid_at_frame_position() {
        let frame = ControlFrame {
            position: DVec3::new(1.0, 2.0, 3.0),
            orientation: DVec3::new(0.3, -0.6, 1.1),
            size: 4.0,
            ..Default::default()
        };
        let corners = frame.corners();
        let centroid: DVec3 = corners.iter().fold(DVec3::ZERO, |acc, c| acc + *c) / 8.0;
        assert!((centroid - frame.position).length() < 1e-9);
    }
}
