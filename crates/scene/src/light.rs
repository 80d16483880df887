//! Shadow-casting light.

use glam::{Mat4, Vec3};

use crate::camera::Projection;

/// A spot-like light rendered into a square shadow map from `position`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowLight {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub color: Vec3,
}

impl Default for ShadowLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(6.0, 2.0, 7.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            projection: Projection {
                fov_y: 1.5,
                aspect: 1.0,
                near: 1.0,
                far: 100.0,
            },
            color: Vec3::ONE,
        }
    }
}

impl ShadowLight {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection.matrix() * self.view_matrix()
    }

    /// Unit vector from the lit point toward the light.
    pub fn direction_to_light(&self, point: Vec3) -> Vec3 {
        (self.position - point).normalize_or_zero()
    }
}
