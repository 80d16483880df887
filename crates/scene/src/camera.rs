//! View-space camera driven by mouse drags and WASD.

use glam::{Mat4, Vec3};

/// Radians of view rotation per pixel of mouse drag.
pub const ROTATE_SPEED: f32 = 0.01;
/// View-space units per second of keyboard movement.
pub const MOVE_SPEED: f32 = 10.0;

/// Perspective projection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: 1.5,
            aspect: 800.0 / 600.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    /// Right-handed, depth in [0, 1], with Y flipped for Vulkan clip space.
    pub fn matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Camera stored as a view matrix; movement is applied in view space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    view: Mat4,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::splat(3.0), Vec3::ZERO, Vec3::Z)
    }
}

impl Camera {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Projection::default(),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.projection.aspect = aspect;
        }
    }

    /// Rotate around the view Y axis by `dx` and the view X axis by `dy` radians.
    pub fn rotate_view(&mut self, dx: f32, dy: f32) {
        let rotation = Mat4::from_rotation_y(dx) * Mat4::from_rotation_x(dy);
        self.view = orthonormalize(rotation * self.view);
    }

    /// Move by `offset` expressed in view space.
    pub fn translate_view(&mut self, offset: Vec3) {
        self.view = Mat4::from_translation(offset) * self.view;
    }

    #[inline]
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    #[inline]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view
    }

    /// Eye position in world space.
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }
}

/// Re-orthonormalize the rotation part so repeated drags do not drift.
fn orthonormalize(m: Mat4) -> Mat4 {
    let x = m.x_axis.truncate().normalize();
    let y_raw = m.y_axis.truncate();
    let y = (y_raw - x * x.dot(y_raw)).normalize();
    let z = x.cross(y);
    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), m.w_axis)
}

/// Keys held this frame that move the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Movement {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

impl Movement {
    /// View-space direction; the world moves opposite to the eye.
    pub fn direction(&self) -> Vec3 {
        let mut dir = Vec3::ZERO;
        if self.left {
            dir.x += 1.0;
        }
        if self.right {
            dir.x -= 1.0;
        }
        if self.forward {
            dir.z += 1.0;
        }
        if self.back {
            dir.z -= 1.0;
        }
        dir
    }
}

/// Applies drag rotation and keyboard movement to a [`Camera`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyController {
    pub rotate_speed: f32,
    pub move_speed: f32,
}

impl Default for FlyController {
    fn default() -> Self {
        Self {
            rotate_speed: ROTATE_SPEED,
            move_speed: MOVE_SPEED,
        }
    }
}

impl FlyController {
    /// `drag` is the mouse delta in pixels while the left button is held.
    ///
    /// Returns whether the camera changed.
    pub fn update(
        &self,
        camera: &mut Camera,
        drag: Option<(f32, f32)>,
        movement: Movement,
        delta_secs: f32,
    ) -> bool {
        let mut changed = false;
        if let Some((dx, dy)) = drag
            && (dx != 0.0 || dy != 0.0)
        {
            camera.rotate_view(dx * self.rotate_speed, dy * self.rotate_speed);
            changed = true;
        }
        let direction = movement.direction();
        if direction != Vec3::ZERO {
            camera.translate_view(direction * self.move_speed * delta_secs);
            changed = true;
        }
        changed
    }
}
