//! Per-frame uniform block shared by every mesh shader.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use vulkanisch_scene::{Camera, ShadowLight};

/// Matches `struct Scene` in the WGSL sources.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    /// Light view-projection times model.
    pub light_mvp: Mat4,
    pub light_position: Vec4,
    pub camera_position: Vec4,
    /// x: light intensity. Values above 1 push lit surfaces past the bloom threshold.
    pub params: Vec4,
}

impl SceneUniforms {
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<Self>() as vk::DeviceSize;

    /// Camera view with a projection fitted to `extent`.
    pub fn new(model: Mat4, camera: &Camera, light: &ShadowLight, extent: vk::Extent2D) -> Self {
        let mut projection = camera.projection;
        if extent.width > 0 && extent.height > 0 {
            projection.aspect = extent.width as f32 / extent.height as f32;
        }
        Self {
            model,
            view: camera.view_matrix(),
            proj: projection.matrix(),
            light_mvp: light.view_projection_matrix() * model,
            light_position: light.position.extend(1.0),
            camera_position: camera.position().extend(1.0),
            params: Vec4::new(1.0, 0.0, 0.0, 0.0),
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.params.x = intensity;
        self
    }
}

/// Tumbling cube: the angle advances 3.5 rad/s around three axes at different rates.
pub fn tumble(time: f32) -> Mat4 {
    let angle = time * 3.5;
    Mat4::from_rotation_z(angle * 0.3)
        * Mat4::from_rotation_y(angle * 0.2)
        * Mat4::from_rotation_x(angle * 0.25)
}

/// Slow turntable around +Z for the shadowed scene.
pub fn turntable(time: f32) -> Mat4 {
    Mat4::from_rotation_z(time * 1.2 * 0.3)
}
