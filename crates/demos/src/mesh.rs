//! Procedural meshes drawn by the demos.

use glam::{Vec2, Vec3};
use vulkanisch_rhi::vertex::Vertex;

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned cube centered on the origin, one quad per face so every
    /// face has its own normal. Triangles wind counter-clockwise seen from outside.
    pub fn cube(half_extent: f32) -> Self {
        // (normal, u, v) with u x v = normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::NEG_Y, Vec3::Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::NEG_Z, Vec3::X),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let mut mesh = Self::default();
        for (normal, u, v) in faces {
            mesh.push_quad(normal * half_extent, u * half_extent, v * half_extent, normal);
        }
        mesh
    }

    /// Square floor in the XY plane at height `z`, facing +Z.
    pub fn floor(half_extent: f32, z: f32) -> Self {
        let mut mesh = Self::default();
        mesh.push_quad(
            Vec3::new(0.0, 0.0, z),
            Vec3::X * half_extent,
            Vec3::Y * half_extent,
            Vec3::Z,
        );
        mesh
    }

    fn push_quad(&mut self, center: Vec3, u: Vec3, v: Vec3, normal: Vec3) {
        let base = self.vertices.len() as u32;
        let corners = [
            (center - u - v, Vec2::new(0.0, 0.0)),
            (center + u - v, Vec2::new(1.0, 0.0)),
            (center + u + v, Vec2::new(1.0, 1.0)),
            (center - u + v, Vec2::new(0.0, 1.0)),
        ];
        self.vertices.extend(
            corners
                .into_iter()
                .map(|(position, uv)| Vertex::new(position, normal, uv)),
        );
        self.indices
            .extend([0, 1, 2, 0, 2, 3].into_iter().map(|i| base + i));
    }

    /// Append `other`, rebasing its indices.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| base + i));
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Floor of half-size 8 at z = -2 with a unit cube above it.
    pub fn shadow_scene() -> Self {
        let mut scene = Self::floor(8.0, -2.0);
        scene.append(&Self::cube(1.0));
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn triangles(mesh: &Mesh) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        mesh.indices.chunks_exact(3).map(|t| {
            [
                mesh.vertices[t[0] as usize],
                mesh.vertices[t[1] as usize],
                mesh.vertices[t[2] as usize],
            ]
        })
    }

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| i < 24));
    }

    #[rstest]
    #[case(Mesh::cube(1.0))]
    #[case(Mesh::cube(0.25))]
    #[case(Mesh::floor(8.0, -2.0))]
    #[case(Mesh::shadow_scene())]
    fn test_winding_matches_normals(#[case] mesh: Mesh) {
        for [a, b, c] in triangles(&mesh) {
            let face = (b.position - a.position).cross(c.position - a.position);
            assert!(face.dot(a.normal) > 0.0);
            assert!((a.normal.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cube_normals_point_outward() {
        for vertex in Mesh::cube(0.5).vertices {
            assert!(vertex.position.dot(vertex.normal) > 0.0);
            assert!((vertex.position.abs().max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_append_rebases_indices() {
        let scene = Mesh::shadow_scene();
        assert_eq!(scene.vertices.len(), 4 + 24);
        assert_eq!(scene.index_count(), 6 + 36);
        assert_eq!(scene.indices[6], 4);
        assert!(scene.vertices[..4].iter().all(|v| v.position.z == -2.0));
    }
}
