//! The cube again, with a procedurally generated checker texture.

use ash::vk;
use tracing::debug;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::{
    FrameContext, HostedRenderer, PassContext, PassTargets, RenderGraph, Registry, SurfaceInfo,
    VulkanBackend, VulkanRecorder,
};
use vulkanisch_rhi::descriptor::DescriptorBindingBuilder;
use vulkanisch_rhi::sampler::{Sampler, SamplerKind};
use vulkanisch_rhi::texture::Texture;
use vulkanisch_scene::{Camera, ShadowLight};

use crate::gpu::{GpuMesh, SceneBindings};
use crate::hello_cube;
use crate::lit::LitMesh;
use crate::mesh::Mesh;
use crate::uniforms::{SceneUniforms, tumble};

pub const NAME: &str = "Texturing";

pub const SHADER: &str = concat!(
    include_str!("../shaders/scene.wgsl"),
    include_str!("../shaders/textured.wgsl")
);

const CHECKER_SIZE: u32 = 128;
const CHECKER_CELLS: u32 = 4;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

/// Tightly packed RGBA8 checkerboard, `cells` squares per side, white on
/// the diagonal and red elsewhere.
pub fn checker_pixels(size: u32, cells: u32) -> Vec<u8> {
    let period = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let white = (x / period) % 2 == (y / period) % 2;
            pixels.extend_from_slice(if white { &WHITE } else { &RED });
        }
    }
    pixels
}

/// GPU state that outlives surface recreation. The texture and sampler are
/// referenced by every slot's descriptor set.
struct Material {
    cube: LitMesh,
    _sampler: Sampler,
    _texture: Texture,
}

pub struct Texturing {
    graph: RenderGraph,
    camera: Camera,
    light: ShadowLight,
    material: Option<Material>,
}

impl Texturing {
    pub fn new() -> Result<Self> {
        Ok(Self {
            graph: hello_cube::render_graph()?,
            camera: Camera::default(),
            light: ShadowLight::default(),
            material: None,
        })
    }

    fn build_material(backend: &VulkanBackend, slots: usize) -> Result<Material> {
        let device = backend.device();
        let texture = Texture::from_rgba8(
            device.clone(),
            backend.upload_pool(),
            "checker",
            vk::Extent2D {
                width: CHECKER_SIZE,
                height: CHECKER_SIZE,
            },
            &checker_pixels(CHECKER_SIZE, CHECKER_CELLS),
        )?;
        let sampler = Sampler::new(device.clone(), SamplerKind::LinearRepeat)?;
        debug!("Checker texture uploaded ({0}x{0})", CHECKER_SIZE);

        let stage = vk::ShaderStageFlags::FRAGMENT;
        let bindings = SceneBindings::new(
            device,
            slots,
            &[
                DescriptorBindingBuilder::sampled_image(1, stage),
                DescriptorBindingBuilder::sampler(2, stage),
            ],
            |writer| {
                writer
                    .sampled_image(1, texture.view())
                    .sampler(2, sampler.handle())
            },
        )?;
        let cube = LitMesh::new(
            "textured cube",
            SHADER,
            GpuMesh::upload(device, &Mesh::cube(1.0))?,
            bindings,
        );
        Ok(Material {
            cube,
            _sampler: sampler,
            _texture: texture,
        })
    }
}

impl HostedRenderer<VulkanBackend> for Texturing {
    fn render_graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn on_surface_ready(
        &mut self,
        backend: &VulkanBackend,
        surface: &SurfaceInfo,
        _targets: &PassTargets<'_, VulkanBackend>,
    ) -> Result<()> {
        let material = match self.material.take() {
            Some(material) if material.cube.slots() == surface.frames_in_flight => material,
            _ => Self::build_material(backend, surface.frames_in_flight)?,
        };
        self.material
            .insert(material)
            .cube
            .ensure_pipeline(surface.format)
    }

    fn on_frame(
        &mut self,
        frame: &FrameContext,
        _pass: &PassContext<'_>,
        recorder: &mut VulkanRecorder,
    ) -> Result<()> {
        let material = self
            .material
            .as_ref()
            .ok_or_else(|| Error::resource("textured cube drawn before the surface was ready"))?;
        let uniforms = SceneUniforms::new(tumble(frame.time), &self.camera, &self.light, frame.extent);
        material.cube.record(recorder.cmd(), frame.slot, &uniforms)
    }

    fn on_surface_teardown(&mut self, _backend: &VulkanBackend) {}

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }
}

fn create() -> Result<Box<dyn HostedRenderer<VulkanBackend>>> {
    Ok(Box::new(Texturing::new()?))
}

pub fn register(registry: &mut Registry<VulkanBackend>) {
    registry.register(NAME, create);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pixel(pixels: &[u8], size: u32, x: u32, y: u32) -> [u8; 4] {
        let at = ((y * size + x) * 4) as usize;
        [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
    }

    #[test]
    fn test_checker_is_tightly_packed() {
        let pixels = checker_pixels(CHECKER_SIZE, CHECKER_CELLS);
        assert_eq!(pixels.len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
        assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[rstest]
    #[case(0, 0, WHITE)]
    #[case(31, 31, WHITE)]
    #[case(32, 0, RED)]
    #[case(0, 32, RED)]
    #[case(32, 32, WHITE)]
    #[case(127, 64, RED)]
    fn test_checker_cells(#[case] x: u32, #[case] y: u32, #[case] expected: [u8; 4]) {
        let pixels = checker_pixels(CHECKER_SIZE, CHECKER_CELLS);
        assert_eq!(pixel(&pixels, CHECKER_SIZE, x, y), expected);
    }

    #[test]
    fn test_zero_cells_is_solid() {
        let pixels = checker_pixels(4, 0);
        assert!(pixels.chunks_exact(4).all(|p| p == WHITE));
    }
}
