//! Spinning lit cube rendered straight to the presentable image.

use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::DEPTH_FORMAT;
use vulkanisch_renderer::{
    ClearPolicy, Destination, FrameContext, HostedRenderer, PassContext, PassDesc, PassTargets,
    RenderGraph, RenderGraphBuilder, Registry, SurfaceInfo, TargetDesc, TargetSize,
    VulkanBackend, VulkanRecorder,
};
use vulkanisch_scene::{Camera, ShadowLight};

use crate::gpu::{GpuMesh, SceneBindings};
use crate::lit::LitMesh;
use crate::mesh::Mesh;
use crate::uniforms::{SceneUniforms, tumble};
use crate::COLOR;

pub const NAME: &str = "HelloCube";

pub const SHADER: &str = concat!(
    include_str!("../shaders/scene.wgsl"),
    include_str!("../shaders/cube.wgsl")
);

pub(crate) const BACKGROUND: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// One pass: the cube with a surface-sized depth target.
pub fn render_graph() -> Result<RenderGraph> {
    let mut builder = RenderGraphBuilder::new();
    let depth = builder.add_target(TargetDesc::new("depth", DEPTH_FORMAT, TargetSize::Surface));
    builder.add_pass(
        PassDesc::new("cube", COLOR, Destination::Presentable)
            .with_depth(depth)
            .with_clear(ClearPolicy::Color(BACKGROUND)),
    )?;
    builder.build()
}

pub struct HelloCube {
    graph: RenderGraph,
    camera: Camera,
    light: ShadowLight,
    cube: Option<LitMesh>,
}

impl HelloCube {
    pub fn new() -> Result<Self> {
        Ok(Self {
            graph: render_graph()?,
            camera: Camera::default(),
            light: ShadowLight::default(),
            cube: None,
        })
    }
}

impl HostedRenderer<VulkanBackend> for HelloCube {
    fn render_graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn on_surface_ready(
        &mut self,
        backend: &VulkanBackend,
        surface: &SurfaceInfo,
        _targets: &PassTargets<'_, VulkanBackend>,
    ) -> Result<()> {
        let cube = match self.cube.take() {
            Some(cube) if cube.slots() == surface.frames_in_flight => cube,
            _ => {
                let device = backend.device();
                LitMesh::new(
                    "cube",
                    SHADER,
                    GpuMesh::upload(device, &Mesh::cube(1.0))?,
                    SceneBindings::new(device, surface.frames_in_flight, &[], |writer| writer)?,
                )
            }
        };
        let cube = self.cube.insert(cube);
        cube.ensure_pipeline(surface.format)
    }

    fn on_frame(
        &mut self,
        frame: &FrameContext,
        _pass: &PassContext<'_>,
        recorder: &mut VulkanRecorder,
    ) -> Result<()> {
        let cube = self
            .cube
            .as_ref()
            .ok_or_else(|| Error::resource("cube drawn before the surface was ready"))?;
        let uniforms = SceneUniforms::new(tumble(frame.time), &self.camera, &self.light, frame.extent);
        cube.record(recorder.cmd(), frame.slot, &uniforms)
    }

    fn on_surface_teardown(&mut self, _backend: &VulkanBackend) {}

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }
}

fn create() -> Result<Box<dyn HostedRenderer<VulkanBackend>>> {
    Ok(Box::new(HelloCube::new()?))
}

pub fn register(registry: &mut Registry<VulkanBackend>) {
    registry.register(NAME, create);
}
