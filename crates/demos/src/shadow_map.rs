//! Cube casting a shadow on a floor: depth from the light, then the lit scene.

use ash::vk;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::{DEPTH_FORMAT, SHADOW_MAP_SIZE};
use vulkanisch_renderer::{
    ClearPolicy, Destination, FrameContext, HostedRenderer, PassContext, PassDesc, PassTargets,
    RenderGraph, RenderGraphBuilder, Registry, SurfaceInfo, TargetDesc, TargetId, TargetSize,
    VulkanBackend, VulkanRecorder,
};
use vulkanisch_scene::{Camera, ShadowLight};

use crate::hello_cube::BACKGROUND;
use crate::shadowed::ShadowedScene;
use crate::uniforms::{SceneUniforms, turntable};
use crate::{COLOR, SHADOW};

pub const NAME: &str = "ShadowMap";

/// Shadow pass into a fixed 2048² depth map, then the shaded scene sampling it.
pub fn render_graph() -> Result<RenderGraph> {
    let mut builder = RenderGraphBuilder::new();
    let shadow = builder.add_target(TargetDesc::new(
        "shadow",
        DEPTH_FORMAT,
        TargetSize::Fixed(vk::Extent2D {
            width: SHADOW_MAP_SIZE,
            height: SHADOW_MAP_SIZE,
        }),
    ));
    let depth = builder.add_target(TargetDesc::new("depth", DEPTH_FORMAT, TargetSize::Surface));
    builder.add_pass(
        PassDesc::new("shadow", SHADOW, Destination::Target(shadow))
            .with_clear(ClearPolicy::Depth(1.0)),
    )?;
    builder.add_pass(
        PassDesc::new("scene", COLOR, Destination::Presentable)
            .with_depth(depth)
            .with_input(shadow)
            .with_clear(ClearPolicy::Color(BACKGROUND)),
    )?;
    builder.build()
}

pub struct ShadowMap {
    graph: RenderGraph,
    shadow_map: TargetId,
    camera: Camera,
    light: ShadowLight,
    scene: Option<ShadowedScene>,
}

impl ShadowMap {
    pub fn new() -> Result<Self> {
        let graph = render_graph()?;
        let shadow_map = graph
            .find_target("shadow")
            .ok_or_else(|| Error::config("shadow map graph has no shadow target"))?;
        Ok(Self {
            graph,
            shadow_map,
            camera: Camera::default(),
            light: ShadowLight::default(),
            scene: None,
        })
    }
}

impl HostedRenderer<VulkanBackend> for ShadowMap {
    fn render_graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn on_surface_ready(
        &mut self,
        backend: &VulkanBackend,
        surface: &SurfaceInfo,
        targets: &PassTargets<'_, VulkanBackend>,
    ) -> Result<()> {
        let scene = match self.scene.take() {
            Some(scene) if scene.slots() == surface.frames_in_flight => scene,
            _ => ShadowedScene::new(backend.device(), surface.frames_in_flight)?,
        };
        self.scene
            .insert(scene)
            .prepare(surface.format, targets.get(self.shadow_map)?)
    }

    fn on_frame(
        &mut self,
        frame: &FrameContext,
        pass: &PassContext<'_>,
        recorder: &mut VulkanRecorder,
    ) -> Result<()> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| Error::resource("shadowed scene drawn before the surface was ready"))?;
        let uniforms =
            SceneUniforms::new(turntable(frame.time), &self.camera, &self.light, frame.extent);
        match pass.pipeline() {
            SHADOW => scene.record_shadow(recorder.cmd(), frame.slot, &uniforms),
            _ => scene.record_lit(recorder.cmd(), frame.slot, &uniforms),
        }
    }

    fn on_surface_teardown(&mut self, _backend: &VulkanBackend) {
        if let Some(scene) = self.scene.as_mut() {
            scene.release();
        }
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }
}

fn create() -> Result<Box<dyn HostedRenderer<VulkanBackend>>> {
    Ok(Box::new(ShadowMap::new()?))
}

pub fn register(registry: &mut Registry<VulkanBackend>) {
    registry.register(NAME, create);
}
