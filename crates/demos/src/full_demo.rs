//! Shadowed scene rendered to HDR and finished by the bloom chain.

use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::{BloomTargets, DEFAULT_BLUR_ITERATIONS, HDR_FORMAT};
use vulkanisch_renderer::{
    FrameContext, HostedRenderer, PassContext, PassTargets, RenderGraph, Registry, SurfaceInfo,
    TargetId, VulkanBackend, VulkanRecorder, canonical_graph,
};
use vulkanisch_scene::{Camera, ShadowLight};

use crate::bloom::HDR_INTENSITY;
use crate::post::PostProcess;
use crate::shadowed::ShadowedScene;
use crate::uniforms::{SceneUniforms, turntable};
use crate::{CANONICAL, COLOR, SHADOW};

pub const NAME: &str = "FullDemo";

struct FullDemoResources {
    scene: ShadowedScene,
    post: PostProcess,
}

pub struct FullDemo {
    graph: RenderGraph,
    shadow_map: TargetId,
    hdr: TargetId,
    bloom: BloomTargets,
    camera: Camera,
    light: ShadowLight,
    gpu: Option<FullDemoResources>,
}

impl FullDemo {
    pub fn new() -> Result<Self> {
        let graph = canonical_graph(CANONICAL, DEFAULT_BLUR_ITERATIONS)?;
        let find = |name: &str| {
            graph
                .find_target(name)
                .ok_or_else(|| Error::config(format!("canonical graph has no '{name}' target")))
        };
        let shadow_map = find("shadow")?;
        let hdr = find("hdr")?;
        let bloom = BloomTargets {
            bloom: [find("bloom0")?, find("bloom1")?],
        };
        Ok(Self {
            graph,
            shadow_map,
            hdr,
            bloom,
            camera: Camera::default(),
            light: ShadowLight::default(),
            gpu: None,
        })
    }
}

impl HostedRenderer<VulkanBackend> for FullDemo {
    fn render_graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn on_surface_ready(
        &mut self,
        backend: &VulkanBackend,
        surface: &SurfaceInfo,
        targets: &PassTargets<'_, VulkanBackend>,
    ) -> Result<()> {
        let gpu = match self.gpu.take() {
            Some(gpu) if gpu.scene.slots() == surface.frames_in_flight => gpu,
            _ => FullDemoResources {
                scene: ShadowedScene::new(backend.device(), surface.frames_in_flight)?,
                post: PostProcess::new(backend.device())?,
            },
        };
        let gpu = self.gpu.insert(gpu);
        gpu.scene.prepare(HDR_FORMAT, targets.get(self.shadow_map)?)?;
        gpu.post
            .bind_targets(surface.format, targets, self.hdr, self.bloom)
    }

    fn on_frame(
        &mut self,
        frame: &FrameContext,
        pass: &PassContext<'_>,
        recorder: &mut VulkanRecorder,
    ) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| Error::resource("full demo drawn before the surface was ready"))?;
        let cmd = recorder.cmd();
        let uniforms = || {
            SceneUniforms::new(turntable(frame.time), &self.camera, &self.light, frame.extent)
                .with_intensity(HDR_INTENSITY)
        };
        match pass.pipeline() {
            SHADOW => gpu.scene.record_shadow(cmd, frame.slot, &uniforms()),
            COLOR => gpu.scene.record_lit(cmd, frame.slot, &uniforms()),
            _ if gpu.post.record(pass, cmd)? => Ok(()),
            _ => Err(Error::config(format!("pass '{}' has no pipeline", pass.name()))),
        }
    }

    fn on_surface_teardown(&mut self, _backend: &VulkanBackend) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.scene.release();
            gpu.post.release();
        }
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }
}

fn create() -> Result<Box<dyn HostedRenderer<VulkanBackend>>> {
    Ok(Box::new(FullDemo::new()?))
}

pub fn register(registry: &mut Registry<VulkanBackend>) {
    registry.register(NAME, create);
}
