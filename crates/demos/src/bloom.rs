//! Over-bright cube rendered to HDR, then thresholded, blurred and tonemapped.

use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::{BloomTargets, DEPTH_FORMAT, HDR_FORMAT};
use vulkanisch_renderer::{
    BloomChain, ClearPolicy, Destination, FrameContext, HostedRenderer, PassContext, PassDesc,
    PassTargets, RenderGraph, RenderGraphBuilder, Registry, SurfaceInfo, TargetDesc, TargetId,
    TargetSize, VulkanBackend, VulkanRecorder,
};
use vulkanisch_scene::{Camera, ShadowLight};

use crate::gpu::{GpuMesh, SceneBindings};
use crate::lit::LitMesh;
use crate::mesh::Mesh;
use crate::post::PostProcess;
use crate::uniforms::{SceneUniforms, tumble};
use crate::{BLOOM, COLOR};

pub const NAME: &str = "Bloom";

pub const SHADER: &str = concat!(
    include_str!("../shaders/scene.wgsl"),
    include_str!("../shaders/cube.wgsl")
);

/// Light intensity for the HDR passes; pushes lit faces over the threshold.
pub(crate) const HDR_INTENSITY: f32 = 3.0;

/// Cube into `hdr`, followed by the bloom chain.
pub fn render_graph() -> Result<(RenderGraph, TargetId, BloomTargets)> {
    let mut builder = RenderGraphBuilder::new();
    let hdr = builder.add_target(TargetDesc::new("hdr", HDR_FORMAT, TargetSize::Surface));
    let depth = builder.add_target(TargetDesc::new("depth", DEPTH_FORMAT, TargetSize::Surface));
    builder.add_pass(
        PassDesc::new("color", COLOR, Destination::Target(hdr))
            .with_depth(depth)
            .with_clear(ClearPolicy::Color([0.0, 0.0, 0.0, 1.0])),
    )?;
    let bloom = BloomChain::new(BLOOM).append(&mut builder, hdr)?;
    Ok((builder.build()?, hdr, bloom))
}

struct BloomResources {
    cube: LitMesh,
    post: PostProcess,
}

pub struct Bloom {
    graph: RenderGraph,
    hdr: TargetId,
    bloom: BloomTargets,
    camera: Camera,
    light: ShadowLight,
    gpu: Option<BloomResources>,
}

impl Bloom {
    pub fn new() -> Result<Self> {
        let (graph, hdr, bloom) = render_graph()?;
        Ok(Self {
            graph,
            hdr,
            bloom,
            camera: Camera::default(),
            light: ShadowLight::default(),
            gpu: None,
        })
    }
}

impl HostedRenderer<VulkanBackend> for Bloom {
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
            Some(gpu) if gpu.cube.slots() == surface.frames_in_flight => gpu,
            _ => {
                let device = backend.device();
                let mut cube = LitMesh::new(
                    "hdr cube",
                    SHADER,
                    GpuMesh::upload(device, &Mesh::cube(1.0))?,
                    SceneBindings::new(device, surface.frames_in_flight, &[], |writer| writer)?,
                );
                cube.ensure_pipeline(HDR_FORMAT)?;
                BloomResources {
                    cube,
                    post: PostProcess::new(device)?,
                }
            }
        };
        self.gpu
            .insert(gpu)
            .post
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
            .ok_or_else(|| Error::resource("bloom drawn before the surface was ready"))?;
        if pass.pipeline() == COLOR {
            let uniforms =
                SceneUniforms::new(tumble(frame.time), &self.camera, &self.light, frame.extent)
                    .with_intensity(HDR_INTENSITY);
            return gpu.cube.record(recorder.cmd(), frame.slot, &uniforms);
        }
        if gpu.post.record(pass, recorder.cmd())? {
            Ok(())
        } else {
            Err(Error::config(format!("pass '{}' has no pipeline", pass.name())))
        }
    }

    fn on_surface_teardown(&mut self, _backend: &VulkanBackend) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.post.release();
        }
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }
}

fn create() -> Result<Box<dyn HostedRenderer<VulkanBackend>>> {
    Ok(Box::new(Bloom::new()?))
}

pub fn register(registry: &mut Registry<VulkanBackend>) {
    registry.register(NAME, create);
}
