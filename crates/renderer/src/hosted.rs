//! Interface implemented by the renderers the orchestrator hosts.

use ash::vk;
use vulkanisch_core::{Error, Result};
use vulkanisch_scene::Camera;

use crate::backend::GpuBackend;
use crate::graph::{Destination, PassDesc, PipelineId, RenderGraph, TargetId};

/// Surface parameters handed to [`HostedRenderer::on_surface_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub extent: vk::Extent2D,
    /// Format of the presentable images.
    pub format: vk::Format,
    /// Number of frame slots; per-frame uniform storage needs this many copies.
    pub frames_in_flight: usize,
    pub image_count: u32,
}

/// Per-frame values shared by every pass of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Seconds since the orchestrator started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    pub frame_number: u64,
    /// Frame slot being recorded, in `0..frames_in_flight`.
    pub slot: usize,
    pub image_index: u32,
    pub extent: vk::Extent2D,
}

/// The pass being recorded.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub index: usize,
    pub desc: &'a PassDesc,
}

impl PassContext<'_> {
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn pipeline(&self) -> PipelineId {
        self.desc.pipeline
    }

    pub fn destination(&self) -> Destination {
        self.desc.destination
    }

    pub fn is_presentable(&self) -> bool {
        self.desc.destination == Destination::Presentable
    }
}

/// Borrowed view of the offscreen targets realized for the current surface.
pub struct PassTargets<'a, B: GpuBackend> {
    targets: &'a [Option<B::Target>],
}

impl<'a, B: GpuBackend> PassTargets<'a, B> {
    pub(crate) fn new(targets: &'a [Option<B::Target>]) -> Self {
        Self { targets }
    }

    /// # Errors
    ///
    /// Returns [`Error::ResourceCreation`] if the target has not been realized.
    pub fn get(&self, id: TargetId) -> Result<&'a B::Target> {
        self.targets
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::resource(format!("render target {} is not realized", id.0)))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// A renderer variant hosted by the frame orchestrator.
///
/// The graph returned by [`render_graph`](Self::render_graph) is read once
/// when the orchestrator is created and never changes afterwards.
pub trait HostedRenderer<B: GpuBackend> {
    fn render_graph(&self) -> &RenderGraph;

    /// Build extent-dependent resources (descriptor sets over the target
    /// views, pipelines for the presentable format, per-slot uniforms).
    fn on_surface_ready(
        &mut self,
        backend: &B,
        surface: &SurfaceInfo,
        targets: &PassTargets<'_, B>,
    ) -> Result<()>;

    /// Record the content of one pass. Called once per pass, in graph order,
    /// between the pass begin and end.
    fn on_frame(
        &mut self,
        frame: &FrameContext,
        pass: &PassContext<'_>,
        recorder: &mut B::Recorder,
    ) -> Result<()>;

    /// Release what `on_surface_ready` built. The device is idle.
    fn on_surface_teardown(&mut self, backend: &B);

    fn set_camera(&mut self, _camera: &Camera) {}
}
