//! Records one frame's passes in declaration order.

use tracing::trace;
use vulkanisch_core::Result;

use crate::backend::{GpuBackend, PassAttachments, PassTarget};
use crate::graph::{Destination, RenderGraph};
use crate::hosted::{FrameContext, HostedRenderer, PassContext, PassTargets};

/// Walks a [`RenderGraph`] into a single recording.
///
/// Per pass: inputs are transitioned for sampling, the pass begins on its
/// destination with its clear policy, the hosted renderer records its draws,
/// and the pass ends. Input transitions happen before the pass begins because
/// barriers cannot be recorded inside an active rendering scope.
pub struct GraphExecutor<'g> {
    graph: &'g RenderGraph,
}

impl<'g> GraphExecutor<'g> {
    pub fn new(graph: &'g RenderGraph) -> Self {
        Self { graph }
    }

    /// Record every pass for the current frame.
    ///
    /// # Errors
    ///
    /// Any failing bind, begin, end or hosted callback aborts the recording;
    /// the caller must not submit it.
    pub fn record<B: GpuBackend>(
        &self,
        backend: &B,
        targets: &PassTargets<'_, B>,
        presentable: &B::ImageTarget,
        renderer: &mut dyn HostedRenderer<B>,
        frame: &FrameContext,
        recorder: &mut B::Recorder,
    ) -> Result<()> {
        for (index, desc) in self.graph.passes().iter().enumerate() {
            debug_assert!(
                !matches!(desc.destination, Destination::Target(id) if desc.inputs.contains(&id)),
                "pass '{}' reads its own destination",
                desc.name
            );
            trace!("Recording pass {} '{}'", index, desc.name);

            for &input in &desc.inputs {
                backend.bind_input(recorder, targets.get(input)?)?;
            }

            let destination = match desc.destination {
                Destination::Target(id) => PassTarget::Offscreen(targets.get(id)?),
                Destination::Presentable => PassTarget::Presentable(presentable),
            };
            let depth = desc.depth.map(|id| targets.get(id)).transpose()?;
            let attachments = PassAttachments { destination, depth };

            backend.begin_pass(recorder, &attachments, &desc.clear)?;
            renderer.on_frame(frame, &PassContext { index, desc }, recorder)?;
            backend.end_pass(recorder)?;
        }
        Ok(())
    }
}
