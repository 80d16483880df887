//! Frame orchestrator: the single-threaded driver of the frame loop.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use vulkanisch_renderer::{FrameConfig, FrameOrchestrator, FrameOutcome, GpuBackend, HostedRenderer};
//!
//! # fn example<B: GpuBackend>(backend: B, renderer: Box<dyn HostedRenderer<B>>) -> vulkanisch_core::Result<()> {
//! let extent = vk::Extent2D { width: 800, height: 600 };
//! let mut orchestrator = FrameOrchestrator::new(backend, renderer, FrameConfig::default(), extent)?;
//! let resize = orchestrator.resize_signal();
//!
//! // From the windowing code:
//! resize.notify(vk::Extent2D { width: 1024, height: 768 });
//!
//! // From the render loop:
//! match orchestrator.render_frame()? {
//!     FrameOutcome::Presented { image, .. } => tracing::trace!("presented {image}"),
//!     other => tracing::debug!("frame not presented: {other:?}"),
//! }
//! orchestrator.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use ash::vk;
use tracing::{error, info};
use vulkanisch_core::{Result, Timer};
use vulkanisch_scene::Camera;

use crate::backend::GpuBackend;
use crate::config::FrameConfig;
use crate::graph::{GraphTopology, RenderGraph};
use crate::hosted::HostedRenderer;
use crate::surface::{FrameClock, FrameOutcome, SurfaceManager, SurfaceState};

/// Latest pending window size, shared between the event loop and the frame loop.
#[derive(Debug, Clone, Default)]
pub struct ResizeSignal {
    pending: Arc<Mutex<Option<vk::Extent2D>>>,
}

impl ResizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new window size; only the most recent one is kept.
    pub fn notify(&self, extent: vk::Extent2D) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(extent);
    }

    pub fn take(&self) -> Option<vk::Extent2D> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Owns the backend, the hosted renderer and the surface lifecycle.
pub struct FrameOrchestrator<B: GpuBackend> {
    // Field order is drop order: surface handles, then renderer resources,
    // then the backend they were created from.
    surface: SurfaceManager<B>,
    graph: RenderGraph,
    renderer: Box<dyn HostedRenderer<B>>,
    backend: B,
    resize: ResizeSignal,
    timer: Timer,
    frame_number: u64,
    presented: u64,
}

impl<B: GpuBackend> FrameOrchestrator<B> {
    /// Validate `config` and bring the surface up.
    ///
    /// A zero `window_extent` is accepted; initialization is retried on
    /// every frame until the window has a size.
    ///
    /// # Errors
    ///
    /// Invalid configuration or any fatal failure while creating the first
    /// image chain.
    pub fn new(
        backend: B,
        mut renderer: Box<dyn HostedRenderer<B>>,
        config: FrameConfig,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        config.validate()?;
        let graph = renderer.render_graph().clone();
        let mut surface = SurfaceManager::new(config, window_extent);
        surface.initialize(&backend, &graph, renderer.as_mut())?;

        info!(
            "Frame orchestrator ready with {} passes over {} targets",
            graph.passes().len(),
            graph.targets().len()
        );

        Ok(Self {
            surface,
            graph,
            renderer,
            backend,
            resize: ResizeSignal::new(),
            timer: Timer::new(),
            frame_number: 0,
            presented: 0,
        })
    }

    /// Handle for delivering resize notifications, possibly from another thread.
    pub fn resize_signal(&self) -> ResizeSignal {
        self.resize.clone()
    }

    pub fn notify_resize(&self, extent: vk::Extent2D) {
        self.resize.notify(extent);
    }

    pub fn set_camera(&mut self, camera: &Camera) {
        self.renderer.set_camera(camera);
    }

    /// Produce one frame.
    ///
    /// Staleness and resizes are absorbed here and reported only through the
    /// returned [`FrameOutcome`]; every `Err` is fatal.
    pub fn render_frame(&mut self) -> Result<FrameOutcome> {
        let delta = self.timer.tick();
        let clock = FrameClock {
            time: self.timer.elapsed_secs(),
            delta: delta.as_secs_f32(),
            frame_number: self.frame_number,
        };
        let resize = &self.resize;
        let mut poll_resize = || resize.take();

        let outcome = self.surface.run_frame(
            &self.backend,
            &self.graph,
            self.renderer.as_mut(),
            clock,
            &mut poll_resize,
        )?;

        self.frame_number += 1;
        if let FrameOutcome::Presented { .. } = outcome {
            self.presented += 1;
        }
        Ok(outcome)
    }

    /// Tear everything down. Further frames are rejected.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.surface.state() == SurfaceState::Destroyed {
            return Ok(());
        }
        info!(
            "Shutting down after {} presented frames ({:.1} fps average)",
            self.presented,
            self.timer.average_fps()
        );
        self.surface
            .destroy(&self.backend, &self.graph, self.renderer.as_mut())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn surface(&self) -> &SurfaceManager<B> {
        &self.surface
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn topology(&self) -> GraphTopology {
        self.surface.topology(&self.backend, &self.graph)
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn average_fps(&self) -> f64 {
        self.timer.average_fps()
    }
}

impl<B: GpuBackend> Drop for FrameOrchestrator<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Surface teardown failed: {}", e);
        }
    }
}
