//! Surface lifecycle: the presentable image chain and everything sized by it.
//!
//! ```text
//! Uninitialized --initialize--> Ready --stale / resize--> Recreating --> Ready
//!       ^   |                     |
//!       +---+ (zero extent)       +--destroy--> Destroyed
//! ```
//!
//! The manager exclusively owns the image chain, the per-image render
//! targets, the offscreen targets of the render graph and the frame slot
//! ring. Recreation drains the device first, then tears down in order:
//! hosted renderer surface resources, extent-dependent offscreen targets,
//! per-image targets, the chain, the slot ring. Fixed-size targets survive
//! recreation and are released only on [`SurfaceManager::destroy`].

use ash::vk;
use tracing::{debug, info, warn};
use vulkanisch_core::{Error, Result};

use crate::backend::{Acquire, ChainDesc, GpuBackend, Present, SurfaceCapabilities};
use crate::config::FrameConfig;
use crate::executor::GraphExecutor;
use crate::frame_sync::FrameSynchronizer;
use crate::graph::{GraphTopology, RenderGraph, TargetId};
use crate::hosted::{FrameContext, HostedRenderer, PassTargets, SurfaceInfo};

/// Lifecycle state of the presentable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Ready,
    Recreating,
    Destroyed,
}

/// Outcome of an initialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The surface currently has a zero extent (e.g. minimized); try again later.
    Deferred,
}

/// Why a frame was dropped before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Acquisition reported the chain out of date.
    StaleAcquire,
    /// A resize arrived after recording started.
    Resized,
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image: u32, slot: usize },
    /// Recorded (or not) but never submitted nor presented.
    Abandoned(AbandonReason),
    /// Submitted, but presentation reported the chain out of date.
    PresentStale,
    /// No usable surface extent; nothing was recorded.
    Skipped,
}

/// Timing values for one frame, supplied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    pub time: f32,
    pub delta: f32,
    pub frame_number: u64,
}

/// Owner of the presentable chain and all surface-sized resources.
pub struct SurfaceManager<B: GpuBackend> {
    config: FrameConfig,
    state: SurfaceState,
    /// Last known window size, used when the surface leaves the extent to us.
    window_extent: vk::Extent2D,
    extent: vk::Extent2D,
    format: vk::SurfaceFormatKHR,
    chain: Option<B::Chain>,
    image_targets: Vec<B::ImageTarget>,
    targets: Vec<Option<B::Target>>,
    sync: Option<FrameSynchronizer<B>>,
    renderer_bound: bool,
    needs_recreate: bool,
    recreations: u64,
}

impl<B: GpuBackend> SurfaceManager<B> {
    pub fn new(config: FrameConfig, window_extent: vk::Extent2D) -> Self {
        Self {
            format: config.preferred_format,
            config,
            state: SurfaceState::Uninitialized,
            window_extent,
            extent: vk::Extent2D::default(),
            chain: None,
            image_targets: Vec::new(),
            targets: Vec::new(),
            sync: None,
            renderer_bound: false,
            needs_recreate: false,
            recreations: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    /// Number of presentable images in the current chain.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.image_targets.len() as u32
    }

    /// How many times the chain has been torn down and rebuilt.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn synchronizer(&self) -> Option<&FrameSynchronizer<B>> {
        self.sync.as_ref()
    }

    /// Destinations, inputs and realized target extents of `graph`.
    pub fn topology(&self, backend: &B, graph: &RenderGraph) -> GraphTopology {
        let extents = self
            .targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TargetId(i), backend.target_extent(t))))
            .collect();
        GraphTopology::new(graph, extents)
    }

    /// `Uninitialized -> Ready`.
    ///
    /// Builds, in order: the image chain, one render target per image, the
    /// graph's offscreen targets, the slot ring; then hands the surface to the
    /// hosted renderer. A zero extent leaves the manager `Uninitialized` and
    /// returns [`Readiness::Deferred`].
    pub fn initialize(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        renderer: &mut dyn HostedRenderer<B>,
    ) -> Result<Readiness> {
        match self.state {
            SurfaceState::Ready => return Ok(Readiness::Ready),
            SurfaceState::Destroyed => {
                return Err(Error::config("surface has already been destroyed"));
            }
            SurfaceState::Uninitialized | SurfaceState::Recreating => {}
        }

        let caps = backend.surface_capabilities()?;
        let extent = choose_extent(&caps, self.window_extent);
        if extent.width == 0 || extent.height == 0 {
            debug!("Surface extent is zero, deferring initialization");
            self.state = SurfaceState::Uninitialized;
            return Ok(Readiness::Deferred);
        }

        let format = choose_surface_format(&caps.formats, self.config.preferred_format)?;
        let present_mode =
            choose_present_mode(&caps.present_modes, self.config.preferred_present_mode);
        let image_count = choose_image_count(&caps);

        let chain = backend.create_image_chain(&ChainDesc {
            format,
            extent,
            image_count,
            present_mode,
        })?;
        let chain = self.chain.insert(chain);
        let actual_count = backend.chain_image_count(chain);
        for index in 0..actual_count {
            let target = backend.create_image_target(chain, index)?;
            self.image_targets.push(target);
        }

        self.realize_targets(backend, graph, extent)?;
        self.sync = Some(FrameSynchronizer::new(backend, &self.config, actual_count)?);
        self.extent = extent;
        self.format = format;

        let info = SurfaceInfo {
            extent,
            format: format.format,
            frames_in_flight: self.config.frames_in_flight,
            image_count: actual_count,
        };
        renderer.on_surface_ready(backend, &info, &PassTargets::new(&self.targets))?;
        self.renderer_bound = true;
        self.needs_recreate = false;
        self.state = SurfaceState::Ready;

        info!(
            "Surface ready: {}x{}, {:?}, {:?}, {} images",
            extent.width, extent.height, format.format, present_mode, actual_count
        );
        Ok(Readiness::Ready)
    }

    fn realize_targets(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        extent: vk::Extent2D,
    ) -> Result<()> {
        self.targets.resize_with(graph.targets().len(), || None);
        for (slot, desc) in self.targets.iter_mut().zip(graph.targets()) {
            if slot.is_none() {
                let size = desc.size.resolve(extent);
                *slot = Some(backend.create_render_target(desc, size)?);
                debug!(
                    "Created render target '{}' {}x{}",
                    desc.name, size.width, size.height
                );
            }
        }
        Ok(())
    }

    fn teardown(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        renderer: &mut dyn HostedRenderer<B>,
        keep_fixed: bool,
    ) {
        if self.renderer_bound {
            renderer.on_surface_teardown(backend);
            self.renderer_bound = false;
        }
        for (slot, desc) in self.targets.iter_mut().zip(graph.targets()) {
            if (desc.size.depends_on_extent() || !keep_fixed)
                && let Some(target) = slot.take()
            {
                backend.destroy_render_target(target);
            }
        }
        for target in self.image_targets.drain(..) {
            backend.destroy_image_target(target);
        }
        if let Some(chain) = self.chain.take() {
            backend.destroy_image_chain(chain);
        }
        if let Some(sync) = self.sync.take() {
            sync.destroy(backend);
        }
    }

    /// `Ready -> Recreating -> Ready`, draining the device first.
    ///
    /// May return [`Readiness::Deferred`] while the extent is zero; calling
    /// it again in a loop is allowed.
    pub fn recreate(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        renderer: &mut dyn HostedRenderer<B>,
    ) -> Result<Readiness> {
        if self.state == SurfaceState::Destroyed {
            return Err(Error::config("cannot recreate a destroyed surface"));
        }
        info!("Recreating surface");
        self.state = SurfaceState::Recreating;
        self.needs_recreate = false;

        backend.wait_idle()?;
        self.teardown(backend, graph, renderer, true);
        self.state = SurfaceState::Uninitialized;
        self.recreations += 1;

        self.initialize(backend, graph, renderer)
    }

    /// `* -> Destroyed`. Every resource, fixed-size targets included, is released.
    pub fn destroy(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        renderer: &mut dyn HostedRenderer<B>,
    ) -> Result<()> {
        if self.state == SurfaceState::Destroyed {
            return Ok(());
        }
        let idle = backend.wait_idle();
        if let Err(ref e) = idle {
            warn!("Device did not go idle before teardown: {}", e);
        }
        self.teardown(backend, graph, renderer, false);
        self.targets.clear();
        self.state = SurfaceState::Destroyed;
        info!("Surface destroyed");
        idle
    }

    /// Run one frame: admit, acquire, record, submit, present.
    ///
    /// `poll_resize` is consulted before the frame starts and again after
    /// recording; a resize seen the second time abandons the frame.
    pub fn run_frame(
        &mut self,
        backend: &B,
        graph: &RenderGraph,
        renderer: &mut dyn HostedRenderer<B>,
        clock: FrameClock,
        poll_resize: &mut dyn FnMut() -> Option<vk::Extent2D>,
    ) -> Result<FrameOutcome> {
        if let Some(extent) = poll_resize() {
            self.window_extent = extent;
            self.needs_recreate = true;
        }
        if self.needs_recreate
            && self.state == SurfaceState::Ready
            && self.recreate(backend, graph, renderer)? == Readiness::Deferred
        {
            return Ok(FrameOutcome::Skipped);
        }
        if self.state != SurfaceState::Ready
            && self.initialize(backend, graph, renderer)? == Readiness::Deferred
        {
            return Ok(FrameOutcome::Skipped);
        }

        let (Some(sync), Some(chain)) = (self.sync.as_mut(), self.chain.as_ref()) else {
            return Err(Error::resource("ready surface has no image chain"));
        };

        let slot = sync.begin_frame(backend)?;
        let image = match sync.acquire_image(backend, chain)? {
            Acquire::Acquired { index, .. } => index,
            Acquire::Stale => {
                debug!("Image chain stale on acquire, abandoning frame");
                self.recreate(backend, graph, renderer)?;
                return Ok(FrameOutcome::Abandoned(AbandonReason::StaleAcquire));
            }
        };

        let image_target = self
            .image_targets
            .get(image as usize)
            .ok_or_else(|| Error::resource(format!("no render target for image {image}")))?;
        let frame = FrameContext {
            time: clock.time,
            delta: clock.delta,
            frame_number: clock.frame_number,
            slot,
            image_index: image,
            extent: self.extent,
        };

        let mut recorder = backend.begin_recording(sync.current_slot())?;
        let targets = PassTargets::new(&self.targets);
        GraphExecutor::new(graph).record(
            backend,
            &targets,
            image_target,
            renderer,
            &frame,
            &mut recorder,
        )?;
        backend.end_recording(&mut recorder, image_target)?;

        if let Some(extent) = poll_resize() {
            info!(
                "Resize to {}x{} during frame {}, abandoning it",
                extent.width, extent.height, clock.frame_number
            );
            drop(recorder);
            self.window_extent = extent;
            self.recreate(backend, graph, renderer)?;
            return Ok(FrameOutcome::Abandoned(AbandonReason::Resized));
        }

        sync.submit(backend, recorder)?;
        let presented = sync.present(backend, chain, image)?;
        sync.advance();

        match presented {
            Present::Presented => Ok(FrameOutcome::Presented { image, slot }),
            Present::Suboptimal => {
                debug!("Presentation suboptimal, recreating before next frame");
                self.needs_recreate = true;
                Ok(FrameOutcome::Presented { image, slot })
            }
            Present::Stale => {
                debug!("Image chain stale on present");
                self.needs_recreate = true;
                Ok(FrameOutcome::PresentStale)
            }
        }
    }
}

/// Prefer the configured format, then B8G8R8A8_UNORM/SRGB_NONLINEAR, then
/// whatever comes first.
///
/// # Errors
///
/// [`Error::Configuration`] when the surface reports no formats at all.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Result<vk::SurfaceFormatKHR> {
    if let Some(&format) = formats.iter().find(|&&f| f == preferred) {
        debug!("Selected preferred surface format: {:?}", format.format);
        return Ok(format);
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = alternative {
        warn!("Using fallback surface format: B8G8R8A8_UNORM with SRGB_NONLINEAR");
        return Ok(format);
    }

    match formats.first() {
        Some(&format) => {
            warn!("Using first available surface format: {:?}", format.format);
            Ok(format)
        }
        None => Err(Error::config("surface reports no supported formats")),
    }
}

/// The preferred mode if supported, FIFO otherwise (always available).
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        preferred
    } else {
        debug!("{:?} unsupported, falling back to FIFO", preferred);
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the window size clamped to the surface limits.
pub fn choose_extent(caps: &SurfaceCapabilities, window: vk::Extent2D) -> vk::Extent2D {
    if let Some(current) = caps.current_extent {
        return current;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_extent.width, caps.max_extent.width),
        height: window
            .height
            .clamp(caps.min_extent.height, caps.max_extent.height),
    }
}

/// One more than the minimum, capped by the maximum when there is one.
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let preferred = caps.min_images + 1;
    match caps.max_images {
        Some(max) => preferred.min(max).max(caps.min_images),
        None => preferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn caps(min: u32, max: Option<u32>) -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_images: min,
            max_images: max,
            current_extent: None,
            min_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            formats: vec![srgb(vk::Format::B8G8R8A8_SRGB)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_configured() {
        let formats = [
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_SRGB),
            srgb(vk::Format::B8G8R8A8_UNORM),
        ];
        let selected = choose_surface_format(&formats, srgb(vk::Format::B8G8R8A8_SRGB)).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_fallbacks() {
        let preferred = srgb(vk::Format::B8G8R8A8_SRGB);
        let formats = [
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats, preferred).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );
        assert_eq!(
            choose_surface_format(&formats[..1], preferred)
                .unwrap()
                .format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_no_formats_is_configuration_failure() {
        let err = choose_surface_format(&[], srgb(vk::Format::B8G8R8A8_SRGB)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[rstest]
    #[case(vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::MAILBOX)]
    #[case(vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO)]
    #[case(vk::PresentModeKHR::FIFO, vk::PresentModeKHR::FIFO)]
    fn test_choose_present_mode(
        #[case] preferred: vk::PresentModeKHR,
        #[case] expected: vk::PresentModeKHR,
    ) {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, preferred), expected);
    }

    #[rstest]
    #[case(3000, 3000, 2000, 2000)]
    #[case(50, 50, 100, 100)]
    #[case(800, 600, 800, 600)]
    fn test_choose_extent_clamps_window(
        #[case] w: u32,
        #[case] h: u32,
        #[case] ew: u32,
        #[case] eh: u32,
    ) {
        let extent = choose_extent(&caps(2, None), vk::Extent2D { width: w, height: h });
        assert_eq!((extent.width, extent.height), (ew, eh));
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let mut caps = caps(2, None);
        caps.current_extent = Some(vk::Extent2D {
            width: 1920,
            height: 1080,
        });
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[rstest]
    #[case(2, Some(3), 3)]
    #[case(2, Some(8), 3)]
    #[case(2, None, 3)]
    #[case(3, Some(3), 3)]
    fn test_choose_image_count(#[case] min: u32, #[case] max: Option<u32>, #[case] expected: u32) {
        assert_eq!(choose_image_count(&caps(min, max)), expected);
    }
}
