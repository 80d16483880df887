//! The primitives the frame orchestrator needs from a graphics backend.
//!
//! [`GpuBackend`] groups three families of operations:
//!
//! - Surface provider: capabilities, the presentable image chain, acquire and present
//! - Frame slots: a CPU-waitable completion signal plus the two cross-device
//!   signals and the command recorder of one in-flight frame
//! - Passes: offscreen targets, read-after-write transitions and pass begin/end
//!
//! Handles are associated types so the core never touches backend objects
//! directly; [`crate::vulkan::VulkanBackend`] is the production implementation.

use std::time::Duration;

use ash::vk;
use vulkanisch_core::Result;

use crate::graph::{ClearPolicy, TargetDesc};

/// What the surface reports it can do right now.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    pub min_images: u32,
    /// `None` when the surface imposes no upper bound.
    pub max_images: Option<u32>,
    /// `None` when the surface lets the swapchain pick (the window size is used).
    pub current_extent: Option<vk::Extent2D>,
    pub min_extent: vk::Extent2D,
    pub max_extent: vk::Extent2D,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Resolved parameters for a presentable image chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDesc {
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub present_mode: vk::PresentModeKHR,
}

/// Result of asking the chain for its next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired { index: u32, suboptimal: bool },
    /// The chain no longer matches the surface.
    Stale,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Present {
    Presented,
    /// Presented, but the chain should be rebuilt before the next frame.
    Suboptimal,
    /// Not presented; the chain must be rebuilt.
    Stale,
}

/// The image a pass renders into.
pub enum PassTarget<'a, B: GpuBackend + ?Sized> {
    Offscreen(&'a B::Target),
    Presentable(&'a B::ImageTarget),
}

/// Attachments for one pass.
pub struct PassAttachments<'a, B: GpuBackend + ?Sized> {
    pub destination: PassTarget<'a, B>,
    pub depth: Option<&'a B::Target>,
}

/// Graphics backend consumed by the orchestrator.
///
/// Errors follow the shared taxonomy: recoverable staleness is reported
/// through [`Acquire::Stale`] and [`Present::Stale`], never as an `Err`.
pub trait GpuBackend {
    /// One frame slot: completion fence, image-acquired and rendering-finished
    /// signals, and the command storage recorded for that slot.
    type Slot;
    /// The presentable image chain.
    type Chain;
    /// Per presentable image render target.
    type ImageTarget;
    /// Offscreen render target (image, view and sampler).
    type Target;
    /// An open command recording.
    type Recorder;

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;
    fn create_image_chain(&self, desc: &ChainDesc) -> Result<Self::Chain>;
    fn chain_image_count(&self, chain: &Self::Chain) -> u32;
    fn create_image_target(&self, chain: &Self::Chain, index: u32) -> Result<Self::ImageTarget>;
    fn destroy_image_target(&self, target: Self::ImageTarget);
    fn destroy_image_chain(&self, chain: Self::Chain);

    /// Acquire the next image, signaling the slot's image-acquired signal once
    /// it is writable.
    fn acquire_next_image(
        &self,
        chain: &Self::Chain,
        slot: &Self::Slot,
        timeout: Duration,
    ) -> Result<Acquire>;

    /// Queue `index` for presentation gated on the slot's rendering-finished signal.
    fn present_image(&self, chain: &Self::Chain, slot: &Self::Slot, index: u32)
    -> Result<Present>;

    /// Create a slot whose completion signal starts out satisfied.
    fn create_frame_slot(&self) -> Result<Self::Slot>;
    fn destroy_frame_slot(&self, slot: Self::Slot);

    /// Block until the slot's completion signal is satisfied.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first.
    fn wait_frame_slot(&self, slot: &Self::Slot, timeout: Duration) -> Result<bool>;

    /// Mark the slot's completion signal unsatisfied.
    fn reset_frame_slot(&self, slot: &Self::Slot) -> Result<()>;

    fn begin_recording(&self, slot: &Self::Slot) -> Result<Self::Recorder>;

    /// Transition the presentable image for presentation and close the recording.
    fn end_recording(&self, recorder: &mut Self::Recorder, image: &Self::ImageTarget)
    -> Result<()>;

    /// Submit: wait image-acquired, signal rendering-finished and the completion signal.
    fn submit(&self, slot: &Self::Slot, recorder: Self::Recorder) -> Result<()>;

    /// Drain every queue.
    fn wait_idle(&self) -> Result<()>;

    fn create_render_target(&self, desc: &TargetDesc, extent: vk::Extent2D)
    -> Result<Self::Target>;
    fn destroy_render_target(&self, target: Self::Target);
    fn target_extent(&self, target: &Self::Target) -> vk::Extent2D;

    /// Make earlier writes to `target` visible to sampling in later passes.
    fn bind_input(&self, recorder: &mut Self::Recorder, target: &Self::Target) -> Result<()>;

    fn begin_pass(
        &self,
        recorder: &mut Self::Recorder,
        attachments: &PassAttachments<'_, Self>,
        clear: &ClearPolicy,
    ) -> Result<()>;

    fn end_pass(&self, recorder: &mut Self::Recorder) -> Result<()>;
}
