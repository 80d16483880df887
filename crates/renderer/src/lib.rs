//! Frame orchestration for Vulkan renderers.
//!
//! This crate drives the per-frame loop:
//! - Frame slot ring and in-flight tracking ([`FrameSynchronizer`])
//! - Presentable surface lifecycle and recreation ([`SurfaceManager`])
//! - Static multi-pass render graphs ([`graph`]) and their recording
//! - Hosting of interchangeable renderers ([`HostedRenderer`], [`Registry`])
//!
//! Everything above [`GpuBackend`] is independent of Vulkan objects, so the
//! whole loop can be driven by a scripted backend in tests. [`VulkanBackend`]
//! is the production implementation.

pub mod backend;
pub mod bloom;
pub mod config;
pub mod executor;
pub mod frame_sync;
pub mod graph;
pub mod hosted;
pub mod orchestrator;
pub mod registry;
pub mod surface;
pub mod vulkan;

pub use backend::{
    Acquire, ChainDesc, GpuBackend, PassAttachments, PassTarget, Present, SurfaceCapabilities,
};
pub use bloom::{BloomChain, BloomPipelines, CanonicalPipelines, canonical_graph};
pub use config::FrameConfig;
pub use executor::GraphExecutor;
pub use frame_sync::FrameSynchronizer;
pub use graph::{
    ClearPolicy, Destination, GraphTopology, PassDesc, PipelineId, RenderGraph,
    RenderGraphBuilder, TargetDesc, TargetId, TargetSize,
};
pub use hosted::{FrameContext, HostedRenderer, PassContext, PassTargets, SurfaceInfo};
pub use orchestrator::{FrameOrchestrator, ResizeSignal};
pub use registry::{Registry, RendererFactory};
pub use surface::{AbandonReason, FrameOutcome, Readiness, SurfaceManager, SurfaceState};
pub use vulkan::{FrameSlot, PresentTarget, RenderTarget, VulkanBackend, VulkanRecorder};
