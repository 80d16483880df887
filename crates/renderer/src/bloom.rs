//! Canonical shadow + bloom pass chain.
//!
//! ```text
//! Shadow(shadow) -> Color(reads shadow, writes hdr) -> Threshold(hdr -> bloom0)
//!   -> { HBlur(bloom0 -> bloom1); VBlur(bloom1 -> bloom0) } x K
//!   -> Tonemap(hdr + bloom0 -> presentable)
//! ```

use ash::vk;
use vulkanisch_core::Result;

use crate::graph::{
    ClearPolicy, Destination, PassDesc, PipelineId, RenderGraph, RenderGraphBuilder, TargetDesc,
    TargetId, TargetSize,
};

/// Blur iterations used by the reference chain.
pub const DEFAULT_BLUR_ITERATIONS: u32 = 4;

pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
pub const SHADOW_MAP_SIZE: u32 = 2048;

/// Pipelines a bloom chain refers to. The hosted renderer owns them.
#[derive(Debug, Clone, Copy)]
pub struct BloomPipelines {
    pub threshold: PipelineId,
    pub horizontal_blur: PipelineId,
    pub vertical_blur: PipelineId,
    pub tonemap: PipelineId,
}

/// Targets created by [`BloomChain::append`].
#[derive(Debug, Clone, Copy)]
pub struct BloomTargets {
    pub bloom: [TargetId; 2],
}

/// Builder for the threshold, blur and tonemap tail of a frame.
#[derive(Debug, Clone, Copy)]
pub struct BloomChain {
    pub iterations: u32,
    pub pipelines: BloomPipelines,
    /// Bloom targets are `surface / divisor`.
    pub divisor: u32,
}

impl BloomChain {
    pub fn new(pipelines: BloomPipelines) -> Self {
        Self {
            iterations: DEFAULT_BLUR_ITERATIONS,
            pipelines,
            divisor: 1,
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    /// Append `2 * iterations + 2` passes reading `hdr`, ending on the
    /// presentable image.
    ///
    /// # Errors
    ///
    /// Fails if `hdr` has not been written by an earlier pass.
    pub fn append(&self, builder: &mut RenderGraphBuilder, hdr: TargetId) -> Result<BloomTargets> {
        let size = match self.divisor {
            0 | 1 => TargetSize::Surface,
            divisor => TargetSize::Scaled { divisor },
        };
        let bloom0 = builder.add_target(TargetDesc::new("bloom0", HDR_FORMAT, size));
        let bloom1 = builder.add_target(TargetDesc::new("bloom1", HDR_FORMAT, size));
        let black = ClearPolicy::Color([0.0, 0.0, 0.0, 1.0]);

        builder.add_pass(
            PassDesc::new("threshold", self.pipelines.threshold, Destination::Target(bloom0))
                .with_input(hdr)
                .with_clear(black),
        )?;
        for i in 0..self.iterations {
            builder.add_pass(
                PassDesc::new(
                    format!("hblur{i}"),
                    self.pipelines.horizontal_blur,
                    Destination::Target(bloom1),
                )
                .with_input(bloom0)
                .with_clear(black),
            )?;
            builder.add_pass(
                PassDesc::new(
                    format!("vblur{i}"),
                    self.pipelines.vertical_blur,
                    Destination::Target(bloom0),
                )
                .with_input(bloom1)
                .with_clear(black),
            )?;
        }
        builder.add_pass(
            PassDesc::new("tonemap", self.pipelines.tonemap, Destination::Presentable)
                .with_input(hdr)
                .with_input(bloom0)
                .with_clear(black),
        )?;

        Ok(BloomTargets {
            bloom: [bloom0, bloom1],
        })
    }
}

/// Pipelines of the full shadow + color + bloom chain.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalPipelines {
    pub shadow: PipelineId,
    pub color: PipelineId,
    pub bloom: BloomPipelines,
}

/// Build `Shadow -> Color -> Threshold -> {HBlur, VBlur} x K -> Tonemap`.
pub fn canonical_graph(pipelines: CanonicalPipelines, iterations: u32) -> Result<RenderGraph> {
    let mut builder = RenderGraphBuilder::new();
    let shadow = builder.add_target(TargetDesc::new(
        "shadow",
        DEPTH_FORMAT,
        TargetSize::Fixed(vk::Extent2D {
            width: SHADOW_MAP_SIZE,
            height: SHADOW_MAP_SIZE,
        }),
    ));
    let hdr = builder.add_target(TargetDesc::new("hdr", HDR_FORMAT, TargetSize::Surface));
    let depth = builder.add_target(TargetDesc::new("depth", DEPTH_FORMAT, TargetSize::Surface));

    builder.add_pass(
        PassDesc::new("shadow", pipelines.shadow, Destination::Target(shadow))
            .with_clear(ClearPolicy::Depth(1.0)),
    )?;
    builder.add_pass(
        PassDesc::new("color", pipelines.color, Destination::Target(hdr))
            .with_depth(depth)
            .with_input(shadow)
            .with_clear(ClearPolicy::Color([0.0, 0.0, 0.0, 1.0])),
    )?;
    BloomChain::new(pipelines.bloom)
        .with_iterations(iterations)
        .append(&mut builder, hdr)?;

    builder.build()
}
