//! Static multi-pass render graph.
//!
//! A [`RenderGraph`] is an ordered list of [`PassDesc`] entries plus the
//! offscreen [`TargetDesc`]s they write and read. Declaration order is
//! dependency order: no reordering or dependency inference happens at run
//! time, so every rule that keeps a frame well formed is checked once, when
//! the graph is built.
//!
//! # Rules enforced by [`RenderGraphBuilder`]
//!
//! - A pass never reads its own destination (ping-pong pairs must be two targets)
//! - A depth attachment is neither an input nor the destination of the same pass
//! - Every input was written by a strictly earlier pass
//! - Clear values match the destination format (depth clears only on depth targets)
//! - Exactly one pass writes the presentable image, and it is the last one
//!
//! # Example
//!
//! ```
//! use ash::vk;
//! use vulkanisch_renderer::graph::{
//!     ClearPolicy, Destination, PassDesc, PipelineId, RenderGraphBuilder, TargetDesc, TargetSize,
//! };
//!
//! # fn example() -> vulkanisch_core::Result<()> {
//! let mut builder = RenderGraphBuilder::new();
//! let hdr = builder.add_target(TargetDesc::new(
//!     "hdr",
//!     vk::Format::R16G16B16A16_SFLOAT,
//!     TargetSize::Surface,
//! ));
//! builder.add_pass(
//!     PassDesc::new("color", PipelineId(0), Destination::Target(hdr))
//!         .with_clear(ClearPolicy::Color([0.0, 0.0, 0.0, 1.0])),
//! )?;
//! builder.add_pass(
//!     PassDesc::new("tonemap", PipelineId(1), Destination::Presentable).with_input(hdr),
//! )?;
//! let graph = builder.build()?;
//! assert_eq!(graph.passes().len(), 2);
//! # Ok(())
//! # }
//! ```

use ash::vk;
use vulkanisch_core::{Error, Result};

/// Index of an offscreen target inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

/// Opaque pipeline handle chosen by the hosted renderer.
///
/// The graph only carries it to the per-pass callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u32);

/// How an offscreen target is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// Same extent as the presentable surface.
    Surface,
    /// Surface extent divided by `divisor` in each dimension (at least 1x1).
    Scaled { divisor: u32 },
    /// Independent of the surface; survives recreation.
    Fixed(vk::Extent2D),
}

impl TargetSize {
    /// Whether the target must be rebuilt when the surface extent changes.
    pub fn depends_on_extent(&self) -> bool {
        !matches!(self, TargetSize::Fixed(_))
    }

    /// Resolve against a surface extent.
    pub fn resolve(&self, surface: vk::Extent2D) -> vk::Extent2D {
        match *self {
            TargetSize::Surface => surface,
            TargetSize::Scaled { divisor } => {
                let divisor = divisor.max(1);
                vk::Extent2D {
                    width: (surface.width / divisor).max(1),
                    height: (surface.height / divisor).max(1),
                }
            }
            TargetSize::Fixed(extent) => extent,
        }
    }
}

/// Declaration of an offscreen render target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDesc {
    pub name: String,
    pub format: vk::Format,
    pub size: TargetSize,
}

impl TargetDesc {
    pub fn new(name: impl Into<String>, format: vk::Format, size: TargetSize) -> Self {
        Self {
            name: name.into(),
            format,
            size,
        }
    }

    /// Whether this target is a depth (or depth/stencil) image.
    pub fn is_depth(&self) -> bool {
        is_depth_format(self.format)
    }
}

/// Returns true for formats carrying a depth aspect.
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Where a pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Target(TargetId),
    /// The image acquired from the surface for this frame.
    Presentable,
}

/// What happens to the destination when the pass begins.
///
/// A depth attachment is cleared to 1.0 whenever the pass clears its
/// color destination and loaded otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearPolicy {
    Color([f32; 4]),
    Depth(f32),
    Preserve,
}

/// One entry of the render graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    pub name: String,
    pub pipeline: PipelineId,
    pub destination: Destination,
    pub depth: Option<TargetId>,
    pub inputs: Vec<TargetId>,
    pub clear: ClearPolicy,
}

impl PassDesc {
    pub fn new(name: impl Into<String>, pipeline: PipelineId, destination: Destination) -> Self {
        Self {
            name: name.into(),
            pipeline,
            destination,
            depth: None,
            inputs: Vec::new(),
            clear: ClearPolicy::Preserve,
        }
    }

    pub fn with_depth(mut self, depth: TargetId) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_input(mut self, input: TargetId) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_clear(mut self, clear: ClearPolicy) -> Self {
        self.clear = clear;
        self
    }
}

/// A validated, immutable pass list.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGraph {
    targets: Vec<TargetDesc>,
    passes: Vec<PassDesc>,
}

impl RenderGraph {
    pub fn targets(&self) -> &[TargetDesc] {
        &self.targets
    }

    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetDesc> {
        self.targets.get(id.0)
    }

    /// Ids of every declared target, in declaration order.
    pub fn target_ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        (0..self.targets.len()).map(TargetId)
    }

    /// Look a target up by name.
    pub fn find_target(&self, name: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .position(|t| t.name == name)
            .map(TargetId)
    }
}

/// Incremental, validating constructor for [`RenderGraph`].
#[derive(Debug, Default)]
pub struct RenderGraphBuilder {
    targets: Vec<TargetDesc>,
    passes: Vec<PassDesc>,
    /// Targets written by the passes added so far.
    written: Vec<bool>,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an offscreen target.
    pub fn add_target(&mut self, desc: TargetDesc) -> TargetId {
        self.targets.push(desc);
        self.written.push(false);
        TargetId(self.targets.len() - 1)
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetDesc> {
        self.targets.get(id.0)
    }

    /// Append a pass after every pass added so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the pass breaks one of the
    /// module-level rules. The builder is left unchanged in that case.
    pub fn add_pass(&mut self, pass: PassDesc) -> Result<&mut Self> {
        self.check_pass(&pass)?;

        if let Destination::Target(id) = pass.destination {
            self.written[id.0] = true;
        }
        if let Some(depth) = pass.depth {
            self.written[depth.0] = true;
        }
        self.passes.push(pass);
        Ok(self)
    }

    fn check_pass(&self, pass: &PassDesc) -> Result<()> {
        let name = &pass.name;
        let reject = |reason: String| Err(Error::config(format!("pass '{name}': {reason}")));

        if self.passes.iter().any(|p| p.destination == Destination::Presentable) {
            return reject("no pass may follow the presentable pass".into());
        }

        for &input in &pass.inputs {
            let Some(desc) = self.target(input) else {
                return reject(format!("unknown input target {}", input.0));
            };
            if pass.destination == Destination::Target(input) {
                return reject(format!("reads its own destination '{}'", desc.name));
            }
            if pass.depth == Some(input) {
                return reject(format!("reads its own depth attachment '{}'", desc.name));
            }
            if !self.written[input.0] {
                return reject(format!(
                    "input '{}' is not written by an earlier pass",
                    desc.name
                ));
            }
        }

        if let Some(depth) = pass.depth {
            let Some(desc) = self.target(depth) else {
                return reject(format!("unknown depth target {}", depth.0));
            };
            if !desc.is_depth() {
                return reject(format!("depth attachment '{}' is not a depth format", desc.name));
            }
            if pass.destination == Destination::Target(depth) {
                return reject(format!("'{}' is both destination and depth attachment", desc.name));
            }
        }

        let destination_is_depth = match pass.destination {
            Destination::Target(id) => match self.target(id) {
                Some(desc) => desc.is_depth(),
                None => return reject(format!("unknown destination target {}", id.0)),
            },
            Destination::Presentable => false,
        };

        match (pass.clear, destination_is_depth) {
            (ClearPolicy::Depth(_), false) => reject("depth clear on a color destination".into()),
            (ClearPolicy::Color(_), true) => reject("color clear on a depth destination".into()),
            _ => Ok(()),
        }
    }

    /// Finish the graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no pass writes the presentable image.
    pub fn build(self) -> Result<RenderGraph> {
        match self.passes.last() {
            Some(last) if last.destination == Destination::Presentable => Ok(RenderGraph {
                targets: self.targets,
                passes: self.passes,
            }),
            _ => Err(Error::config(
                "render graph must end with a pass writing the presentable image",
            )),
        }
    }
}

/// Observable shape of a realized graph: what every pass writes and reads,
/// and the extent each target was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTopology {
    pub passes: Vec<PassTopology>,
    pub target_extents: Vec<(TargetId, vk::Extent2D)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTopology {
    pub name: String,
    pub destination: Destination,
    pub depth: Option<TargetId>,
    pub inputs: Vec<TargetId>,
}

impl GraphTopology {
    pub fn new(graph: &RenderGraph, target_extents: Vec<(TargetId, vk::Extent2D)>) -> Self {
        let passes = graph
            .passes()
            .iter()
            .map(|p| PassTopology {
                name: p.name.clone(),
                destination: p.destination,
                depth: p.depth,
                inputs: p.inputs.clone(),
            })
            .collect();
        Self {
            passes,
            target_extents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn color_target(builder: &mut RenderGraphBuilder, name: &str) -> TargetId {
        builder.add_target(TargetDesc::new(
            name,
            vk::Format::R16G16B16A16_SFLOAT,
            TargetSize::Surface,
        ))
    }

    #[test]
    fn test_destination_as_input_rejected() {
        let mut builder = RenderGraphBuilder::new();
        let a = color_target(&mut builder, "a");
        builder
            .add_pass(PassDesc::new("fill", PipelineId(0), Destination::Target(a)))
            .unwrap();

        let err = builder
            .add_pass(PassDesc::new("blur", PipelineId(1), Destination::Target(a)).with_input(a))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(builder.passes.len(), 1);
    }

    #[test]
    fn test_input_must_be_written_earlier() {
        let mut builder = RenderGraphBuilder::new();
        let a = color_target(&mut builder, "a");
        let err = builder
            .add_pass(PassDesc::new("read", PipelineId(0), Destination::Presentable).with_input(a))
            .unwrap_err();
        assert!(err.to_string().contains("not written by an earlier pass"));
    }

    #[test]
    fn test_depth_attachment_cannot_be_input() {
        let mut builder = RenderGraphBuilder::new();
        let depth = builder.add_target(TargetDesc::new(
            "depth",
            vk::Format::D32_SFLOAT,
            TargetSize::Surface,
        ));
        builder
            .add_pass(
                PassDesc::new("prepass", PipelineId(0), Destination::Target(depth))
                    .with_clear(ClearPolicy::Depth(1.0)),
            )
            .unwrap();
        let err = builder
            .add_pass(
                PassDesc::new("color", PipelineId(1), Destination::Presentable)
                    .with_depth(depth)
                    .with_input(depth),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[rstest]
    #[case(vk::Format::D32_SFLOAT, ClearPolicy::Color([0.0; 4]))]
    #[case(vk::Format::R8G8B8A8_UNORM, ClearPolicy::Depth(1.0))]
    fn test_clear_must_match_destination(#[case] format: vk::Format, #[case] clear: ClearPolicy) {
        let mut builder = RenderGraphBuilder::new();
        let t = builder.add_target(TargetDesc::new("t", format, TargetSize::Surface));
        assert!(
            builder
                .add_pass(PassDesc::new("p", PipelineId(0), Destination::Target(t)).with_clear(clear))
                .is_err()
        );
    }

    #[test]
    fn test_build_requires_presentable_last() {
        let mut builder = RenderGraphBuilder::new();
        let a = color_target(&mut builder, "a");
        builder
            .add_pass(PassDesc::new("fill", PipelineId(0), Destination::Target(a)))
            .unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_nothing_after_presentable_pass() {
        let mut builder = RenderGraphBuilder::new();
        let a = color_target(&mut builder, "a");
        builder
            .add_pass(PassDesc::new("present", PipelineId(0), Destination::Presentable))
            .unwrap();
        assert!(
            builder
                .add_pass(PassDesc::new("late", PipelineId(1), Destination::Target(a)))
                .is_err()
        );
    }

    #[rstest]
    #[case(TargetSize::Surface, 800, 600)]
    #[case(TargetSize::Scaled { divisor: 2 }, 400, 300)]
    #[case(TargetSize::Scaled { divisor: 1000 }, 1, 1)]
    #[case(TargetSize::Fixed(vk::Extent2D { width: 2048, height: 2048 }), 2048, 2048)]
    fn test_target_size_resolve(#[case] size: TargetSize, #[case] w: u32, #[case] h: u32) {
        let extent = size.resolve(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert_eq!((extent.width, extent.height), (w, h));
    }

    #[test]
    fn test_find_target_by_name() {
        let mut builder = RenderGraphBuilder::new();
        color_target(&mut builder, "hdr");
        let bloom = color_target(&mut builder, "bloom0");
        builder
            .add_pass(PassDesc::new("fill", PipelineId(0), Destination::Target(bloom)))
            .unwrap();
        builder
            .add_pass(PassDesc::new("out", PipelineId(0), Destination::Presentable).with_input(bloom))
            .unwrap();
        let graph = builder.build().unwrap();
        assert_eq!(graph.find_target("bloom0"), Some(bloom));
        assert_eq!(graph.find_target("missing"), None);
    }
}
