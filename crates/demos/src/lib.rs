//! Hosted renderers selectable by name.
//!
//! Every demo declares a static [`RenderGraph`](vulkanisch_renderer::RenderGraph)
//! and builds its pipelines, uniforms and descriptor sets lazily in
//! `on_surface_ready`, once the presentable format and the realized targets
//! are known.
//!
//! ```no_run
//! let registry = vulkanisch_demos::registry();
//! assert!(registry.contains("HelloCube"));
//! ```

pub mod bloom;
pub mod full_demo;
pub mod gpu;
pub mod hello_cube;
pub mod lit;
pub mod mesh;
pub mod post;
pub mod shadow_map;
pub mod shadowed;
pub mod texturing;
pub mod uniforms;

use vulkanisch_renderer::{
    BloomPipelines, CanonicalPipelines, PipelineId, Registry, VulkanBackend,
};

pub use bloom::Bloom;
pub use full_demo::FullDemo;
pub use hello_cube::HelloCube;
pub use shadow_map::ShadowMap;
pub use texturing::Texturing;

pub const SHADOW: PipelineId = PipelineId(0);
pub const COLOR: PipelineId = PipelineId(1);

pub const BLOOM: BloomPipelines = BloomPipelines {
    threshold: PipelineId(2),
    horizontal_blur: PipelineId(3),
    vertical_blur: PipelineId(4),
    tonemap: PipelineId(5),
};

pub const CANONICAL: CanonicalPipelines = CanonicalPipelines {
    shadow: SHADOW,
    color: COLOR,
    bloom: BLOOM,
};

/// Registry holding every demo.
pub fn registry() -> Registry<VulkanBackend> {
    let mut registry = Registry::new();
    hello_cube::register(&mut registry);
    texturing::register(&mut registry);
    shadow_map::register(&mut registry);
    bloom::register(&mut registry);
    full_demo::register(&mut registry);
    registry
}
