//! A mesh drawn with one lit pipeline into a color target plus depth.

use ash::vk;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::DEPTH_FORMAT;
use vulkanisch_rhi::command::CommandBuffer;

use crate::gpu::{GpuMesh, GraphicsPipeline, PipelineDesc, SceneBindings};
use crate::uniforms::SceneUniforms;

pub struct LitMesh {
    label: &'static str,
    source: &'static str,
    // Pipeline first: it is rebuilt whenever the color format changes.
    pipeline: Option<(vk::Format, GraphicsPipeline)>,
    bindings: SceneBindings,
    mesh: GpuMesh,
}

impl LitMesh {
    pub fn new(
        label: &'static str,
        source: &'static str,
        mesh: GpuMesh,
        bindings: SceneBindings,
    ) -> Self {
        Self {
            label,
            source,
            pipeline: None,
            bindings,
            mesh,
        }
    }

    /// Build the pipeline for `color_format` unless it already targets it.
    pub fn ensure_pipeline(&mut self, color_format: vk::Format) -> Result<()> {
        if self
            .pipeline
            .as_ref()
            .is_some_and(|(built, _)| *built == color_format)
        {
            return Ok(());
        }
        let set_layouts = [self.bindings.layout()];
        let pipeline = PipelineDesc::mesh(self.label, self.source, &set_layouts)
            .color(color_format)
            .depth(DEPTH_FORMAT)
            .build(self.bindings.device())?;
        self.pipeline = Some((color_format, pipeline));
        Ok(())
    }

    pub fn slots(&self) -> usize {
        self.bindings.slots()
    }

    pub fn record(&self, cmd: &CommandBuffer, slot: usize, uniforms: &SceneUniforms) -> Result<()> {
        let Some((_, pipeline)) = self.pipeline.as_ref() else {
            return Err(Error::resource(format!(
                "pipeline '{}' is not built",
                self.label
            )));
        };
        pipeline.bind(cmd);
        self.bindings.bind(cmd, pipeline.layout(), slot, uniforms)?;
        self.mesh.draw(cmd);
        Ok(())
    }
}
