//! Cube over a floor lit by [`ShadowLight`](vulkanisch_scene::ShadowLight),
//! drawn once into the shadow map and once shaded with it.

use std::sync::Arc;

use ash::vk;
use tracing::debug;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::RenderTarget;
use vulkanisch_renderer::bloom::DEPTH_FORMAT;
use vulkanisch_rhi::command::CommandBuffer;
use vulkanisch_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, DescriptorWriter,
};
use vulkanisch_rhi::device::Device;

use crate::gpu::{GpuMesh, GraphicsPipeline, PipelineDesc, SceneBindings};
use crate::mesh::Mesh;
use crate::uniforms::SceneUniforms;

pub const SHADER: &str = concat!(
    include_str!("../shaders/scene.wgsl"),
    include_str!("../shaders/shadowed.wgsl")
);

pub struct ShadowedScene {
    shadow_set: Option<(DescriptorPool, vk::DescriptorSet)>,
    lit: Option<(vk::Format, GraphicsPipeline)>,
    shadow: GraphicsPipeline,
    shadow_layout: DescriptorSetLayout,
    bindings: SceneBindings,
    mesh: GpuMesh,
}

impl ShadowedScene {
    pub fn new(device: &Arc<Device>, slots: usize) -> Result<Self> {
        let mesh = GpuMesh::upload(device, &Mesh::shadow_scene())?;
        let bindings = SceneBindings::new(device, slots, &[], |writer| writer)?;
        let shadow_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::sampled_image(0, vk::ShaderStageFlags::FRAGMENT)],
        )?;

        let set_layouts = [bindings.layout()];
        let shadow = PipelineDesc::mesh("shadow caster", SHADER, &set_layouts)
            .entries("vs_shadow", None)
            .depth(DEPTH_FORMAT)
            .with_depth_bias()
            .build(device)?;

        Ok(Self {
            shadow_set: None,
            lit: None,
            shadow,
            shadow_layout,
            bindings,
            mesh,
        })
    }

    pub fn slots(&self) -> usize {
        self.bindings.slots()
    }

    /// Build the shaded pipeline for `color_format` and point set 1 at `shadow_map`.
    pub fn prepare(&mut self, color_format: vk::Format, shadow_map: &RenderTarget) -> Result<()> {
        let device = self.bindings.device().clone();
        if self.lit.as_ref().is_none_or(|(built, _)| *built != color_format) {
            let set_layouts = [self.bindings.layout(), self.shadow_layout.handle()];
            let pipeline = PipelineDesc::mesh("shadowed scene", SHADER, &set_layouts)
                .color(color_format)
                .depth(DEPTH_FORMAT)
                .build(&device)?;
            self.lit = Some((color_format, pipeline));
        }

        let pool = DescriptorPool::for_layouts(
            device.clone(),
            1,
            &[(vk::DescriptorType::SAMPLED_IMAGE, 1)],
        )?;
        let set = pool
            .allocate(&[self.shadow_layout.handle()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::resource("shadow map set allocation returned nothing"))?;
        DescriptorWriter::new()
            .sampled_image(0, shadow_map.view())
            .write(&device, set);
        self.shadow_set = Some((pool, set));
        debug!("Shadow map '{}' bound", shadow_map.name());
        Ok(())
    }

    /// Drop the set referencing the shadow map.
    pub fn release(&mut self) {
        self.shadow_set = None;
    }

    pub fn record_shadow(
        &self,
        cmd: &CommandBuffer,
        slot: usize,
        uniforms: &SceneUniforms,
    ) -> Result<()> {
        self.shadow.bind(cmd);
        self.bindings.bind(cmd, self.shadow.layout(), slot, uniforms)?;
        self.mesh.draw(cmd);
        Ok(())
    }

    pub fn record_lit(&self, cmd: &CommandBuffer, slot: usize, uniforms: &SceneUniforms) -> Result<()> {
        let (Some((_, lit)), Some((_, shadow_set))) = (self.lit.as_ref(), self.shadow_set.as_ref())
        else {
            return Err(Error::resource("shadowed scene drawn before its shadow map was bound"));
        };
        lit.bind(cmd);
        self.bindings.bind(cmd, lit.layout(), slot, uniforms)?;
        cmd.bind_descriptor_sets(lit.layout(), 1, &[*shadow_set]);
        self.mesh.draw(cmd);
        Ok(())
    }
}
