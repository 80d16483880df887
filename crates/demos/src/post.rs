//! Fullscreen bloom passes: threshold, separable blur and tonemap.

use std::sync::Arc;

use ash::vk;
use tracing::debug;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::bloom::{BloomTargets, HDR_FORMAT};
use vulkanisch_renderer::{PassContext, PassTargets, TargetId, VulkanBackend};
use vulkanisch_rhi::command::CommandBuffer;
use vulkanisch_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, DescriptorWriter,
};
use vulkanisch_rhi::device::Device;

use crate::gpu::{GraphicsPipeline, PipelineDesc};
use crate::BLOOM;

pub const SHADER: &str = include_str!("../shaders/post.wgsl");

/// Descriptor sets over the realized targets, one per fullscreen pipeline.
struct PostSets {
    _pool: DescriptorPool,
    threshold: vk::DescriptorSet,
    horizontal: vk::DescriptorSet,
    vertical: vk::DescriptorSet,
    tonemap: vk::DescriptorSet,
}

pub struct PostProcess {
    device: Arc<Device>,
    // Sets before the layout they were allocated against.
    sets: Option<PostSets>,
    threshold: GraphicsPipeline,
    horizontal: GraphicsPipeline,
    vertical: GraphicsPipeline,
    tonemap: Option<(vk::Format, GraphicsPipeline)>,
    layout: DescriptorSetLayout,
}

impl PostProcess {
    pub fn new(device: &Arc<Device>) -> Result<Self> {
        let stage = vk::ShaderStageFlags::FRAGMENT;
        let layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                DescriptorBindingBuilder::sampled_image(0, stage),
                DescriptorBindingBuilder::sampled_image(1, stage),
                DescriptorBindingBuilder::sampler(2, stage),
            ],
        )?;
        let set_layouts = [layout.handle()];
        let hdr = |label, entry| {
            PipelineDesc::fullscreen(label, SHADER, entry, &set_layouts, HDR_FORMAT).build(device)
        };
        let threshold = hdr("bloom threshold", "fs_threshold")?;
        let horizontal = hdr("bloom horizontal blur", "fs_blur_horizontal")?;
        let vertical = hdr("bloom vertical blur", "fs_blur_vertical")?;

        Ok(Self {
            device: device.clone(),
            sets: None,
            threshold,
            horizontal,
            vertical,
            tonemap: None,
            layout,
        })
    }

    /// Point the descriptor sets at the current targets and make sure the
    /// tonemap pipeline writes `format`.
    pub fn bind_targets(
        &mut self,
        format: vk::Format,
        targets: &PassTargets<'_, VulkanBackend>,
        hdr: TargetId,
        bloom: BloomTargets,
    ) -> Result<()> {
        if self.tonemap.as_ref().is_none_or(|(built, _)| *built != format) {
            let set_layouts = [self.layout.handle()];
            let pipeline =
                PipelineDesc::fullscreen("tonemap", SHADER, "fs_tonemap", &set_layouts, format)
                    .build(&self.device)?;
            self.tonemap = Some((format, pipeline));
        }

        let hdr = targets.get(hdr)?;
        let [bloom0, bloom1] = [targets.get(bloom.bloom[0])?, targets.get(bloom.bloom[1])?];

        let per_set = [
            (vk::DescriptorType::SAMPLED_IMAGE, 2),
            (vk::DescriptorType::SAMPLER, 1),
        ];
        let pool = DescriptorPool::for_layouts(self.device.clone(), 4, &per_set)?;
        let sets = pool.allocate(&[self.layout.handle(); 4])?;
        let &[threshold, horizontal, vertical, tonemap] = sets.as_slice() else {
            return Err(Error::resource("post-process pool returned the wrong set count"));
        };

        let write = |set, primary: vk::ImageView, secondary: vk::ImageView, sampler| {
            DescriptorWriter::new()
                .sampled_image(0, primary)
                .sampled_image(1, secondary)
                .sampler(2, sampler)
                .write(&self.device, set);
        };
        write(threshold, hdr.view(), hdr.view(), hdr.sampler());
        write(horizontal, bloom0.view(), bloom0.view(), bloom0.sampler());
        write(vertical, bloom1.view(), bloom1.view(), bloom1.sampler());
        write(tonemap, hdr.view(), bloom0.view(), hdr.sampler());

        self.sets = Some(PostSets {
            _pool: pool,
            threshold,
            horizontal,
            vertical,
            tonemap,
        });
        debug!("Post-process sets bound to {:?}", hdr.extent());
        Ok(())
    }

    /// Record `pass` if it is one of the fullscreen passes. Returns `false`
    /// for any other pipeline.
    pub fn record(&self, pass: &PassContext<'_>, cmd: &CommandBuffer) -> Result<bool> {
        let sets = self
            .sets
            .as_ref()
            .ok_or_else(|| Error::resource("post-process targets are not bound"))?;
        let (pipeline, set) = match pass.pipeline() {
            id if id == BLOOM.threshold => (&self.threshold, sets.threshold),
            id if id == BLOOM.horizontal_blur => (&self.horizontal, sets.horizontal),
            id if id == BLOOM.vertical_blur => (&self.vertical, sets.vertical),
            id if id == BLOOM.tonemap => match self.tonemap.as_ref() {
                Some((_, pipeline)) => (pipeline, sets.tonemap),
                None => return Err(Error::resource("tonemap pipeline is not built")),
            },
            _ => return Ok(false),
        };
        pipeline.bind(cmd);
        cmd.bind_descriptor_sets(pipeline.layout(), 0, &[set]);
        cmd.draw(3, 1);
        Ok(true)
    }

    /// Drop the sets referencing the current targets.
    pub fn release(&mut self) {
        self.sets = None;
    }
}
