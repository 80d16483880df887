//! Graphics pipelines for dynamic rendering.
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout (descriptor set layouts and push constants)
//! - [`Pipeline`] wraps a graphics VkPipeline
//! - [`GraphicsPipelineBuilder`] assembles the fixed-function state
//!
//! Viewport and scissor are always dynamic, so pipelines survive surface
//! resizes as long as the attachment formats stay the same.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vulkanisch_rhi::device::Device;
//! use vulkanisch_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use vulkanisch_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>, source: &str) -> vulkanisch_rhi::RhiResult<()> {
//! let vs = Shader::from_wgsl(device.clone(), "fullscreen", source, ShaderStage::Vertex, "vs_main")?;
//! let fs = Shader::from_wgsl(device.clone(), "fullscreen", source, ShaderStage::Fragment, "fs_main")?;
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//!
//! // Fullscreen triangle: no vertex buffers, no depth.
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vs)
//!     .fragment_shader(&fs)
//!     .depth_test_enable(false)
//!     .color_attachment_format(vk::Format::R16G16B16A16_SFLOAT)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        debug!(
            "Created pipeline layout with {} set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Face culling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

impl CullMode {
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DepthBias {
    constant_factor: f32,
    slope_factor: f32,
}

/// Builder for graphics pipelines targeting dynamic rendering.
///
/// A pipeline without a fragment shader and without color formats is a
/// depth-only pipeline (shadow maps).
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: CullMode,
    depth_bias: Option<DepthBias>,
    depth_test_enable: bool,
    depth_write_enable: bool,
    color_attachment_formats: Vec<vk::Format>,
    depth_attachment_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: CullMode::None,
            depth_bias: None,
            depth_test_enable: true,
            depth_write_enable: true,
            color_attachment_formats: Vec::new(),
            depth_attachment_format: None,
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Constant and slope-scaled depth bias, for shadow casters.
    pub fn depth_bias(mut self, constant_factor: f32, slope_factor: f32) -> Self {
        self.depth_bias = Some(DepthBias {
            constant_factor,
            slope_factor,
        });
        self
    }

    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_formats.push(format);
        self
    }

    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = Some(format);
        self
    }

    fn validate(&self) -> RhiResult<&'a Shader> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("vertex shader is required".into()))?;
        if self.color_attachment_formats.is_empty() && self.depth_attachment_format.is_none() {
            return Err(RhiError::PipelineError(
                "pipeline has neither color nor depth attachments".into(),
            ));
        }
        if !self.color_attachment_formats.is_empty() && self.fragment_shader.is_none() {
            return Err(RhiError::PipelineError(
                "color attachments require a fragment shader".into(),
            ));
        }
        Ok(vertex_shader)
    }

    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self.validate()?;

        let mut shader_stages = vec![vertex_shader.stage_create_info()];
        if let Some(fragment_shader) = self.fragment_shader {
            shader_stages.push(fragment_shader.stage_create_info());
        }

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let bias = self.depth_bias.unwrap_or(DepthBias {
            constant_factor: 0.0,
            slope_factor: 0.0,
        });
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(self.depth_bias.is_some())
            .depth_bias_constant_factor(bias.constant_factor)
            .depth_bias_slope_factor(bias.slope_factor);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let has_depth = self.depth_attachment_format.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && self.depth_test_enable)
            .depth_write_enable(has_depth && self.depth_write_enable)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = self
            .color_attachment_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&self.color_attachment_formats);
        if let Some(depth_format) = self.depth_attachment_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = pipelines
            .first()
            .copied()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".into()))?;

        debug!(
            "Graphics pipeline created: {} color attachment(s), depth {:?}",
            self.color_attachment_formats.len(),
            self.depth_attachment_format
        );
        Ok(Pipeline { device, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert!(builder.depth_bias.is_none());
        assert_eq!(builder.cull_mode, CullMode::None);
    }

    #[test]
    fn test_builder_requires_vertex_shader() {
        let builder = GraphicsPipelineBuilder::new().color_attachment_format(vk::Format::B8G8R8A8_SRGB);
        assert!(matches!(builder.validate(), Err(RhiError::PipelineError(_))));
    }

    #[test]
    fn test_builder_collects_depth_bias() {
        let builder = GraphicsPipelineBuilder::new()
            .depth_attachment_format(vk::Format::D32_SFLOAT)
            .depth_bias(1.25, 1.75);
        assert_eq!(
            builder.depth_bias,
            Some(DepthBias {
                constant_factor: 1.25,
                slope_factor: 1.75
            })
        );
        assert!(builder.color_attachment_formats.is_empty());
    }
}
