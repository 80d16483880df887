//! GPU-side building blocks shared by the demos: uploaded meshes, per-slot
//! uniform sets and pipeline construction.

use std::sync::Arc;

use ash::vk;
use tracing::debug;
use vulkanisch_core::{Error, Result};
use vulkanisch_rhi::buffer::{Buffer, BufferUsage};
use vulkanisch_rhi::command::CommandBuffer;
use vulkanisch_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, DescriptorWriter,
};
use vulkanisch_rhi::device::Device;
use vulkanisch_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vulkanisch_rhi::shader::{Shader, ShaderStage};
use vulkanisch_rhi::vertex::Vertex;

use crate::mesh::Mesh;
use crate::uniforms::SceneUniforms;

/// Vertex and index buffers of one [`Mesh`].
pub struct GpuMesh {
    vertices: Buffer,
    indices: Buffer,
    index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &Arc<Device>, mesh: &Mesh) -> Result<Self> {
        let vertices = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let indices = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Index,
            bytemuck::cast_slice(&mesh.indices),
        )?;
        Ok(Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        })
    }

    pub fn draw(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffer(0, self.vertices.handle());
        cmd.bind_index_buffer(self.indices.handle(), vk::IndexType::UINT32);
        cmd.draw_indexed(self.index_count, 1);
    }
}

/// Scene uniforms duplicated once per frame slot, each with its own set.
///
/// Only the copy of the slot being recorded is written, so a frame still in
/// flight never sees its uniforms change.
pub struct SceneBindings {
    device: Arc<Device>,
    layout: DescriptorSetLayout,
    // Sets are freed with the pool.
    _pool: DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
    uniforms: Vec<Buffer>,
}

impl SceneBindings {
    /// `material` lists extra bindings after the uniform block at binding 0,
    /// filled in by `write_material` for every slot.
    pub fn new(
        device: &Arc<Device>,
        slots: usize,
        material: &[vk::DescriptorSetLayoutBinding<'static>],
        write_material: impl Fn(DescriptorWriter) -> DescriptorWriter,
    ) -> Result<Self> {
        if slots == 0 {
            return Err(Error::config("scene bindings need at least one frame slot"));
        }
        let mut bindings = vec![DescriptorBindingBuilder::uniform_buffer(
            0,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )];
        bindings.extend_from_slice(material);
        let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let mut per_set: Vec<(vk::DescriptorType, u32)> = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            per_set.push((binding.descriptor_type, binding.descriptor_count));
        }
        let pool = DescriptorPool::for_layouts(device.clone(), slots as u32, &per_set)?;
        let sets = pool.allocate(&vec![layout.handle(); slots])?;

        let mut uniforms = Vec::with_capacity(slots);
        for &set in &sets {
            let buffer = Buffer::new(device.clone(), BufferUsage::Uniform, SceneUniforms::SIZE)?;
            write_material(DescriptorWriter::new().uniform_buffer(
                0,
                buffer.handle(),
                SceneUniforms::SIZE,
            ))
            .write(device, set);
            uniforms.push(buffer);
        }

        debug!("Scene bindings created for {} frame slots", slots);
        Ok(Self {
            device: device.clone(),
            layout,
            _pool: pool,
            sets,
            uniforms,
        })
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle()
    }

    pub fn slots(&self) -> usize {
        self.sets.len()
    }

    /// Write `uniforms` into `slot`'s copy and bind its set as set 0.
    pub fn bind(
        &self,
        cmd: &CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        slot: usize,
        uniforms: &SceneUniforms,
    ) -> Result<()> {
        let (Some(buffer), Some(&set)) = (self.uniforms.get(slot), self.sets.get(slot)) else {
            return Err(Error::resource(format!(
                "frame slot {slot} out of range for {} scene bindings",
                self.sets.len()
            )));
        };
        buffer.write(0, uniforms)?;
        cmd.bind_descriptor_sets(pipeline_layout, 0, &[set]);
        Ok(())
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

/// Pipeline plus the layout it was built against.
pub struct GraphicsPipeline {
    // Pipeline first: destroyed before its layout.
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl GraphicsPipeline {
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    pub fn bind(&self, cmd: &CommandBuffer) {
        cmd.bind_graphics_pipeline(self.pipeline.handle());
    }
}

/// How to build one pipeline from a WGSL module.
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    /// `None` for depth-only pipelines.
    pub fragment_entry: Option<&'a str>,
    pub set_layouts: &'a [vk::DescriptorSetLayout],
    pub color_format: Option<vk::Format>,
    pub depth_format: Option<vk::Format>,
    /// Mesh pipelines consume [`Vertex`]; fullscreen ones generate positions.
    pub mesh_input: bool,
    pub depth_bias: bool,
}

impl<'a> PipelineDesc<'a> {
    /// Mesh pipeline with vertex input and depth testing.
    pub fn mesh(label: &'a str, source: &'a str, set_layouts: &'a [vk::DescriptorSetLayout]) -> Self {
        Self {
            label,
            source,
            vertex_entry: "vs_main",
            fragment_entry: Some("fs_main"),
            set_layouts,
            color_format: None,
            depth_format: None,
            mesh_input: true,
            depth_bias: false,
        }
    }

    /// Fullscreen triangle pipeline writing `color_format`.
    pub fn fullscreen(
        label: &'a str,
        source: &'a str,
        fragment_entry: &'a str,
        set_layouts: &'a [vk::DescriptorSetLayout],
        color_format: vk::Format,
    ) -> Self {
        Self {
            label,
            source,
            vertex_entry: "vs_fullscreen",
            fragment_entry: Some(fragment_entry),
            set_layouts,
            color_format: Some(color_format),
            depth_format: None,
            mesh_input: false,
            depth_bias: false,
        }
    }

    pub fn entries(mut self, vertex: &'a str, fragment: Option<&'a str>) -> Self {
        self.vertex_entry = vertex;
        self.fragment_entry = fragment;
        self
    }

    pub fn color(mut self, format: vk::Format) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn depth(mut self, format: vk::Format) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn with_depth_bias(mut self) -> Self {
        self.depth_bias = true;
        self
    }

    pub fn build(&self, device: &Arc<Device>) -> Result<GraphicsPipeline> {
        let vertex = Shader::from_wgsl(
            device.clone(),
            self.label,
            self.source,
            ShaderStage::Vertex,
            self.vertex_entry,
        )?;
        let fragment = self
            .fragment_entry
            .map(|entry| {
                Shader::from_wgsl(
                    device.clone(),
                    self.label,
                    self.source,
                    ShaderStage::Fragment,
                    entry,
                )
            })
            .transpose()?;

        let layout = PipelineLayout::new(device.clone(), self.set_layouts, &[])?;
        let mut builder = GraphicsPipelineBuilder::new().vertex_shader(&vertex);
        if let Some(fragment) = fragment.as_ref() {
            builder = builder.fragment_shader(fragment);
        }
        if self.mesh_input {
            builder = builder
                .vertex_binding(Vertex::binding_description())
                .vertex_attributes(&Vertex::attribute_descriptions());
        }
        if let Some(format) = self.color_format {
            builder = builder.color_attachment_format(format);
        }
        if let Some(format) = self.depth_format {
            builder = builder.depth_attachment_format(format);
        }
        if self.depth_bias {
            builder = builder.depth_bias(1.25, 1.75);
        }
        let pipeline = builder.build(device.clone(), &layout)?;

        debug!("Pipeline '{}' built", self.label);
        Ok(GraphicsPipeline { pipeline, layout })
    }
}
