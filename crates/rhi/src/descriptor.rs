//! Descriptor set layouts, pools and updates.
//!
//! WGSL declares textures and samplers separately, so images are bound as
//! `SAMPLED_IMAGE` plus `SAMPLER` rather than combined image samplers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vulkanisch_rhi::descriptor::{DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, DescriptorWriter};
//! use vulkanisch_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>, ubo: vk::Buffer) -> vulkanisch_rhi::RhiResult<()> {
//! let layout = DescriptorSetLayout::new(
//!     device.clone(),
//!     &[DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX)],
//! )?;
//! let pool = DescriptorPool::for_layouts(device.clone(), 2, &[(vk::DescriptorType::UNIFORM_BUFFER, 1)])?;
//! let sets = pool.allocate(&[layout.handle(); 2])?;
//! for set in sets {
//!     DescriptorWriter::new().uniform_buffer(0, ubo, vk::WHOLE_SIZE).write(&device, set);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool. Sets are released all at once when the pool drops.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );
        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Pool sized for `sets` sets of one layout, given per-set descriptor counts.
    pub fn for_layouts(
        device: Arc<Device>,
        sets: u32,
        per_set: &[(vk::DescriptorType, u32)],
    ) -> RhiResult<Self> {
        Self::new(device, sets, &pool_sizes(sets, per_set))
    }

    /// # Errors
    ///
    /// Fails when the pool is exhausted.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        debug!("Allocated {} descriptor set(s)", sets.len());
        Ok(sets)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Scale per-set descriptor counts by `sets`, merging repeated types.
pub fn pool_sizes(sets: u32, per_set: &[(vk::DescriptorType, u32)]) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for &(ty, count) in per_set {
        match sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += count * sets,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(ty)
                    .descriptor_count(count * sets),
            ),
        }
    }
    sizes
}

/// Layout binding constructors.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    #[inline]
    pub fn uniform_buffer(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    #[inline]
    pub fn sampled_image(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::SAMPLED_IMAGE, stage_flags)
    }

    #[inline]
    pub fn sampler(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::SAMPLER, stage_flags)
    }

    fn single(
        binding: u32,
        ty: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(ty)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }
}

enum PendingWrite {
    Buffer(u32, vk::DescriptorBufferInfo),
    Image(u32, vk::DescriptorType, vk::DescriptorImageInfo),
}

/// Collects descriptor updates for one set and applies them in a single call.
#[derive(Default)]
pub struct DescriptorWriter {
    writes: Vec<PendingWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniform_buffer(mut self, binding: u32, buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        let info = vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(0)
            .range(range);
        self.writes.push(PendingWrite::Buffer(binding, info));
        self
    }

    /// `view` must be in `SHADER_READ_ONLY_OPTIMAL` whenever the set is used.
    pub fn sampled_image(mut self, binding: u32, view: vk::ImageView) -> Self {
        let info = vk::DescriptorImageInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        self.writes.push(PendingWrite::Image(
            binding,
            vk::DescriptorType::SAMPLED_IMAGE,
            info,
        ));
        self
    }

    pub fn sampler(mut self, binding: u32, sampler: vk::Sampler) -> Self {
        let info = vk::DescriptorImageInfo::default().sampler(sampler);
        self.writes
            .push(PendingWrite::Image(binding, vk::DescriptorType::SAMPLER, info));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn write(self, device: &Device, set: vk::DescriptorSet) {
        if self.writes.is_empty() {
            return;
        }
        let writes: Vec<vk::WriteDescriptorSet<'_>> = self
            .writes
            .iter()
            .map(|pending| match pending {
                PendingWrite::Buffer(binding, info) => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info)),
                PendingWrite::Image(binding, ty, info) => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*ty)
                    .image_info(std::slice::from_ref(info)),
            })
            .collect();
        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }
    }
}
