//! GPU buffers backed by gpu-allocator.
//!
//! Every buffer here is host-visible: meshes are small and uniforms are
//! rewritten every frame, so a staging copy would only add a submission.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vulkanisch_rhi::buffer::{Buffer, BufferUsage};
//! use vulkanisch_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> vulkanisch_rhi::RhiResult<()> {
//! let positions: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertices = Buffer::new_with_data(device, BufferUsage::Vertex, bytemuck::cast_slice(&positions))?;
//! assert_eq!(vertices.size(), 24);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// How a buffer is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    /// Source of a buffer-to-image copy.
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        MemoryLocation::CpuToGpu
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// A VkBuffer with its persistently mapped allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// # Errors
    ///
    /// [`RhiError::InvalidArgument`] for a zero size, otherwise any Vulkan
    /// or allocator failure.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: usage.memory_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop releases both halves on failure.
        let this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };
        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    this.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(this)
    }

    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copy `data` into the mapping at `offset`.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidArgument`] if the write runs past the end.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidArgument(format!(
                "write of {} bytes at {} exceeds {} buffer of {} bytes",
                data.len(),
                offset,
                self.usage.name(),
                self.size
            )));
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| RhiError::InvalidArgument("buffer memory is not mapped".into()))?;

        // Host-coherent memory: no flush needed.
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    /// Write one plain-old-data value at `offset`.
    pub fn write<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, value: &T) -> RhiResult<()> {
        self.write_data(offset, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BufferUsage::Vertex, vk::BufferUsageFlags::VERTEX_BUFFER)]
    #[case(BufferUsage::Index, vk::BufferUsageFlags::INDEX_BUFFER)]
    #[case(BufferUsage::Uniform, vk::BufferUsageFlags::UNIFORM_BUFFER)]
    #[case(BufferUsage::Staging, vk::BufferUsageFlags::TRANSFER_SRC)]
    fn test_buffer_usage_to_vk_usage(
        #[case] usage: BufferUsage,
        #[case] expected: vk::BufferUsageFlags,
    ) {
        assert!(usage.to_vk_usage().contains(expected));
    }

    #[test]
    fn test_every_buffer_is_host_visible() {
        for usage in [
            BufferUsage::Vertex,
            BufferUsage::Index,
            BufferUsage::Uniform,
            BufferUsage::Staging,
        ] {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }
}
