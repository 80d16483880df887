//! Command pool and command buffer management.
//!
//! - [`CommandPool`] owns a VkCommandPool for one queue family
//! - [`CommandBuffer`] records commands; it is a cheap handle and does not
//!   free itself (its pool does)
//! - [`submit_one_shot`] records, submits and waits for a throwaway command
//!   buffer, for one-time uploads outside the frame loop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vulkanisch_rhi::command::{CommandPool, submit_one_shot};
//! use vulkanisch_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> vulkanisch_rhi::RhiResult<()> {
//! let pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;
//! submit_one_shot(&device, &pool, |cmd| {
//!     // cmd.copy_buffer_to_image(...);
//!     let _ = cmd.handle();
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::{debug, trace};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::Fence;

/// Upper bound for a one-shot transfer to complete.
const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Vulkan command pool wrapper.
///
/// Not thread-safe: record from one thread per pool.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Creates a pool whose buffers can be reset individually.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Creates a pool for short-lived buffers that are recorded once.
    pub fn new_transient(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
        )
    }

    fn with_flags(
        device: Arc<Device>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!(
            "Command pool created for queue family {} ({:?})",
            queue_family_index, flags
        );
        Ok(Self { device, pool })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates a primary command buffer from this pool.
    pub fn allocate(&self) -> RhiResult<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        let buffer = buffers
            .first()
            .copied()
            .ok_or(RhiError::VulkanError(vk::Result::ERROR_UNKNOWN))?;
        Ok(CommandBuffer {
            device: self.device.clone(),
            buffer,
        })
    }

    /// Returns a buffer to the pool.
    pub fn free(&self, buffer: CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &[buffer.buffer]);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Command pool destroyed");
    }
}

/// Vulkan command buffer handle with recording helpers.
#[derive(Clone)]
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begins recording for a single submission.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// The buffer must not be pending execution.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    // =========================================================================
    // Dynamic Rendering (Vulkan 1.3)
    // =========================================================================

    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo<'_>) {
        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(self.buffer, rendering_info);
        }
    }

    pub fn end_rendering(&self) {
        unsafe {
            self.device.handle().cmd_end_rendering(self.buffer);
        }
    }

    // =========================================================================
    // Binding
    // =========================================================================

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    pub fn bind_vertex_buffer(&self, binding: u32, buffer: vk::Buffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, binding, &[buffer], &[0]);
        }
    }

    pub fn bind_index_buffer(&self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, 0, index_type);
        }
    }

    pub fn bind_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    // =========================================================================
    // Dynamic State
    // =========================================================================

    /// Full-extent viewport and scissor.
    pub fn set_viewport_and_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    // =========================================================================
    // Drawing Commands
    // =========================================================================

    pub fn draw(&self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw(self.buffer, vertex_count, instance_count, 0, 0);
        }
    }

    pub fn draw_indexed(&self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.buffer, index_count, instance_count, 0, 0, 0);
        }
    }

    // =========================================================================
    // Synchronization and Transfer
    // =========================================================================

    pub fn image_barriers(&self, barriers: &[vk::ImageMemoryBarrier2<'_>]) {
        let dependency = vk::DependencyInfo::default().image_memory_barriers(barriers);
        unsafe {
            self.device
                .handle()
                .cmd_pipeline_barrier2(self.buffer, &dependency);
        }
    }

    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }
}

/// Records `record` into a fresh buffer from `pool`, submits it to the
/// graphics queue and blocks until it completes.
///
/// Intended for one-time initialization; never call it on the frame path.
pub fn submit_one_shot<F>(device: &Arc<Device>, pool: &CommandPool, record: F) -> RhiResult<()>
where
    F: FnOnce(&CommandBuffer) -> RhiResult<()>,
{
    let cmd = pool.allocate()?;
    let result = (|| {
        cmd.begin()?;
        record(&cmd)?;
        cmd.end()?;

        let fence = Fence::new(device.clone(), false)?;
        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe { device.submit_graphics(&[submit_info], fence.handle())? };

        if !fence.wait(ONE_SHOT_TIMEOUT)? {
            return Err(RhiError::VulkanError(vk::Result::TIMEOUT));
        }
        trace!("One-shot submission completed");
        Ok(())
    })();
    pool.free(cmd);
    result
}
