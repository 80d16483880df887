//! [`GpuBackend`] over Vulkan 1.3: dynamic rendering and synchronization2 barriers.
//!
//! Offscreen targets track their current layout so each transition can name
//! the stage of the previous use as its source scope. Presentable images are
//! always entered from `UNDEFINED` (the presentable pass is the last one and
//! never reads old content) and leave in `PRESENT_SRC_KHR`.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::{debug, info};
use vulkanisch_core::{Error, Result};
use vulkanisch_platform::{Surface, Window, required_extensions};
use vulkanisch_rhi::RhiError;
use vulkanisch_rhi::command::{CommandBuffer, CommandPool};
use vulkanisch_rhi::device::Device;
use vulkanisch_rhi::image::{Image, ImageDesc, ImageView, full_range};
use vulkanisch_rhi::instance::Instance;
use vulkanisch_rhi::physical_device::{PhysicalDeviceInfo, select_physical_device};
use vulkanisch_rhi::sampler::{Sampler, SamplerKind};
use vulkanisch_rhi::swapchain::{Swapchain, SwapchainParams, SwapchainSupportDetails};
use vulkanisch_rhi::sync::{Fence, Semaphore};

use crate::backend::{
    Acquire, ChainDesc, GpuBackend, PassAttachments, PassTarget, Present, SurfaceCapabilities,
};
use crate::graph::{ClearPolicy, TargetDesc};

const APPLICATION_NAME: &std::ffi::CStr = c"Vulkanisch";

/// One in-flight frame: completion fence, acquire and render signals, and
/// the command buffer re-recorded every time the slot comes around.
pub struct FrameSlot {
    in_flight: Fence,
    image_available: Semaphore,
    render_finished: Semaphore,
    cmd: CommandBuffer,
    // Last: frees `cmd` when dropped.
    _pool: CommandPool,
}

/// Render target over one swapchain image.
pub struct PresentTarget {
    image: vk::Image,
    view: ImageView,
    extent: vk::Extent2D,
}

impl PresentTarget {
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }
}

/// Offscreen render target: image, full view, sampler for later passes.
pub struct RenderTarget {
    name: String,
    image: Image,
    sampler: Sampler,
    layout: Cell<vk::ImageLayout>,
}

impl RenderTarget {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    pub fn is_depth(&self) -> bool {
        self.image.is_depth()
    }

    fn attachment_layout(&self) -> vk::ImageLayout {
        attachment_layout(self.is_depth())
    }

    /// Record a transition to `new_layout`, discarding contents if `discard`.
    fn transition(&self, cmd: &CommandBuffer, new_layout: vk::ImageLayout, discard: bool) {
        let old_layout = self.layout.get();
        if old_layout == new_layout && !discard {
            return;
        }
        let (src_stage, src_access) = usage_scope(old_layout);
        let (dst_stage, dst_access) = usage_scope(new_layout);
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access)
            .old_layout(if discard {
                vk::ImageLayout::UNDEFINED
            } else {
                old_layout
            })
            .new_layout(new_layout)
            .image(self.image.handle())
            .subresource_range(full_range(self.image.aspect()));
        cmd.image_barriers(&[barrier]);
        self.layout.set(new_layout);
    }
}

/// An open recording plus the extent of the pass being recorded.
pub struct VulkanRecorder {
    cmd: CommandBuffer,
    pass_extent: vk::Extent2D,
}

impl VulkanRecorder {
    pub fn cmd(&self) -> &CommandBuffer {
        &self.cmd
    }

    /// Render area of the current pass; viewport and scissor already cover it.
    pub fn pass_extent(&self) -> vk::Extent2D {
        self.pass_extent
    }
}

/// Attachment layout for a color or depth target.
pub fn attachment_layout(depth: bool) -> vk::ImageLayout {
    if depth {
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    }
}

/// Stages and accesses that touch an image while it sits in `layout`.
pub fn usage_scope(layout: vk::ImageLayout) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE)
        }
        _ => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE),
    }
}

fn load_op(clears: bool) -> vk::AttachmentLoadOp {
    if clears {
        vk::AttachmentLoadOp::CLEAR
    } else {
        vk::AttachmentLoadOp::LOAD
    }
}

/// The production backend: instance, surface, device, and a transient pool
/// for one-shot uploads by hosted renderers.
pub struct VulkanBackend {
    // Drop order matters: everything device-owned before the device, the
    // device and surface before the instance.
    upload_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    gpu: PhysicalDeviceInfo,
    instance: Instance,
}

impl VulkanBackend {
    /// Bring up Vulkan for `window`. Validation is enabled in debug builds.
    ///
    /// # Errors
    ///
    /// No loader, no suitable GPU, or any creation failure.
    pub fn new(window: &Window) -> Result<Self> {
        let extensions = required_extensions(window.raw_display_handle()?)?;
        let instance = Instance::new(APPLICATION_NAME, &extensions, cfg!(debug_assertions))?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;
        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &gpu)?;
        let upload_pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;

        info!(
            "Vulkan backend ready on '{}' ({})",
            gpu.device_name(),
            gpu.device_type_name()
        );
        Ok(Self {
            upload_pool,
            device,
            surface,
            gpu,
            instance,
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Pool for [`vulkanisch_rhi::command::submit_one_shot`].
    pub fn upload_pool(&self) -> &CommandPool {
        &self.upload_pool
    }

    pub fn gpu_name(&self) -> &str {
        self.gpu.device_name()
    }

    fn support(&self) -> Result<SwapchainSupportDetails> {
        Ok(SwapchainSupportDetails::query(
            self.gpu.device,
            self.surface.handle(),
            self.surface.loader(),
        )?)
    }
}

impl GpuBackend for VulkanBackend {
    type Slot = FrameSlot;
    type Chain = Swapchain;
    type ImageTarget = PresentTarget;
    type Target = RenderTarget;
    type Recorder = VulkanRecorder;

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        let support = self.support()?;
        let caps = &support.capabilities;
        Ok(SurfaceCapabilities {
            min_images: caps.min_image_count,
            max_images: (caps.max_image_count > 0).then_some(caps.max_image_count),
            current_extent: support.current_extent(),
            min_extent: caps.min_image_extent,
            max_extent: caps.max_image_extent,
            formats: support.formats.clone(),
            present_modes: support.present_modes.clone(),
        })
    }

    fn create_image_chain(&self, desc: &ChainDesc) -> Result<Swapchain> {
        let pre_transform = self.support()?.capabilities.current_transform;
        Ok(Swapchain::new(
            &self.instance,
            self.device.clone(),
            self.surface.handle(),
            SwapchainParams {
                format: desc.format,
                extent: desc.extent,
                image_count: desc.image_count,
                present_mode: desc.present_mode,
            },
            pre_transform,
            self.gpu.present_family(),
        )?)
    }

    fn chain_image_count(&self, chain: &Swapchain) -> u32 {
        chain.image_count()
    }

    fn create_image_target(&self, chain: &Swapchain, index: u32) -> Result<PresentTarget> {
        let image = chain
            .image(index)
            .ok_or_else(|| Error::resource(format!("swapchain has no image {index}")))?;
        let view = ImageView::new(self.device.clone(), image, chain.params().format.format)?;
        Ok(PresentTarget {
            image,
            view,
            extent: chain.params().extent,
        })
    }

    fn destroy_image_target(&self, target: PresentTarget) {
        drop(target);
    }

    fn destroy_image_chain(&self, chain: Swapchain) {
        drop(chain);
    }

    fn acquire_next_image(
        &self,
        chain: &Swapchain,
        slot: &FrameSlot,
        timeout: Duration,
    ) -> Result<Acquire> {
        match chain.acquire_next_image(slot.image_available.handle(), timeout) {
            Ok((index, suboptimal)) => Ok(Acquire::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::Stale),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Err(Error::DeviceLost(format!(
                "no presentable image within {timeout:?}"
            ))),
            Err(e) => Err(RhiError::from(e).into()),
        }
    }

    fn present_image(&self, chain: &Swapchain, slot: &FrameSlot, index: u32) -> Result<Present> {
        match chain.present(
            self.device.present_queue(),
            index,
            slot.render_finished.handle(),
        ) {
            Ok(false) => Ok(Present::Presented),
            Ok(true) => Ok(Present::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::Stale),
            Err(e) => Err(RhiError::from(e).into()),
        }
    }

    fn create_frame_slot(&self) -> Result<FrameSlot> {
        let pool = CommandPool::new(self.device.clone(), self.device.graphics_family())?;
        let cmd = pool.allocate()?;
        Ok(FrameSlot {
            in_flight: Fence::new(self.device.clone(), true)?,
            image_available: Semaphore::new(self.device.clone())?,
            render_finished: Semaphore::new(self.device.clone())?,
            cmd,
            _pool: pool,
        })
    }

    fn destroy_frame_slot(&self, slot: FrameSlot) {
        drop(slot);
    }

    fn wait_frame_slot(&self, slot: &FrameSlot, timeout: Duration) -> Result<bool> {
        Ok(slot.in_flight.wait(timeout)?)
    }

    fn reset_frame_slot(&self, slot: &FrameSlot) -> Result<()> {
        Ok(slot.in_flight.reset()?)
    }

    fn begin_recording(&self, slot: &FrameSlot) -> Result<VulkanRecorder> {
        // The pool allows individual resets; begin resets implicitly.
        slot.cmd.begin()?;
        Ok(VulkanRecorder {
            cmd: slot.cmd.clone(),
            pass_extent: vk::Extent2D::default(),
        })
    }

    fn end_recording(&self, recorder: &mut VulkanRecorder, image: &PresentTarget) -> Result<()> {
        let (src_stage, src_access) = usage_scope(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        recorder.cmd.image_barriers(&[vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(vk::PipelineStageFlags2::NONE)
            .dst_access_mask(vk::AccessFlags2::NONE)
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .image(image.image)
            .subresource_range(full_range(vk::ImageAspectFlags::COLOR))]);
        Ok(recorder.cmd.end()?)
    }

    fn submit(&self, slot: &FrameSlot, recorder: VulkanRecorder) -> Result<()> {
        let wait_semaphores = [slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [recorder.cmd.handle()];
        let signal_semaphores = [slot.render_finished.handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: recording was closed by end_recording and the fence was
        // reset by the synchronizer right before this call.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], slot.in_flight.handle())?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(self.device.wait_idle()?)
    }

    fn create_render_target(&self, desc: &TargetDesc, extent: vk::Extent2D) -> Result<RenderTarget> {
        let depth = desc.is_depth();
        let usage = vk::ImageUsageFlags::SAMPLED
            | if depth {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            };
        let image = Image::new(
            self.device.clone(),
            &ImageDesc {
                name: &desc.name,
                extent,
                format: desc.format,
                usage,
            },
        )?;
        let sampler = Sampler::new(self.device.clone(), SamplerKind::LinearClamp)?;
        debug!(
            "Render target '{}' created: {}x{} {:?}",
            desc.name, extent.width, extent.height, desc.format
        );
        Ok(RenderTarget {
            name: desc.name.clone(),
            image,
            sampler,
            layout: Cell::new(vk::ImageLayout::UNDEFINED),
        })
    }

    fn destroy_render_target(&self, target: RenderTarget) {
        debug!("Render target '{}' destroyed", target.name);
        drop(target);
    }

    fn target_extent(&self, target: &RenderTarget) -> vk::Extent2D {
        target.extent()
    }

    fn bind_input(&self, recorder: &mut VulkanRecorder, target: &RenderTarget) -> Result<()> {
        target.transition(
            &recorder.cmd,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            false,
        );
        Ok(())
    }

    fn begin_pass(
        &self,
        recorder: &mut VulkanRecorder,
        attachments: &PassAttachments<'_, Self>,
        clear: &ClearPolicy,
    ) -> Result<()> {
        let clears = !matches!(clear, ClearPolicy::Preserve);
        let cmd = &recorder.cmd;

        let (color_view, depth_dest, extent) = match attachments.destination {
            PassTarget::Presentable(image) => {
                let (src_stage, _) = usage_scope(vk::ImageLayout::PRESENT_SRC_KHR);
                let (dst_stage, dst_access) =
                    usage_scope(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
                // Source stage chains with the acquire semaphore wait.
                cmd.image_barriers(&[vk::ImageMemoryBarrier2::default()
                    .src_stage_mask(src_stage | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                    .src_access_mask(vk::AccessFlags2::NONE)
                    .dst_stage_mask(dst_stage)
                    .dst_access_mask(dst_access)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .image(image.image)
                    .subresource_range(full_range(vk::ImageAspectFlags::COLOR))]);
                (Some(image.view()), None, image.extent)
            }
            PassTarget::Offscreen(target) => {
                target.transition(cmd, target.attachment_layout(), clears);
                if target.is_depth() {
                    (None, Some(target), target.extent())
                } else {
                    (Some(target.view()), None, target.extent())
                }
            }
        };
        if let Some(depth) = attachments.depth {
            depth.transition(cmd, depth.attachment_layout(), clears);
        }

        let color_attachments: Vec<vk::RenderingAttachmentInfo<'_>> = color_view
            .map(|view| {
                let color = match clear {
                    ClearPolicy::Color(rgba) => *rgba,
                    _ => [0.0; 4],
                };
                vk::RenderingAttachmentInfo::default()
                    .image_view(view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(load_op(clears))
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue { float32: color },
                    })
            })
            .into_iter()
            .collect();

        let depth_target = depth_dest.or(attachments.depth);
        let depth_attachment = depth_target.map(|target| {
            let depth = match clear {
                ClearPolicy::Depth(value) => *value,
                _ => 1.0,
            };
            vk::RenderingAttachmentInfo::default()
                .image_view(target.view())
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(load_op(clears))
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
                })
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        cmd.begin_rendering(&rendering_info);
        cmd.set_viewport_and_scissor(extent);
        recorder.pass_extent = extent;
        Ok(())
    }

    fn end_pass(&self, recorder: &mut VulkanRecorder) -> Result<()> {
        recorder.cmd.end_rendering();
        Ok(())
    }
}
