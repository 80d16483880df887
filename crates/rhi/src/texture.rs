//! Sampled textures uploaded once through a staging buffer.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandPool, submit_one_shot};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc, full_range};

/// An immutable RGBA8 image in `SHADER_READ_ONLY_OPTIMAL`.
pub struct Texture {
    image: Image,
}

impl Texture {
    pub const FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

    /// Upload tightly packed RGBA8 `pixels` and block until the copy lands.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidArgument`] if `pixels` is not `width * height * 4`
    /// bytes long, otherwise any creation or submission failure.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        name: &str,
        extent: vk::Extent2D,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        let expected = extent.width as usize * extent.height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::InvalidArgument(format!(
                "texture '{}' expects {} bytes, got {}",
                name,
                expected,
                pixels.len()
            )));
        }

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;
        let image = Image::new(
            device.clone(),
            &ImageDesc {
                name,
                extent,
                format: Self::FORMAT,
                usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            },
        )?;

        submit_one_shot(&device, pool, |cmd| {
            let range = full_range(vk::ImageAspectFlags::COLOR);
            cmd.image_barriers(&[vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::TOP_OF_PIPE)
                .src_access_mask(vk::AccessFlags2::NONE)
                .dst_stage_mask(vk::PipelineStageFlags2::COPY)
                .dst_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .image(image.handle())
                .subresource_range(range)]);

            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                });
            cmd.copy_buffer_to_image(staging.handle(), image.handle(), &[region]);

            cmd.image_barriers(&[vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COPY)
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags2::SHADER_SAMPLED_READ)
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image(image.handle())
                .subresource_range(range)]);
            Ok(())
        })?;

        info!(
            "Uploaded texture '{}' ({}x{})",
            name, extent.width, extent.height
        );
        Ok(Self { image })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}
