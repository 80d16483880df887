//! Images and image views.
//!
//! - [`ImageView`] owns only a view, for images owned elsewhere (swapchain)
//! - [`Image`] owns a 2D image, its gpu-allocator memory and one full view

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Aspect implied by a format.
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Single-mip, single-layer range over `aspect`.
pub fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// A 2D view over an image this wrapper does not own.
pub struct ImageView {
    device: Arc<Device>,
    view: vk::ImageView,
}

impl ImageView {
    pub fn new(device: Arc<Device>, image: vk::Image, format: vk::Format) -> RhiResult<Self> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(full_range(aspect_for_format(format)));
        let view = unsafe { device.handle().create_image_view(&create_info, None)? };
        Ok(Self { device, view })
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
        }
    }
}

/// Creation parameters for [`Image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc<'a> {
    pub name: &'a str,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

/// Device-local 2D image with one view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    /// # Errors
    ///
    /// [`RhiError::InvalidArgument`] for an empty extent, otherwise any
    /// Vulkan or allocator failure.
    pub fn new(device: Arc<Device>, desc: &ImageDesc<'_>) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "image '{}' has empty extent {}x{}",
                desc.name, desc.extent.width, desc.extent.height
            )));
        }

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.handle().create_image(&create_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: desc.name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // Drop cleans up whatever exists from here on.
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            format: desc.format,
            extent: desc.extent,
        };
        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_image_memory(
                    this.image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(this.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(full_range(this.aspect()));
        this.view = unsafe { this.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created image '{}': {}x{} {:?}",
            desc.name, desc.extent.width, desc.extent.height, desc.format
        );
        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_for_format(self.format)
    }

    pub fn is_depth(&self) -> bool {
        self.aspect().contains(vk::ImageAspectFlags::DEPTH)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
        }
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free image allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking image allocation: {}", e),
            }
        }
        unsafe {
            self.device.handle().destroy_image(self.image, None);
        }
        debug!("Destroyed image {}x{}", self.extent.width, self.extent.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vk::Format::D32_SFLOAT, vk::ImageAspectFlags::DEPTH)]
    #[case(vk::Format::D16_UNORM, vk::ImageAspectFlags::DEPTH)]
    #[case(
        vk::Format::D24_UNORM_S8_UINT,
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    )]
    #[case(vk::Format::R16G16B16A16_SFLOAT, vk::ImageAspectFlags::COLOR)]
    #[case(vk::Format::B8G8R8A8_SRGB, vk::ImageAspectFlags::COLOR)]
    fn test_aspect_for_format(#[case] format: vk::Format, #[case] expected: vk::ImageAspectFlags) {
        assert_eq!(aspect_for_format(format), expected);
    }

    #[test]
    fn test_full_range_covers_one_level_and_layer() {
        let range = full_range(vk::ImageAspectFlags::COLOR);
        assert_eq!(range.level_count, 1);
        assert_eq!(range.layer_count, 1);
        assert_eq!(range.base_mip_level, 0);
    }
}
