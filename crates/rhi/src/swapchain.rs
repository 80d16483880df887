//! Swapchain creation, image acquisition and presentation.
//!
//! Format, present mode, extent and image count are decided by the caller;
//! this module only queries the surface and executes the decision.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;
use crate::instance::Instance;

/// Everything the surface reports about what a swapchain may look like.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// The extent is left to the swapchain when the surface reports `u32::MAX`.
    pub fn current_extent(&self) -> Option<vk::Extent2D> {
        let extent = self.capabilities.current_extent;
        (extent.width != u32::MAX).then_some(extent)
    }
}

/// Resolved swapchain parameters.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParams {
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub present_mode: vk::PresentModeKHR,
}

/// Vulkan swapchain wrapper. Owns the handle; the images belong to it.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    params: SwapchainParams,
}

impl Swapchain {
    /// Creates a swapchain on `surface`.
    ///
    /// Images are shared concurrently when graphics and present live on
    /// different queue families.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        params: SwapchainParams,
        pre_transform: vk::SurfaceTransformFlagsKHR,
        present_family: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let families = [device.graphics_family(), present_family];
        let (sharing_mode, family_indices) = if families[0] != families[1] {
            (vk::SharingMode::CONCURRENT, &families[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(params.image_count)
            .image_format(params.format.format)
            .image_color_space(params.format.color_space)
            .image_extent(params.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(params.present_mode)
            .clipped(true);

        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        info!(
            "Swapchain created: {}x{}, {:?}, {:?}, {} images",
            params.extent.width,
            params.extent.height,
            params.format.format,
            params.present_mode,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            params,
        })
    }

    /// Acquires the next image, signaling `semaphore` when it is writable.
    ///
    /// Returns the raw Vulkan result so callers can tell `ERROR_OUT_OF_DATE_KHR`
    /// and `TIMEOUT` apart from real failures.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: Duration,
    ) -> Result<(u32, bool), vk::Result> {
        let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, nanos, semaphore, vk::Fence::null())
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// `Ok(true)` means the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn params(&self) -> &SwapchainParams {
        &self.params
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn image(&self, index: u32) -> Option<vk::Image> {
        self.images.get(index as usize).copied()
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("Swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(current: vk::Extent2D) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                current_extent: current,
                ..Default::default()
            },
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn test_current_extent_defined() {
        let support = details(vk::Extent2D {
            width: 1920,
            height: 1080,
        });
        assert_eq!(
            support.current_extent(),
            Some(vk::Extent2D {
                width: 1920,
                height: 1080
            })
        );
    }

    #[test]
    fn test_current_extent_sentinel() {
        let support = details(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        assert_eq!(support.current_extent(), None);
    }
}
