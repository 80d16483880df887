//! Physical device (GPU) selection.
//!
//! A device qualifies when it exposes Vulkan 1.3 (dynamic rendering), a
//! graphics queue family and a family that can present to the window
//! surface. Qualifying devices are ranked, discrete GPUs first.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices needed by the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// A selected GPU and what we learned about it.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilyIndices,
    graphics_family: u32,
    present_family: u32,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    #[inline]
    pub fn present_family(&self) -> u32 {
        self.present_family
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Pick the best GPU able to render to `surface`.
///
/// # Errors
///
/// [`RhiError::NoSuitableGpu`] when nothing qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .max_by_key(rate_device);

    match selected {
        Some(info) => {
            info!(
                "Selected GPU: '{}' ({})",
                info.device_name(),
                info.device_type_name()
            );
            Ok(info)
        }
        None => {
            warn!("No suitable GPU found with required capabilities");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .ok()
        .and_then(|n| n.to_str().ok())
        .unwrap_or("Unknown")
        .to_owned();

    if !supports_vulkan_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }
    if !supports_swapchain(instance, device) {
        debug!("GPU '{}' skipped: no swapchain extension", name);
        return None;
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    let (Some(graphics_family), Some(present_family)) =
        (queue_families.graphics_family, queue_families.present_family)
    else {
        debug!("GPU '{}' skipped: missing graphics or present queue", name);
        return None;
    };

    Some(PhysicalDeviceInfo {
        device,
        properties,
        queue_families,
        graphics_family,
        present_family,
    })
}

fn supports_vulkan_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

fn supports_swapchain(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let Ok(extensions) = (unsafe { instance.enumerate_device_extension_properties(device) })
    else {
        return false;
    };
    extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .is_ok_and(|name| name == ash::khr::swapchain::NAME)
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // A family doing both avoids queue ownership transfers of the presentable images.
        if has_graphics && can_present {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if can_present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let type_score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };
    type_score + info.properties.limits.max_image_dimension2_d
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_queue_family_indices_separate_present() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());
    }

    #[rstest]
    #[case(vk::make_api_version(0, 1, 3, 0), true)]
    #[case(vk::make_api_version(0, 1, 4, 0), true)]
    #[case(vk::make_api_version(0, 1, 2, 198), false)]
    fn test_vulkan_version_gate(#[case] version: u32, #[case] expected: bool) {
        assert_eq!(supports_vulkan_1_3(version), expected);
    }
}
