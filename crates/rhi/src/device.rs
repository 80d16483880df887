//! Vulkan logical device, queues and the gpu-allocator instance.
//!
//! # Example
//!
//! ```no_run
//! use vulkanisch_rhi::device::Device;
//! use vulkanisch_rhi::instance::Instance;
//! use vulkanisch_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! # fn example(instance: &Instance, surface: vk::SurfaceKHR) -> vulkanisch_rhi::RhiResult<()> {
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let gpu = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! let device = Device::new(instance, &gpu)?;
//! device.wait_idle()?;
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Shared through `Arc`; every GPU object keeps a reference so the device
/// outlives all of them. The allocator sits behind a `Mutex`.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_family: u32,
}

impl Device {
    /// Creates the logical device with dynamic rendering and synchronization2
    /// enabled, then initializes the allocator.
    ///
    /// # Errors
    ///
    /// Fails if device creation or allocator initialization fails.
    pub fn new(instance: &Instance, gpu: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let unique_families = gpu.queue_families.unique_families();
        let queue_priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();
        debug!("Creating queues for families {:?}", unique_families);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let features = vk::PhysicalDeviceFeatures::default();
        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(gpu.device, &create_info, None)?
        };
        info!("Logical device created on '{}'", gpu.device_name());

        let graphics_queue = unsafe { device.get_device_queue(gpu.graphics_family(), 0) };
        let present_queue = unsafe { device.get_device_queue(gpu.present_family(), 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: gpu.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };
        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: gpu.device,
            properties: gpu.properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            graphics_family: gpu.graphics_family(),
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Locks the allocator.
    ///
    /// # Errors
    ///
    /// [`RhiError::AllocatorPoisoned`] if a thread panicked while holding it.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// Blocks until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded and `fence` must be unsignaled
    /// and not pending.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            // Allocator memory blocks must go before the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync, the remaining fields are plain handles
// or data, and the allocator is only reached through its Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
