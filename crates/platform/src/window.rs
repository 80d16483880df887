//! Window and Vulkan surface creation.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vulkanisch_core::{Error, Result};

/// Initial client area.
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Owned `VkSurfaceKHR`. The instance must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface from the same instance
        // as the loader; destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A resizable winit window.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::config(format!("failed to create window: {e}")))?;

        tracing::info!("Window '{}' created: {}x{}", title, width, height);
        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Current client area in pixels; zero while minimized on some platforms.
    pub fn extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| Error::config(format!("failed to get display handle: {e}")))
    }

    /// Create a Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Invalid window or display handles, or a failing `vkCreate*SurfaceKHR`.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self.raw_display_handle()?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::config(format!("failed to get window handle: {e}")))?;

        // SAFETY: both handles come from the live winit window; the surface
        // is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display_handle, window_handle.as_raw(), None)
                .map_err(|e| Error::resource(format!("failed to create Vulkan surface: {e}")))?
        };
        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");
        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

/// Instance extensions needed to create a surface on `display_handle`.
///
/// The returned pointers reference static strings owned by ash-window.
pub fn required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::config(format!("failed to enumerate surface extensions: {e}")))?;

    tracing::debug!(
        "Required surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash-window returns valid, NUL-terminated static strings.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );
    Ok(extensions.to_vec())
}

/// Window title for the hosted renderer `name`.
pub fn window_title(name: &str) -> String {
    format!("Vulkanisch - {name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_title() {
        assert_eq!(window_title("HelloCube"), "Vulkanisch - HelloCube");
    }

    #[test]
    fn test_default_size() {
        assert_eq!((DEFAULT_WIDTH, DEFAULT_HEIGHT), (800, 600));
    }
}
