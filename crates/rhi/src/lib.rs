//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin, owning wrappers over `ash`:
//! - Instance, physical device selection and the logical device
//! - Swapchain, frame synchronization objects and command recording
//! - Buffers, images, samplers and textures backed by gpu-allocator
//! - WGSL shaders compiled through naga, descriptors and graphics pipelines

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
