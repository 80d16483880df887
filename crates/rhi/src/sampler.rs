//! Texture samplers.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Filtering and addressing for a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    /// Linear filtering, repeating coordinates. Material textures.
    LinearRepeat,
    /// Linear filtering, clamped coordinates. Render targets read by later passes.
    LinearClamp,
}

impl SamplerKind {
    fn create_info(self) -> vk::SamplerCreateInfo<'static> {
        let (filter, address_mode) = match self {
            SamplerKind::LinearRepeat => (vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT),
            SamplerKind::LinearClamp => {
                (vk::Filter::LINEAR, vk::SamplerAddressMode::CLAMP_TO_EDGE)
            }
        };
        vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE)
    }
}

pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn new(device: Arc<Device>, kind: SamplerKind) -> RhiResult<Self> {
        let sampler = unsafe { device.handle().create_sampler(&kind.create_info(), None)? };
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}
