//! Frame loop configuration.

use std::time::Duration;

use ash::vk;
use vulkanisch_core::{Error, Result};

/// Tunables for the frame orchestrator.
///
/// Defaults: two frames in flight, FIFO presentation and an sRGB BGRA
/// surface format when available.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Size of the frame slot ring. Must be at least 2.
    pub frames_in_flight: usize,
    /// Upper bound on waiting for a frame slot (or an image's last slot) to retire.
    pub slot_wait_timeout: Duration,
    /// Upper bound on waiting for the surface to hand out an image.
    pub acquire_timeout: Duration,
    /// Presentation mode used when the surface supports it; FIFO otherwise.
    pub preferred_present_mode: vk::PresentModeKHR,
    /// Surface format tried first.
    pub preferred_format: vk::SurfaceFormatKHR,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            slot_wait_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
            preferred_present_mode: vk::PresentModeKHR::FIFO,
            preferred_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        }
    }
}

impl FrameConfig {
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_slot_wait_timeout(mut self, timeout: Duration) -> Self {
        self.slot_wait_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.preferred_present_mode = mode;
        self
    }

    /// Reject settings the frame loop cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a slot ring smaller than two or a
    /// zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight < 2 {
            return Err(Error::config(format!(
                "frames_in_flight must be at least 2, got {}",
                self.frames_in_flight
            )));
        }
        if self.slot_wait_timeout.is_zero() || self.acquire_timeout.is_zero() {
            return Err(Error::config("frame timeouts must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_valid() {
        let config = FrameConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn test_single_slot_ring_rejected(#[case] frames: usize) {
        let err = FrameConfig::default()
            .with_frames_in_flight(frames)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[rstest]
    #[case(FrameConfig::default().with_slot_wait_timeout(Duration::ZERO))]
    #[case(FrameConfig::default().with_acquire_timeout(Duration::ZERO))]
    fn test_zero_timeout_rejected(#[case] config: FrameConfig) {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_present_mode_preference_is_kept() {
        let config = FrameConfig::default().with_present_mode(vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.preferred_present_mode, vk::PresentModeKHR::MAILBOX);
        assert!(config.validate().is_ok());
    }
}
