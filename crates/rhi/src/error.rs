//! RHI-specific error types.

use ash::vk;
use thiserror::Error;
use vulkanisch_core::Error;

/// Errors raised by the Vulkan wrappers.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// WGSL parsing, validation or SPIR-V generation failed
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A size, offset or index outside what the object supports
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The allocator lock was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

impl From<RhiError> for Error {
    fn from(err: RhiError) -> Self {
        match err {
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DATE_KHR) => Error::StaleSurface,
            RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST) => {
                Error::DeviceLost(err.to_string())
            }
            RhiError::LoadingError(_) | RhiError::NoSuitableGpu | RhiError::SurfaceError(_) => {
                Error::Configuration(err.to_string())
            }
            _ => Error::ResourceCreation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DATE_KHR), Error::StaleSurface)]
    #[case(
        RhiError::NoSuitableGpu,
        Error::Configuration("No suitable GPU found".into())
    )]
    fn test_conversion(#[case] err: RhiError, #[case] expected: Error) {
        assert_eq!(Error::from(err), expected);
    }

    #[test]
    fn test_device_lost_is_fatal() {
        let err = Error::from(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(err, Error::DeviceLost(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_out_of_memory_is_resource_failure() {
        let err = Error::from(RhiError::VulkanError(
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        ));
        assert!(matches!(err, Error::ResourceCreation(_)));
    }
}
