//! Error taxonomy for the frame loop.

use thiserror::Error;

/// Failure classes surfaced by the renderer.
///
/// Only [`Error::StaleSurface`] is recoverable; the surface lifecycle manager
/// consumes it internally and it never reaches the application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The presentable image chain no longer matches the window and must be rebuilt.
    #[error("surface is out of date")]
    StaleSurface,

    /// A GPU object could not be created or recorded (out of memory, bad parameters).
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    /// The device stopped responding or a completion wait timed out.
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// No usable device, surface format or settings were found at startup.
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether this error must abort the frame loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::StaleSurface)
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Error::ResourceCreation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result type alias using the renderer's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::StaleSurface, false)]
    #[case(Error::resource("oom"), true)]
    #[case(Error::DeviceLost("timeout".into()), true)]
    #[case(Error::config("no gpu"), true)]
    fn test_fatality(#[case] err: Error, #[case] fatal: bool) {
        assert_eq!(err.is_fatal(), fatal);
    }

    #[test]
    fn test_display_carries_reason() {
        let err = Error::config("no suitable surface format");
        assert_eq!(
            err.to_string(),
            "configuration failure: no suitable surface format"
        );
    }
}
