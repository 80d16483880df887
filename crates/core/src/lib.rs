//! Shared foundations for the vulkanisch workspace.
//!
//! - The error taxonomy every layer reports through
//! - Logging bootstrap
//! - Frame timing

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::Timer;
