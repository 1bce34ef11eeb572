//! Error types for the Galaxy3D runtime
//!
//! This module defines the error type used throughout the runtime: device-level
//! failures reported by the backend, setup/configuration errors detected before
//! the frame loop starts, and synchronization failures (hang, lost device).

use std::fmt;

/// Result type for Galaxy3D runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building pipelines, loading assets or binding resources.
///
/// Setup code returns `Result<T, SetupError>` so a caller (or a test harness)
/// can observe asset and configuration failures instead of the process exiting.
pub type SetupError = Error;

/// Galaxy3D runtime errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, ...)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, render context)
    InitializationFailed(String),

    /// Setup-time configuration error (missing asset, capacity overflow,
    /// operation not allowed in the current state)
    Configuration(String),

    /// Pipeline build failed
    PipelineBuild {
        /// Name of the pipeline being built
        pipeline: String,
        /// What went wrong
        reason: String,
    },

    /// A fence wait did not complete within its timeout
    DeviceHang {
        /// Fence name
        fence: String,
        /// Value that was waited for
        value: u64,
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The device was lost (driver reset, TDR, removed adapter)
    DeviceLost(String),
}

impl Error {
    /// Whether the error must terminate the frame loop.
    ///
    /// A hang is reported as recoverable: the caller may wait again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DeviceLost(_) | Error::BackendError(_) | Error::OutOfMemory
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::PipelineBuild { pipeline, reason } => {
                write!(f, "Failed to build pipeline '{}': {}", pipeline, reason)
            }
            Error::DeviceHang { fence, value, timeout_ms } => write!(
                f,
                "Device hang: fence '{}' did not reach {} within {} ms",
                fence, value, timeout_ms
            ),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
