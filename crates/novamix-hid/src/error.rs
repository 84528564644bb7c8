//! HID error types.

use thiserror::Error;

/// HID error type.
#[derive(Debug, Error)]
pub enum HidError {
    #[error("No supported base station found")]
    DeviceNotFound,

    #[error("Permission denied opening {path} - check udev rules")]
    PermissionDenied { path: String },

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("HID subsystem error: {0}")]
    Api(#[from] hidapi::HidError),
}

impl HidError {
    /// Whether this error invalidates the current device handle.
    #[must_use]
    pub fn is_fatal_for_handle(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Result type for HID operations.
pub type HidResult<T> = Result<T, HidError>;
