//! PipeWire error types.

use thiserror::Error;

/// PipeWire error type.
#[derive(Debug, Error)]
pub enum PwError {
    #[error("PipeWire connection failed: {0}")]
    ConnectionFailed(String),

    #[error("MainLoop error: {0}")]
    MainLoopError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Failed to bind node {0}: {1}")]
    BindFailed(String, String),

    #[error("Volume control failed: {0}")]
    VolumeControlFailed(String),

    #[error("PipeWire unavailable: {0}")]
    Unavailable(String),
}

/// Result type for PipeWire operations.
pub type PwResult<T> = Result<T, PwError>;
