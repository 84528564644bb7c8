//! Novamix PipeWire - Sink tracking and volume control.
//!
//! This crate handles all interactions with PipeWire:
//! - Connecting to the PipeWire daemon from a dedicated thread
//! - Tracking the two target sinks ("game" and "chat") in the registry
//! - Applying gain pairs to those sinks via SPA `Props` parameters
//!
//! The daemon never creates or destroys the sinks themselves - they are
//! provisioned externally (typically as `pw-loopback` sinks) and may come
//! and go at any time.

pub mod error;
pub mod runtime;
pub mod targets;
pub mod volume;

pub use error::{PwError, PwResult};
pub use runtime::{ApplyOutcome, MixerEvent, MixerRuntime, TargetStatus};
pub use targets::{SinkRole, SinkTargets};
