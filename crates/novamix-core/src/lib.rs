//! Novamix Core - Pure logic shared between the daemon and its device/audio
//! backends.
//!
//! Everything in this crate is testable without a headset or a running
//! PipeWire session: the mix model, the base-station report decoder, the
//! reconnect backoff schedule, and the connection state machine.

pub mod backoff;
pub mod mix;
pub mod report;
pub mod state;

pub use backoff::Backoff;
pub use mix::{GainPair, MixState};
pub use report::{DecodeError, PowerState, Report};
pub use state::{ConnectionState, ConnectionTracker, FailureKind};
