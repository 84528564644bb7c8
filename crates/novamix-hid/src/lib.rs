//! Novamix HID - Arctis Nova base station integration.
//!
//! This crate owns the lifecycle of the HID device handle: enumeration by
//! vendor/product id, opening the vendor control interface, timed reads of
//! input reports, and the vendor commands that switch the dial into
//! ChatMix mode on models that support it.
//!
//! Device-node permissions are expected to be provisioned externally (a
//! udev rule shipped with the package); when they are missing the
//! connection degrades instead of failing hard.

pub mod device;
pub mod error;

pub use device::{DeviceModel, HeadsetConnection, STEELSERIES_VID};
pub use error::{HidError, HidResult};
