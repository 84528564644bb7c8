//! Base station detection and connection management.

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, info, warn};

use novamix_core::report::REPORT_LEN;
use novamix_core::{ConnectionState, ConnectionTracker, FailureKind};

use crate::error::{HidError, HidResult};

/// SteelSeries USB Vendor ID
pub const STEELSERIES_VID: u16 = 0x1038;

/// Vendor command: enable/disable ChatMix dial mode.
const CMD_CHATMIX_ENABLE: u8 = 0x49;
/// Vendor command: light up the Sonar icon on the base station display.
const CMD_SONAR_ICON: u8 = 0x8D;

/// A supported Arctis Nova base station model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    /// Human-readable model name
    pub name: &'static str,
    /// USB Product ID
    pub pid: u16,
    /// bInterfaceNumber of the vendor control interface
    pub interface: i32,
    /// Direction byte for commands to the base station, if the model
    /// accepts any
    pub tx: Option<u8>,
}

/// Models the daemon knows how to talk to.
pub const SUPPORTED_MODELS: &[DeviceModel] = &[
    DeviceModel { name: "Arctis Nova Pro Wireless", pid: 0x12E0, interface: 4, tx: Some(0x06) },
    DeviceModel { name: "Arctis Nova 5X", pid: 0x2253, interface: 5, tx: None },
];

/// Look up a supported model by product id.
#[must_use]
pub fn find_model(pid: u16) -> Option<&'static DeviceModel> {
    SUPPORTED_MODELS.iter().find(|m| m.pid == pid)
}

/// Build a zero-padded 64-byte command message.
#[must_use]
fn build_command(tx: u8, opcode: u8, args: &[u8]) -> [u8; REPORT_LEN] {
    let mut msg = [0u8; REPORT_LEN];
    msg[0] = tx;
    msg[1] = opcode;
    msg[2..2 + args.len()].copy_from_slice(args);
    msg
}

/// Owns the HID handle for the base station.
///
/// The handle is valid only between a successful [`open`](Self::open) and
/// the next fatal read error or explicit [`close`](Self::close); it is
/// never shared. State transitions are delegated to [`ConnectionTracker`]
/// so the policy stays testable without hardware.
pub struct HeadsetConnection {
    api: HidApi,
    device: Option<HidDevice>,
    model: Option<&'static DeviceModel>,
    tracker: ConnectionTracker,
}

impl HeadsetConnection {
    /// Initialize the HID subsystem. No device is opened yet.
    ///
    /// # Errors
    /// Returns an error if the hidapi context cannot be created.
    pub fn new() -> HidResult<Self> {
        let api = HidApi::new()?;
        Ok(Self { api, device: None, model: None, tracker: ConnectionTracker::new() })
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.tracker.state()
    }

    /// The model of the currently (or last) opened base station.
    #[must_use]
    pub fn model(&self) -> Option<&'static DeviceModel> {
        self.model
    }

    /// Search for a supported base station and open its control interface.
    ///
    /// On success the connection moves to `Connected` and, where the model
    /// supports it, the dial is switched into ChatMix mode.
    ///
    /// # Errors
    /// `DeviceNotFound` when no supported base station is present,
    /// `PermissionDenied` when a matching device node refused to open.
    pub fn open(&mut self) -> HidResult<&'static DeviceModel> {
        self.tracker.connecting();

        if let Err(e) = self.api.refresh_devices() {
            warn!(error = %e, "HID enumeration failed");
        }

        let Some((path, model)) = self.api.device_list().find_map(|info| {
            let model = find_model(info.product_id())?;
            (info.vendor_id() == STEELSERIES_VID && info.interface_number() == model.interface)
                .then(|| (info.path().to_owned(), model))
        }) else {
            self.tracker.on_failure(FailureKind::NotFound);
            return Err(HidError::DeviceNotFound);
        };

        let device = match self.api.open_path(&path) {
            Ok(device) => device,
            Err(e) => {
                // The node exists but refused to open: the udev rule is
                // not installed (or not yet applied to this device).
                debug!(error = %e, model = model.name, "Open refused");
                self.tracker.on_failure(FailureKind::PermissionDenied);
                return Err(HidError::PermissionDenied {
                    path: path.to_string_lossy().into_owned(),
                });
            }
        };

        info!(model = model.name, "Base station connected");
        self.device = Some(device);
        self.model = Some(model);
        self.tracker.connected();

        self.set_chatmix_mode(true);
        self.set_sonar_icon(true);

        Ok(model)
    }

    /// Block up to `timeout` for the next input report.
    ///
    /// # Errors
    /// `ReadTimeout` when no data arrived (state unchanged),
    /// `Disconnected` when the handle became invalid (it is dropped and
    /// the state returns to `Disconnected`).
    pub fn read(&mut self, timeout: Duration) -> HidResult<Vec<u8>> {
        let Some(device) = self.device.as_ref() else {
            return Err(HidError::Disconnected("no open device".into()));
        };

        let mut buf = [0u8; REPORT_LEN];
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        match device.read_timeout(&mut buf, millis) {
            Ok(0) => {
                self.tracker.on_failure(FailureKind::Timeout);
                Err(HidError::ReadTimeout)
            }
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) => {
                warn!(error = %e, "Read failed, dropping device handle");
                self.device = None;
                self.tracker.on_failure(FailureKind::Disconnected);
                Err(HidError::Disconnected(e.to_string()))
            }
        }
    }

    /// Release the device handle. Idempotent.
    ///
    /// Where the model supports commands, the dial is switched back out of
    /// ChatMix mode first so the headset's own volume control keeps
    /// working after the daemon exits.
    pub fn close(&mut self) {
        if self.device.is_some() {
            self.set_chatmix_mode(false);
            self.set_sonar_icon(false);
            info!("Base station handle released");
        }
        self.device = None;
        self.tracker.closed();
    }

    /// Enable or disable ChatMix dial mode. Best effort; RX-only models
    /// ignore this.
    fn set_chatmix_mode(&self, enabled: bool) {
        self.send_command(CMD_CHATMIX_ENABLE, &[u8::from(enabled)]);
    }

    /// Toggle the Sonar icon on the base station display. Best effort.
    fn set_sonar_icon(&self, enabled: bool) {
        self.send_command(CMD_SONAR_ICON, &[u8::from(enabled)]);
    }

    fn send_command(&self, opcode: u8, args: &[u8]) {
        let (Some(device), Some(model)) = (self.device.as_ref(), self.model) else {
            return;
        };
        let Some(tx) = model.tx else {
            return;
        };

        let msg = build_command(tx, opcode, args);
        match device.write(&msg) {
            Ok(_) => debug!(opcode = format_args!("{opcode:#04x}"), "Command sent"),
            Err(e) => {
                debug!(opcode = format_args!("{opcode:#04x}"), error = %e, "Command failed");
            }
        }
    }
}

impl Drop for HeadsetConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_model_known_pids() {
        assert_eq!(find_model(0x12E0).unwrap().name, "Arctis Nova Pro Wireless");
        assert_eq!(find_model(0x2253).unwrap().name, "Arctis Nova 5X");
        assert!(find_model(0xFFFF).is_none());
    }

    #[test]
    fn test_rx_only_model_has_no_tx() {
        assert_eq!(find_model(0x2253).unwrap().tx, None);
        assert_eq!(find_model(0x12E0).unwrap().tx, Some(0x06));
    }

    #[test]
    fn test_build_command_layout() {
        let msg = build_command(0x06, CMD_CHATMIX_ENABLE, &[1]);
        assert_eq!(msg.len(), REPORT_LEN);
        assert_eq!(msg[0], 0x06);
        assert_eq!(msg[1], CMD_CHATMIX_ENABLE);
        assert_eq!(msg[2], 1);
        assert!(msg[3..].iter().all(|&b| b == 0));
    }
}
