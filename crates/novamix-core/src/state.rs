//! Device connection state machine.

use serde::{Deserialize, Serialize};

/// Consecutive failed enumerations before the connection degrades.
pub const NOT_FOUND_DEGRADE_THRESHOLD: u32 = 5;

/// Connection state of the base station, owned by the connection manager.
///
/// A read timeout never changes state. A read error drops the handle and
/// moves back to `Disconnected`; a permission failure moves to `Degraded`,
/// which rides the backoff schedule instead of retrying in a tight loop -
/// the condition usually means udev rules are missing, but it heals itself
/// once they are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No device handle; open will be retried
    #[default]
    Disconnected,
    /// An open attempt is in flight
    Connecting,
    /// Device handle is open and readable
    Connected,
    /// Opens keep failing for a configuration-level reason
    Degraded,
}

impl ConnectionState {
    /// Whether the loop should attempt an open in this state.
    #[must_use]
    pub fn wants_open(self) -> bool {
        matches!(self, Self::Disconnected | Self::Degraded)
    }

    /// Whether a device handle is currently held.
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Classification of a connection-manager failure, independent of the
/// HID library that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No report arrived within the read timeout
    Timeout,
    /// The device handle became invalid mid-read
    Disconnected,
    /// No supported device was present during enumeration
    NotFound,
    /// A matching device node refused to open
    PermissionDenied,
}

/// Drives [`ConnectionState`] transitions for the connection manager.
///
/// Pure state: the manager reports successes and classified failures,
/// the tracker decides the resulting state. Repeated `NotFound`
/// failures degrade after [`NOT_FOUND_DEGRADE_THRESHOLD`] strikes;
/// `PermissionDenied` degrades immediately; a `Timeout` changes nothing.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    consecutive_not_found: u32,
}

impl ConnectionTracker {
    /// Start in `Disconnected`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// An open attempt is starting.
    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// An open attempt succeeded.
    pub fn connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.consecutive_not_found = 0;
    }

    /// The handle was released deliberately.
    pub fn closed(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// An open or read failed; returns the resulting state.
    pub fn on_failure(&mut self, kind: FailureKind) -> ConnectionState {
        match kind {
            FailureKind::Timeout => {}
            FailureKind::Disconnected => self.state = ConnectionState::Disconnected,
            FailureKind::NotFound => {
                self.consecutive_not_found += 1;
                self.state = if self.consecutive_not_found >= NOT_FOUND_DEGRADE_THRESHOLD {
                    ConnectionState::Degraded
                } else {
                    ConnectionState::Disconnected
                };
            }
            FailureKind::PermissionDenied => self.state = ConnectionState::Degraded,
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionTracker::new().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_wants_open() {
        assert!(ConnectionState::Disconnected.wants_open());
        assert!(ConnectionState::Degraded.wants_open());
        assert!(!ConnectionState::Connecting.wants_open());
        assert!(!ConnectionState::Connected.wants_open());
    }

    #[test]
    fn test_timeout_leaves_state_unchanged() {
        let mut tracker = ConnectionTracker::new();
        tracker.connecting();
        tracker.connected();

        assert_eq!(tracker.on_failure(FailureKind::Timeout), ConnectionState::Connected);
        assert_eq!(tracker.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_read_error_disconnects() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected();

        assert_eq!(
            tracker.on_failure(FailureKind::Disconnected),
            ConnectionState::Disconnected
        );
        assert!(tracker.state().wants_open());
    }

    #[test]
    fn test_permission_denied_degrades_immediately() {
        let mut tracker = ConnectionTracker::new();
        tracker.connecting();

        assert_eq!(
            tracker.on_failure(FailureKind::PermissionDenied),
            ConnectionState::Degraded
        );
    }

    #[test]
    fn test_not_found_degrades_after_threshold() {
        let mut tracker = ConnectionTracker::new();

        for _ in 0..NOT_FOUND_DEGRADE_THRESHOLD - 1 {
            tracker.connecting();
            assert_eq!(tracker.on_failure(FailureKind::NotFound), ConnectionState::Disconnected);
        }

        tracker.connecting();
        assert_eq!(tracker.on_failure(FailureKind::NotFound), ConnectionState::Degraded);
    }

    #[test]
    fn test_device_absent_at_startup_then_recovers() {
        let mut tracker = ConnectionTracker::new();

        // Absent at startup: a couple of empty enumerations stay
        // Disconnected and keep asking for opens.
        for _ in 0..2 {
            tracker.connecting();
            tracker.on_failure(FailureKind::NotFound);
            assert!(tracker.state().wants_open());
        }

        // Device plugged in: next open succeeds without any restart.
        tracker.connecting();
        tracker.connected();
        assert!(tracker.state().is_connected());

        // The strike counter starts over afterwards.
        tracker.on_failure(FailureKind::Disconnected);
        for _ in 0..NOT_FOUND_DEGRADE_THRESHOLD - 1 {
            tracker.connecting();
            assert_eq!(tracker.on_failure(FailureKind::NotFound), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn test_degraded_recovers_on_success() {
        let mut tracker = ConnectionTracker::new();
        tracker.connecting();
        tracker.on_failure(FailureKind::PermissionDenied);
        assert_eq!(tracker.state(), ConnectionState::Degraded);

        // udev rules installed: the next open heals the connection.
        tracker.connecting();
        tracker.connected();
        assert!(tracker.state().is_connected());
    }

    #[test]
    fn test_explicit_close_is_plain_disconnect() {
        let mut tracker = ConnectionTracker::new();
        tracker.connected();
        tracker.closed();
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
        tracker.closed();
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
    }
}
