//! The read-decode-apply control loop.
//!
//! Single logical thread of control: ensure the base station is connected,
//! block on the next report with a bounded timeout, decode it, map the
//! dial position to a gain pair, and apply it to the sinks before reading
//! again. Every failure feeds back into the reconnect/backoff path; the
//! only way out of the loop is the shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use novamix_core::report::{PowerState, Report};
use novamix_core::{Backoff, GainPair};
use novamix_hid::{HeadsetConnection, HidError};
use novamix_pipewire::{MixerRuntime, PwError, SinkRole, TargetStatus};

/// How long one device read blocks before the loop re-checks the
/// shutdown flag.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Granularity at which backoff sleeps observe the shutdown flag.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Drives the read-decode-apply cycle.
///
/// Device and audio failures back off on separate schedules; a headset
/// reconnect must not shorten the retry interval toward an audio server
/// that is still down, and vice versa.
pub struct Controller {
    connection: HeadsetConnection,
    mixer: MixerRuntime,
    shutdown: Arc<AtomicBool>,
    device_backoff: Backoff,
    audio_backoff: Backoff,
}

impl Controller {
    /// Create a controller over an initialized HID connection and a
    /// running mixer.
    #[must_use]
    pub fn new(
        connection: HeadsetConnection,
        mixer: MixerRuntime,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connection,
            mixer,
            shutdown,
            device_backoff: Backoff::new(),
            audio_backoff: Backoff::new(),
        }
    }

    /// Run until the shutdown flag is set.
    ///
    /// Releases the device handle and stops the mixer thread before
    /// returning.
    pub fn run(mut self) {
        info!("Control loop started");

        while !self.shutdown_requested() {
            if self.connection.state().wants_open() {
                self.try_open();
                continue;
            }

            match self.connection.read(READ_TIMEOUT) {
                Ok(raw) => self.handle_report(&raw),
                Err(HidError::ReadTimeout) => {
                    // Nothing arrived; the timeout exists so shutdown is
                    // observed within a bounded interval.
                }
                Err(e) => {
                    warn!(error = %e, "Device read failed, reconnecting");
                    self.connection.close();
                    sleep_backoff(&self.shutdown, &mut self.device_backoff);
                }
            }
        }

        info!("Control loop stopping");
        self.connection.close();
        self.mixer.shutdown();
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn try_open(&mut self) {
        match self.connection.open() {
            Ok(model) => {
                info!(model = model.name, "Listening for dial reports");
                self.device_backoff.reset();
            }
            Err(HidError::DeviceNotFound) => {
                debug!(
                    state = ?self.connection.state(),
                    "No base station present, retrying"
                );
                sleep_backoff(&self.shutdown, &mut self.device_backoff);
            }
            Err(e @ HidError::PermissionDenied { .. }) => {
                warn!(error = %e, "Cannot open base station");
                sleep_backoff(&self.shutdown, &mut self.device_backoff);
            }
            Err(e) => {
                warn!(error = %e, "Open failed");
                sleep_backoff(&self.shutdown, &mut self.device_backoff);
            }
        }
    }

    fn handle_report(&mut self, raw: &[u8]) {
        match Report::decode(raw) {
            Ok(Report::ChatMix(mix)) => {
                trace!(mix = mix.value(), "Dial moved");
                self.apply(GainPair::from_mix(mix));
            }
            Ok(Report::Power(PowerState::Off)) => {
                // The handle stays open; the base station keeps reporting
                // once the headset comes back.
                info!("Headset powered off");
            }
            Ok(Report::Power(PowerState::On)) => {
                info!("Headset powered on");
            }
            Ok(other) => trace!(report = ?other, "Ignoring report"),
            Err(e) => debug!(error = %e, len = raw.len(), "Skipping malformed report"),
        }
    }

    fn apply(&mut self, gains: GainPair) {
        match self.mixer.apply(gains) {
            Ok(outcome) => {
                self.audio_backoff.reset();
                for role in SinkRole::ALL {
                    if outcome.status(role) == TargetStatus::Missing {
                        debug!(
                            sink = role.label(),
                            "Target sink not present, volume not applied"
                        );
                    }
                }
            }
            Err(e @ PwError::Unavailable(_)) => {
                warn!(error = %e, "Audio server unreachable");
                sleep_backoff(&self.shutdown, &mut self.audio_backoff);
            }
            Err(e) => warn!(error = %e, "Volume update failed"),
        }
    }
}

/// Sleep for the schedule's next delay, waking early on shutdown.
fn sleep_backoff(shutdown: &AtomicBool, backoff: &mut Backoff) {
    let delay = backoff.next_delay();
    debug!(?delay, "Backing off");

    let mut remaining = delay;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A headset reconnect resets only the device schedule; an audio
    // server that has been down for a while keeps its long delay.
    #[test]
    fn test_device_success_leaves_audio_schedule_alone() {
        let mut device_backoff = Backoff::new();
        let mut audio_backoff = Backoff::new();

        for _ in 0..4 {
            audio_backoff.next_delay();
        }
        let audio_delay = audio_backoff.peek();

        device_backoff.next_delay();
        device_backoff.reset();

        assert_eq!(device_backoff.peek(), Backoff::INITIAL);
        assert_eq!(audio_backoff.peek(), audio_delay);
        assert!(audio_delay > Backoff::INITIAL);
    }

    #[test]
    fn test_sleep_backoff_wakes_on_shutdown() {
        let shutdown = AtomicBool::new(true);
        let mut backoff = Backoff::new();

        let start = std::time::Instant::now();
        sleep_backoff(&shutdown, &mut backoff);
        assert!(start.elapsed() < Backoff::INITIAL);
    }
}
