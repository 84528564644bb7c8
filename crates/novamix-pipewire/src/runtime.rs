//! PipeWire mixer runtime.
//!
//! Runs the PipeWire main loop in a dedicated thread (the `pipewire` crate
//! is not thread-safe), tracks the two target sinks through the registry,
//! and applies gain updates sent in from the control loop. Every apply is
//! acknowledged synchronously so the caller never reads the next dial
//! report before the previous gains landed.
//!
//! The thread outlives the server: each connection is one session, and
//! when the core reports an error (server shutdown or restart) the session
//! ends, bound sinks are dropped, and a new connection is attempted on the
//! shared backoff schedule. Applies sent between sessions are answered
//! immediately with an unavailable error instead of timing out.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use pipewire::context::ContextRc;
use pipewire::main_loop::MainLoopRc;
use pipewire::registry::{GlobalObject, RegistryRc};
use pipewire::spa::utils::dict::DictRef;
use pipewire::types::ObjectType;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use libspa::param::ParamType;
use libspa::pod::Pod;
use novamix_core::{Backoff, GainPair};

use crate::error::{PwError, PwResult};
use crate::targets::{SinkRole, SinkTargets};
use crate::volume::volume_props_pod;

/// How long an apply waits for the loop to acknowledge.
const APPLY_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long one main-loop iteration blocks before pending control
/// requests are serviced.
const LOOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What happened to one target during an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// Volume parameter was sent to the sink
    Applied,
    /// Gain identical to the last applied value; nothing sent
    Unchanged,
    /// The sink is not currently present in the graph
    Missing,
}

/// Per-target result of one apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Outcome for the game sink
    pub game: TargetStatus,
    /// Outcome for the chat sink
    pub chat: TargetStatus,
}

impl ApplyOutcome {
    /// Outcome for a role.
    #[must_use]
    pub fn status(&self, role: SinkRole) -> TargetStatus {
        match role {
            SinkRole::Game => self.game,
            SinkRole::Chat => self.chat,
        }
    }

    fn set(&mut self, role: SinkRole, status: TargetStatus) {
        match role {
            SinkRole::Game => self.game = status,
            SinkRole::Chat => self.chat = status,
        }
    }
}

/// Events emitted by the mixer runtime.
#[derive(Debug, Clone)]
pub enum MixerEvent {
    /// PipeWire connection established
    Connected,
    /// The PipeWire connection was lost; a reconnect is underway
    Disconnected,
    /// A target sink appeared in the graph
    TargetAppeared { role: SinkRole, name: String, id: u32 },
    /// A target sink left the graph
    TargetRemoved { role: SinkRole, id: u32 },
}

enum MixerRequest {
    Apply { seq: u64, gains: GainPair },
    Shutdown,
}

enum ApplyError {
    NotConnected,
    Failed(String),
}

/// Ack for one apply request, tagged with the request's sequence number
/// so a late ack from a timed-out apply can never satisfy a newer one.
struct MixerResponse {
    seq: u64,
    result: Result<ApplyOutcome, ApplyError>,
}

/// Handle to the mixer thread for the rest of the daemon.
pub struct MixerRuntime {
    request_tx: std_mpsc::Sender<MixerRequest>,
    response_rx: std_mpsc::Receiver<MixerResponse>,
    next_seq: AtomicU64,
}

impl MixerRuntime {
    /// Spawn the mixer thread and return a handle plus its event stream.
    #[must_use]
    pub fn spawn(targets: SinkTargets) -> (Self, mpsc::Receiver<MixerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (request_tx, request_internal_rx) = std_mpsc::channel();
        let (response_internal_tx, response_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("novamix-pipewire".to_string())
            .spawn(move || {
                run_mixer_thread(&targets, &event_tx, &request_internal_rx, &response_internal_tx);
            })
            .expect("Failed to spawn PipeWire mixer thread");

        (Self { request_tx, response_rx, next_seq: AtomicU64::new(0) }, event_rx)
    }

    /// Apply a gain pair to both target sinks and wait for the ack.
    ///
    /// A target that is currently absent from the graph comes back as
    /// [`TargetStatus::Missing`] in the outcome; the other target is still
    /// applied. Re-applying an identical pair is a no-op per target.
    ///
    /// # Errors
    /// [`PwError::Unavailable`] when the mixer loop is gone, disconnected
    /// from the server, or does not acknowledge in time;
    /// [`PwError::VolumeControlFailed`] when the parameter update itself
    /// failed.
    pub fn apply(&self, gains: GainPair) -> PwResult<ApplyOutcome> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.request_tx
            .send(MixerRequest::Apply { seq, gains })
            .map_err(|_| PwError::Unavailable("mixer loop has exited".to_string()))?;

        let deadline = Instant::now() + APPLY_ACK_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) if response.seq == seq => {
                    return match response.result {
                        Ok(outcome) => Ok(outcome),
                        Err(ApplyError::NotConnected) => {
                            Err(PwError::Unavailable("not connected to PipeWire".to_string()))
                        }
                        Err(ApplyError::Failed(e)) => Err(PwError::VolumeControlFailed(e)),
                    };
                }
                Ok(stale) => {
                    // Ack of an apply that already timed out; drop it and
                    // keep waiting for ours.
                    trace!(seq = stale.seq, expected = seq, "Discarding stale ack");
                }
                Err(_) => {
                    return Err(PwError::Unavailable(
                        "no acknowledgment from mixer loop".to_string(),
                    ));
                }
            }
        }
    }

    /// Request shutdown of the mixer thread.
    pub fn shutdown(&self) {
        let _ = self.request_tx.send(MixerRequest::Shutdown);
    }
}

/// A target sink currently bound in the graph.
struct BoundSink {
    node: pipewire::node::Node,
    role: SinkRole,
    channels: usize,
    /// Last gain actually sent to this sink
    last_gain: Option<f32>,
}

/// Whether a gain differs from the last one sent to a sink.
///
/// A fresh binding (`None`) always needs an update, so re-bound sinks get
/// the current gain even if it equals what was sent before the re-bind.
fn needs_update(last_gain: Option<f32>, gain: f32) -> bool {
    last_gain != Some(gain)
}

/// Why a session ended.
enum SessionEnd {
    Shutdown,
    Disconnected,
}

fn run_mixer_thread(
    targets: &SinkTargets,
    event_tx: &mpsc::Sender<MixerEvent>,
    request_rx: &std_mpsc::Receiver<MixerRequest>,
    response_tx: &std_mpsc::Sender<MixerResponse>,
) {
    pipewire::init();

    info!("PipeWire mixer starting...");
    let mut backoff = Backoff::new();

    loop {
        match run_session(targets, event_tx, request_rx, response_tx) {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Disconnected) => {
                // The session was live, so the next one starts fresh.
                backoff.reset();
                warn!("PipeWire connection lost, reconnecting");
                let _ = event_tx.blocking_send(MixerEvent::Disconnected);
            }
            Err(e) => warn!(error = %e, "PipeWire connection failed"),
        }

        let delay = backoff.next_delay();
        debug!(?delay, "Waiting before PipeWire reconnect");
        if let SessionEnd::Shutdown = wait_reconnect(request_rx, response_tx, delay) {
            break;
        }
    }

    info!("PipeWire mixer exiting");
}

/// Answer control requests while disconnected, for one backoff delay.
///
/// Applies get an immediate not-connected ack so the control loop's
/// five-second ack wait never runs against an empty session.
fn wait_reconnect(
    request_rx: &std_mpsc::Receiver<MixerRequest>,
    response_tx: &std_mpsc::Sender<MixerResponse>,
    delay: Duration,
) -> SessionEnd {
    let deadline = Instant::now() + delay;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return SessionEnd::Disconnected;
        }
        match request_rx.recv_timeout(remaining) {
            Ok(MixerRequest::Apply { seq, .. }) => {
                let _ = response_tx
                    .send(MixerResponse { seq, result: Err(ApplyError::NotConnected) });
            }
            Ok(MixerRequest::Shutdown) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                return SessionEnd::Shutdown;
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => return SessionEnd::Disconnected,
        }
    }
}

/// One connection to the server: connect, watch the registry, serve
/// requests until shutdown or a core error.
fn run_session(
    targets: &SinkTargets,
    event_tx: &mpsc::Sender<MixerEvent>,
    request_rx: &std_mpsc::Receiver<MixerRequest>,
    response_tx: &std_mpsc::Sender<MixerResponse>,
) -> PwResult<SessionEnd> {
    let main_loop = MainLoopRc::new(None)
        .map_err(|e| PwError::MainLoopError(format!("Failed to create main loop: {e}")))?;

    let context = ContextRc::new(&main_loop, None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to create context: {e}")))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to connect: {e}")))?;

    let registry = core
        .get_registry_rc()
        .map_err(|e| PwError::RegistryError(format!("Failed to get registry: {e}")))?;

    info!(game = %targets.game, chat = %targets.chat, "Connected to PipeWire");
    let _ = event_tx.blocking_send(MixerEvent::Connected);

    // A core error means the connection to the server is gone (or going);
    // the flag ends this session and with it every bound proxy, so a stale
    // node can never swallow volume updates after a server restart.
    let connection_lost = Rc::new(Cell::new(false));
    let connection_lost_core = Rc::clone(&connection_lost);

    let _core_listener = core
        .add_listener_local()
        .error(move |id, seq, res, message| {
            warn!(id, seq, res, message, "PipeWire core error");
            connection_lost_core.set(true);
        })
        .register();

    // Bound target sinks by registry global id. Scoped to this session:
    // a reconnect starts with an empty map and no cached gains.
    let sinks: Rc<RefCell<HashMap<u32, BoundSink>>> = Rc::new(RefCell::new(HashMap::new()));
    let sinks_global = Rc::clone(&sinks);
    let sinks_remove = Rc::clone(&sinks);

    let targets_global = targets.clone();
    let event_tx_global = event_tx.clone();
    let event_tx_remove = event_tx.clone();
    let registry_bind = registry.clone();

    let _listener = registry
        .add_listener_local()
        .global(move |global| {
            handle_global(&targets_global, &registry_bind, &sinks_global, &event_tx_global, global);
        })
        .global_remove(move |id| {
            if let Some(sink) = sinks_remove.borrow_mut().remove(&id) {
                warn!(role = sink.role.label(), id, "Target sink left the graph");
                let _ = event_tx_remove
                    .blocking_send(MixerEvent::TargetRemoved { role: sink.role, id });
            }
        })
        .register();

    loop {
        // Service pending control requests between loop iterations.
        while let Ok(request) = request_rx.try_recv() {
            match request {
                MixerRequest::Apply { seq, gains } => {
                    let result =
                        apply_gains(&sinks, gains).map_err(|e| ApplyError::Failed(e.to_string()));
                    let _ = response_tx.send(MixerResponse { seq, result });
                }
                MixerRequest::Shutdown => {
                    info!("Mixer received shutdown request");
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }

        if connection_lost.get() {
            return Ok(SessionEnd::Disconnected);
        }

        main_loop.loop_().iterate(LOOP_POLL_INTERVAL);
    }
}

fn handle_global(
    targets: &SinkTargets,
    registry: &RegistryRc,
    sinks: &Rc<RefCell<HashMap<u32, BoundSink>>>,
    event_tx: &mpsc::Sender<MixerEvent>,
    global: &GlobalObject<&DictRef>,
) {
    if global.type_ != ObjectType::Node {
        return;
    }

    let props = global.props.as_ref();

    let Some(name) = props.and_then(|p| p.get("node.name")) else {
        return;
    };
    let Some(role) = targets.role_of(name) else {
        return;
    };

    let media_class = props.and_then(|p| p.get("media.class"));
    if !media_class.is_some_and(|c| c.contains("Sink")) {
        debug!(name, class = ?media_class, "Name matches a target but is not a sink");
        return;
    }

    let channels = props
        .and_then(|p| p.get("audio.channels"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);

    let node = match registry.bind::<pipewire::node::Node, _>(global) {
        Ok(node) => node,
        Err(e) => {
            let err = PwError::BindFailed(name.to_string(), e.to_string());
            warn!(error = %err, "Cannot control target sink");
            return;
        }
    };

    info!(role = role.label(), name, id = global.id, "Target sink appeared");

    sinks.borrow_mut().insert(
        global.id,
        BoundSink { node, role, channels, last_gain: None },
    );

    let _ = event_tx.blocking_send(MixerEvent::TargetAppeared {
        role,
        name: name.to_string(),
        id: global.id,
    });
}

fn apply_gains(
    sinks: &Rc<RefCell<HashMap<u32, BoundSink>>>,
    gains: GainPair,
) -> PwResult<ApplyOutcome> {
    let mut outcome =
        ApplyOutcome { game: TargetStatus::Missing, chat: TargetStatus::Missing };

    let mut sinks = sinks.borrow_mut();
    for role in SinkRole::ALL {
        let gain = match role {
            SinkRole::Game => gains.game,
            SinkRole::Chat => gains.chat,
        };

        let Some(sink) = sinks.values_mut().find(|s| s.role == role) else {
            continue;
        };

        if !needs_update(sink.last_gain, gain) {
            outcome.set(role, TargetStatus::Unchanged);
            continue;
        }

        let bytes = volume_props_pod(gain, sink.channels)?;
        let pod = Pod::from_bytes(&bytes).ok_or_else(|| {
            PwError::VolumeControlFailed("serialized pod failed validation".to_string())
        })?;

        sink.node.set_param(ParamType::Props, 0, pod);
        sink.last_gain = Some(gain);
        outcome.set(role, TargetStatus::Applied);

        debug!(role = role.label(), gain, "Volume applied");
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_gain_needs_no_update() {
        assert!(!needs_update(Some(0.5), 0.5));
    }

    #[test]
    fn test_changed_gain_needs_update() {
        assert!(needs_update(Some(0.5), 0.25));
    }

    #[test]
    fn test_fresh_binding_needs_update() {
        assert!(needs_update(None, 0.5));
    }
}
