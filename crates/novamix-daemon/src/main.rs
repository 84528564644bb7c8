//! Novamix Daemon - ChatMix dial to PipeWire volume bridge.
//!
//! This is the main entry point for the novamix daemon, which reads the
//! ChatMix dial of an Arctis Nova base station and applies it as
//! independent volumes on the game and chat sinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod signals;

use controller::Controller;
use novamix_hid::HeadsetConnection;
use novamix_pipewire::{MixerEvent, MixerRuntime};

/// How long startup waits for the first PipeWire connection.
const PIPEWIRE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for the control loop to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("novamix_daemon=debug".parse()?)
                .add_directive("novamix_hid=debug".parse()?)
                .add_directive("novamix_pipewire=debug".parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting novamix daemon");

    // Load configuration
    let config = config::load_config()?;
    let targets = config.sinks.targets();
    info!(game = %targets.game, chat = %targets.chat, "Configuration loaded");

    // Spawn the PipeWire mixer thread
    let (mixer, mut mixer_events) = MixerRuntime::spawn(targets);

    // Wait briefly for the PipeWire connection; a slow or absent server
    // is not fatal, volume updates just back off until it appears.
    match tokio::time::timeout(PIPEWIRE_CONNECT_TIMEOUT, mixer_events.recv()).await {
        Ok(Some(MixerEvent::Connected)) => info!("PipeWire connected"),
        Ok(Some(_)) | Ok(None) | Err(_) => {
            warn!("PipeWire not connected yet, continuing anyway");
        }
    }

    // Keep logging sink appearance/removal for the life of the daemon
    tokio::spawn(async move {
        while let Some(event) = mixer_events.recv().await {
            match event {
                MixerEvent::Connected => info!("PipeWire connected"),
                MixerEvent::Disconnected => warn!("PipeWire connection lost, reconnecting"),
                MixerEvent::TargetAppeared { role, name, id } => {
                    info!(sink = role.label(), name = %name, id, "Target sink available");
                }
                MixerEvent::TargetRemoved { role, id } => {
                    warn!(sink = role.label(), id, "Target sink gone");
                }
            }
        }
    });

    // Initialize the HID subsystem; the device itself may be absent,
    // the control loop keeps retrying.
    let connection = HeadsetConnection::new().context("Failed to initialize HID subsystem")?;

    // Run the control loop on a blocking task
    let shutdown = Arc::new(AtomicBool::new(false));
    let controller = Controller::new(connection, mixer, Arc::clone(&shutdown));
    let mut loop_handle = tokio::task::spawn_blocking(move || controller.run());

    // Set up signal handling
    let mut shutdown_rx = signals::setup_signal_handlers()?;

    info!("Daemon running. Press Ctrl+C to exit.");

    tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::Relaxed);

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut loop_handle).await {
                Ok(Ok(())) => info!("Control loop stopped"),
                Ok(Err(e)) => error!(error = %e, "Control loop task failed"),
                Err(_) => {
                    warn!("Control loop did not stop in time, aborting");
                    loop_handle.abort();
                }
            }
        }

        result = &mut loop_handle => {
            // The loop only returns on its own if something went badly
            // wrong; the service manager restarts us.
            match result {
                Ok(()) => warn!("Control loop exited unexpectedly"),
                Err(e) => error!(error = %e, "Control loop panicked"),
            }
        }
    }

    info!("novamix daemon stopped");
    Ok(())
}
