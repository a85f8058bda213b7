//! Main Entrypoint for the Robot Listener
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the capabilities (the desktop simulator, fed from stdin).
//! 3. Wiring the capture loop and dispatcher.
//! 4. Serving commands from the brain until Ctrl+C.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tutor_listener::{
    capture::CaptureLoop,
    config::Config,
    dispatcher::Dispatcher,
    recognition::RecognitionSlot,
    server::{ListenerState, serve},
    simulator::{SimulatedActuators, SimulatedRecognizer, spawn_stdin_feeder},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // --- 3. Build Capabilities ---
    let slot = RecognitionSlot::new();
    let recognizer = Arc::new(SimulatedRecognizer::new(slot.clone()));
    let actuators = Arc::new(SimulatedActuators::new(
        config.installed_behaviors.clone(),
        config.display_available,
    ));
    let _feeder = spawn_stdin_feeder(recognizer.clone());

    let dispatcher = Dispatcher::new(actuators, CaptureLoop::new(recognizer, slot));
    let state = Arc::new(ListenerState::new(dispatcher));

    // --- 4. Start Server ---
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(
        bind_address = %config.bind_address,
        behaviors = ?config.installed_behaviors,
        display = config.display_available,
        "Listener ready. Type recognized words on stdin as `<word> [confidence]`."
    );

    serve(listener, state, shutdown_signal()).await?;

    info!("Listener has shut down.");
    Ok(())
}
