//! Main Entrypoint for the Tutor Brain
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the user and puzzle records.
//! 3. Choosing the hint generator for the configured provider.
//! 4. Checking that the robot listener answers, then running one session.

use anyhow::{Context, bail};
use async_openai::config::OpenAIConfig;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};
use tutor_brain::{
    channel::CommandChannel,
    config::{Config, HintProvider},
    robot::RobotProxy,
    session::{Collaborators, SessionController, SessionOutcome},
};
use tutor_core::{
    analytics::JsonlAnalyticsSink,
    hint::{CannedHintGenerator, DEFAULT_HINT_PROMPT, HintGenerator, LLMHintGenerator},
    store::RecordStore,
};

fn hint_generator(config: &Config) -> anyhow::Result<Arc<dyn HintGenerator>> {
    let (api_key, api_base) = match config.hint_provider {
        HintProvider::OpenAI => {
            info!("Using OpenAI provider for hints.");
            (
                config.openai_api_key.as_ref().context("OPENAI_API_KEY is not set")?,
                "https://api.openai.com/v1/",
            )
        }
        HintProvider::Gemini => {
            info!("Using Gemini provider for hints.");
            (
                config.gemini_api_key.as_ref().context("GEMINI_API_KEY is not set")?,
                "https://generativelanguage.googleapis.com/v1beta/openai",
            )
        }
        HintProvider::Canned => {
            info!("Using canned hints; no model will be called.");
            return Ok(Arc::new(CannedHintGenerator));
        }
    };

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key.expose_secret())
        .with_api_base(api_base);
    Ok(Arc::new(LLMHintGenerator::new(
        openai_config,
        config.hint_model.clone(),
        config.max_tokens_for_hint,
        DEFAULT_HINT_PROMPT.to_string(),
    )))
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
    info!("AI Brain application starting up...");

    // --- 3. Load Records ---
    let store = Arc::new(
        RecordStore::load(&config.users_path, &config.puzzles_path)
            .context("Failed to load user and puzzle records")?,
    );
    let usernames = store.usernames();
    info!(users = ?usernames, "Known users");

    // --- 4. Initialize Collaborators ---
    let collaborators = Collaborators {
        credentials: store.clone(),
        puzzles: store,
        hints: hint_generator(&config)?,
        analytics: Arc::new(JsonlAnalyticsSink::new(config.analytics_path.clone())),
    };

    // --- 5. Connect to the Listener ---
    let mut robot = RobotProxy::new(CommandChannel::new(
        config.listener_url.clone(),
        config.channel_timeout,
    ));
    if !robot.ping().await {
        error!(url = %config.listener_url, "Could not reach robot listener. Exiting.");
        bail!("robot listener at {} did not answer ping", config.listener_url);
    }

    // --- 6. Run the Session ---
    let session_id = uuid::Uuid::new_v4();
    let mut controller = SessionController::new(robot, collaborators, config.session_settings(usernames));
    let outcome = controller
        .run()
        .instrument(info_span!("session", session_id = %session_id))
        .await
        .context("Session aborted")?;

    match outcome {
        SessionOutcome::LoginFailed => info!(%session_id, "Session ended without a successful login."),
        SessionOutcome::Completed { solved, skipped } => {
            info!(%session_id, solved, skipped, "Session complete.")
        }
    }
    info!("AI Brain shutting down.");
    Ok(())
}
