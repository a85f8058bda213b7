//! Usage analytics for hint generation calls.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// One hint-generation call, as written to the analytics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: i64,
    pub model_name: String,
    pub elapsed_seconds: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Receives usage records. Writes are best-effort; callers log and discard
/// any error instead of letting it reach the session.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, user_id: i64, model_name: &str, elapsed_seconds: f64) -> Result<()>;
}

/// Appends one JSON object per line to a file.
pub struct JsonlAnalyticsSink {
    path: PathBuf,
}

impl JsonlAnalyticsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AnalyticsSink for JsonlAnalyticsSink {
    async fn record(&self, user_id: i64, model_name: &str, elapsed_seconds: f64) -> Result<()> {
        let record = UsageRecord {
            user_id,
            model_name: model_name.to_string(),
            elapsed_seconds,
            recorded_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open analytics log {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(
            user_id,
            model = %model_name,
            response_time = %format!("{:.2}s", elapsed_seconds),
            "Logged analytics"
        );
        Ok(())
    }
}
