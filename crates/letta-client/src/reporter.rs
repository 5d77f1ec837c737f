//! Progress reports for long-running tasks.

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{build_http_client, ensure_success};
use crate::config::LettaConfig;
use crate::error::{LettaError, Result, TransportError};

/// State of the reported task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct ProgressReport<'a> {
    chat_id: &'a str,
    message_id: &'a str,
    content: &'a str,
    metadata: ProgressMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
struct ProgressMetadata {
    progress: f64,
    status: ProgressStatus,
}

/// Posts progress updates to the agent's progress endpoint.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    config: LettaConfig,
}

impl ProgressReporter {
    pub fn new(config: LettaConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(LettaConfig::load())
    }

    /// Send one report. `progress` is clamped into `0.0..=1.0`.
    ///
    /// Returns the agent's JSON reply.
    pub async fn send_progress_report(
        &self,
        chat_id: &str,
        message_id: &str,
        content: &str,
        progress: f64,
        status: ProgressStatus,
    ) -> Result<Value> {
        let credentials = self.config.credentials().await?;
        let url = self.config.progress_url()?;

        let report = ProgressReport {
            chat_id,
            message_id,
            content,
            metadata: ProgressMetadata {
                progress: clamp_progress(progress),
                status,
            },
        };

        let http = build_http_client(&self.config, &url)?;
        debug!(url = %url, chat_id, ?status, "sending progress report");

        let response = http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Agent-ID", &credentials.agent_id)
            .header("X-Agent-Password", &credentials.password)
            .json(&report)
            .send()
            .await
            .map_err(|source| TransportError::Connection {
                url: url.clone(),
                source,
            })?;

        let response = ensure_success(&url, response).await?;
        response.json::<Value>().await.map_err(|source| {
            LettaError::from(TransportError::Decode {
                url: url.clone(),
                source,
            })
        })
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}
