//! Result delivery back to the collector.

use anyhow::Context;
use chrono::{DateTime, Utc};
use fleetpoll_common::PollOutcome;
use serde::Serialize;
use std::path::Path;

const USER_AGENT: &str = concat!("fleetpoll/", env!("CARGO_PKG_VERSION"));
const DEBUG_ARTIFACT: &str = "fleetpoll_debug.json";

/// One cycle's submission body.
#[derive(Debug, Serialize)]
pub struct SubmissionDocument {
    pub results: Vec<PollOutcome>,
    pub time_taken_secs: f64,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionDocument {
    pub fn new(results: Vec<PollOutcome>, time_taken_secs: f64) -> Self {
        Self {
            results,
            time_taken_secs,
            submitted_at: Utc::now(),
        }
    }
}

pub struct Submitter {
    client: reqwest::Client,
    base_url: String,
}

impl Submitter {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn submit(&self, document: &SubmissionDocument) -> anyhow::Result<()> {
        let url = format!("{}/api/batch_poller", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(document)
            .send()
            .await
            .context("submission request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("collector rejected submission ({status}): {body}");
        }
        tracing::info!(
            results = document.results.len(),
            time_taken_secs = document.time_taken_secs,
            "cycle submitted"
        );
        Ok(())
    }
}

/// Debug mode sink: instead of submitting, write the cycle's document next
/// to the process for inspection.
pub fn write_debug_artifact(document: &SubmissionDocument) -> anyhow::Result<()> {
    let path = Path::new(DEBUG_ARTIFACT);
    let body = serde_json::to_vec_pretty(document).context("debug document serialization")?;
    std::fs::write(path, body)
        .with_context(|| format!("writing debug artifact {}", path.display()))?;
    tracing::info!(path = %path.display(), "debug artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetpoll_common::{SnmpError, SnmpResult};
    use std::collections::BTreeMap;

    #[test]
    fn document_serializes_results_and_errors_side_by_side() {
        let result = SnmpResult::from_values("10.0.0.1", BTreeMap::new());
        let error = SnmpError {
            ip: "10.0.0.2".to_string(),
            retryable: true,
            message: "timed out".to_string(),
        };
        let document = SubmissionDocument::new(
            vec![PollOutcome::Result(result), PollOutcome::Error(error)],
            1.5,
        );
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["results"][0]["kind"], "result");
        assert_eq!(json["results"][1]["kind"], "error");
        assert_eq!(json["time_taken_secs"], 1.5);
        assert!(json["submitted_at"].is_string());
    }

    #[test]
    fn user_agent_carries_crate_version() {
        assert!(USER_AGENT.starts_with("fleetpoll/"));
        assert!(USER_AGENT.len() > "fleetpoll/".len());
    }
}
