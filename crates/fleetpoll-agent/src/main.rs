mod config;
mod cycle;
mod fetch;
mod poll;
mod submit;

use anyhow::Result;
use config::AgentConfig;
use cycle::{CycleGate, Poller};
use fetch::Fetcher;
use fleetpoll_mapper::MapperRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use submit::{SubmissionDocument, Submitter};
use tokio::signal;
use tokio::time::interval;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleetpoll=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/fleetpoll.toml".to_string());
    let config = AgentConfig::load(&config_path)?;

    let base_url = config
        .collector_base_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("collector_base_url is not configured"))?;
    let base_url = base_url.trim_end_matches('/').to_string();

    let debug_mode = AgentConfig::debug_mode();
    tracing::info!(
        collector = %base_url,
        poll_interval_secs = config.poll_interval_secs,
        max_concurrent_polls = config.max_concurrent_polls,
        debug_mode,
        "fleetpoll-agent starting"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .gzip(true)
        .build()?;
    let fetcher = Fetcher::new(http.clone(), base_url.clone());
    let submitter = Submitter::new(http, base_url);

    let registry = Arc::new(MapperRegistry::new(
        config.routeros_api_tls,
        Duration::from_secs(config.routeros_connect_timeout_secs),
    ));
    let poller = Poller::new(
        registry,
        Duration::from_secs(config.snmp_timeout_secs),
        config.max_concurrent_polls,
    );
    let gate = CycleGate::new(Duration::from_secs(config.poll_interval_secs));

    let mut tick = interval(Duration::from_secs(config.tick_secs.max(1)));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if !gate.try_begin(Instant::now()) {
                    continue;
                }
                let halt = run_one_cycle(&fetcher, &poller, &submitter, debug_mode).await;
                gate.finish();
                if halt {
                    tracing::info!("debug cycle complete, halting");
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}

/// Runs one full fetch/poll/submit cycle. Returns true when the process
/// should halt (debug mode runs exactly one cycle).
async fn run_one_cycle(
    fetcher: &Fetcher,
    poller: &Poller,
    submitter: &Submitter,
    debug_mode: bool,
) -> bool {
    let inventory = match fetcher.fetch(debug_mode).await {
        Ok(inventory) => inventory,
        Err(e) => {
            tracing::warn!(error = %e, "inventory fetch failed, skipping cycle");
            return false;
        }
    };

    let device_count = inventory.devices.len();
    tracing::info!(devices = device_count, "cycle starting");
    let started = Instant::now();
    let outcomes = poller.run_cycle(inventory).await;
    let elapsed = started.elapsed();
    tracing::info!(
        devices = device_count,
        outcomes = outcomes.len(),
        elapsed_secs = elapsed.as_secs_f64(),
        "cycle finished"
    );

    if outcomes.is_empty() {
        tracing::debug!("no outcomes to submit");
        return halt_after_debug_cycle(debug_mode, 0);
    }

    let document = SubmissionDocument::new(outcomes, elapsed.as_secs_f64());
    if debug_mode {
        if let Err(e) = submit::write_debug_artifact(&document) {
            tracing::error!(error = %e, "failed to write debug artifact");
        }
        return halt_after_debug_cycle(debug_mode, document.results.len());
    }

    if let Err(e) = submitter.submit(&document).await {
        tracing::warn!(error = %e, "submission failed, dropping cycle results");
    }
    false
}

/// Debug mode halts only after a cycle that actually produced a document
/// to inspect; empty cycles keep the loop ticking.
fn halt_after_debug_cycle(debug_mode: bool, outcome_count: usize) -> bool {
    debug_mode && outcome_count > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_mode_keeps_running_until_a_cycle_produces_results() {
        assert!(!halt_after_debug_cycle(true, 0));
        assert!(halt_after_debug_cycle(true, 3));
        assert!(!halt_after_debug_cycle(false, 0));
        assert!(!halt_after_debug_cycle(false, 3));
    }
}
