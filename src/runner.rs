// Run orchestration
// Wires one full execution: gauge poller up, batch through the controller,
// poller joined, post-run usage snapshot, aggregation.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::aggregate::{self, StressReport};
use crate::config::StressConfig;
use crate::controller;
use crate::gauge::{self, ConcurrencyGauge, GaugePoller, SNAPSHOT_TIMEOUT};
use crate::outcome::StreamOutcome;

/// Everything a run produces: the raw outcomes and the derived report.
pub struct RunOutput {
    pub outcomes: Vec<StreamOutcome>,
    pub report: StressReport,
}

/// Execute one full stress run against the configured target.
pub async fn run(config: &StressConfig) -> Result<RunOutput> {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(500)
        .build()
        .context("failed to build HTTP client")?;

    let gauge = Arc::new(ConcurrencyGauge::new());
    let poller = GaugePoller::spawn(client.clone(), config.target_url.clone());

    tracing::info!(
        "launching {} streams against {}",
        config.streams,
        config.target_url
    );
    let batch = controller::run_batch(&client, config, &gauge).await;
    tracing::info!(
        "batch complete in {:.2}s",
        batch.wall_clock.as_secs_f64()
    );

    // Poller must be joined before its peak is read
    let remote_streams_peak = poller.stop().await;
    let target_usage = gauge::fetch_usage(&client, &config.target_url, SNAPSHOT_TIMEOUT).await;

    let report = aggregate::build_report(
        &batch.outcomes,
        batch.wall_clock,
        gauge.peak(),
        remote_streams_peak,
        target_usage,
    );

    Ok(RunOutput {
        outcomes: batch.outcomes,
        report,
    })
}
