// Batch launcher
// Spawns every stream as its own task, optionally staggering starts over a
// ramp window, and only returns once all of them have resolved. A task that
// dies without producing an outcome is folded back in as a synthetic failure
// so the batch itself can never abort early.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

use crate::config::StressConfig;
use crate::error::StreamError;
use crate::gauge::ConcurrencyGauge;
use crate::outcome::StreamOutcome;
use crate::worker;

/// All outcomes of one batch plus the wall clock spanning it.
pub struct BatchResult {
    pub outcomes: Vec<StreamOutcome>,
    pub wall_clock: Duration,
}

/// Start delay for stream `index` when `streams` launches are spread over a
/// `ramp_ms` window. Zero ramp means every stream starts immediately.
pub fn start_delay(ramp_ms: u64, streams: usize, index: usize) -> Duration {
    if ramp_ms == 0 {
        return Duration::ZERO;
    }
    let per_stream_ms = ramp_ms as f64 / streams.max(1) as f64;
    Duration::from_secs_f64(per_stream_ms * index as f64 / 1000.0)
}

/// Launch the full batch and wait for every stream to finish.
pub async fn run_batch(
    client: &reqwest::Client,
    config: &StressConfig,
    gauge: &Arc<ConcurrencyGauge>,
) -> BatchResult {
    let origin = Instant::now();

    let mut handles = Vec::with_capacity(config.streams);
    for i in 0..config.streams {
        let client = client.clone();
        let config = config.clone();
        let gauge = gauge.clone();
        let delay = start_delay(config.ramp_ms, config.streams, i);

        handles.push(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = worker::run_stream(&client, &config, i, &gauge, origin).await;
            gauge.observe_peak();
            outcome
        }));
    }

    let mut outcomes = Vec::with_capacity(config.streams);
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => outcomes.push(StreamOutcome::failed(i, join_failure_text(err))),
        }
    }

    BatchResult {
        outcomes,
        wall_clock: origin.elapsed(),
    }
}

fn join_failure_text(err: JoinError) -> String {
    if err.is_cancelled() {
        StreamError::Cancelled.to_string()
    } else {
        format!("panic: {}", err)
    }
}
