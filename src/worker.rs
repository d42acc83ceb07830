// Single-stream measurement
// Opens one streaming request, consumes the body as an opaque byte stream,
// and classifies whatever goes wrong. Failures never escape this module as
// errors; they come back as data inside the StreamOutcome.

use futures::StreamExt;
use std::time::Instant;

use crate::config::StressConfig;
use crate::error::StreamError;
use crate::gauge::ConcurrencyGauge;
use crate::outcome::StreamOutcome;
use crate::request::build_request_body;

const ERROR_BODY_MAX_CHARS: usize = 200;

/// Holds the in-flight count up for the life of one stream; the decrement
/// must run on every exit path, unwinds included.
struct InFlightGuard<'a>(&'a ConcurrencyGauge);

impl<'a> InFlightGuard<'a> {
    fn new(gauge: &'a ConcurrencyGauge) -> Self {
        gauge.increment();
        Self(gauge)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Run one streaming request to completion and record its metrics.
///
/// The gauge is incremented before the request is issued and decremented on
/// every exit path, with `duration_ms` stamped at the same point.
/// `run_origin` anchors the chunk timestamps to the run's monotonic clock.
pub async fn run_stream(
    client: &reqwest::Client,
    config: &StressConfig,
    stream_id: usize,
    gauge: &ConcurrencyGauge,
    run_origin: Instant,
) -> StreamOutcome {
    let mut outcome = StreamOutcome::new(stream_id);

    let t0 = Instant::now();
    let _in_flight = InFlightGuard::new(gauge);

    if let Err(err) = consume_stream(client, config, stream_id, &mut outcome, t0, run_origin).await
    {
        outcome.error = err.to_string();
        tracing::debug!("stream {} failed: {}", stream_id, outcome.error);
    }

    outcome.duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

    outcome
}

async fn consume_stream(
    client: &reqwest::Client,
    config: &StressConfig,
    stream_id: usize,
    outcome: &mut StreamOutcome,
    t0: Instant,
    run_origin: Instant,
) -> Result<(), StreamError> {
    let url = format!("{}/v1/messages", config.target_url);
    let body = build_request_body(&config.model, config.max_tokens, stream_id);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&body)
        .timeout(config.timeout())
        .send()
        .await
        .map_err(StreamError::from_reqwest)?;

    outcome.status_code = response.status().as_u16();

    if response.status() != reqwest::StatusCode::OK {
        let status = outcome.status_code;
        let text = response.text().await.map_err(StreamError::from_reqwest)?;
        return Err(StreamError::HttpStatus {
            status,
            body: StreamError::truncate_body(&text, ERROR_BODY_MAX_CHARS),
        });
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(StreamError::from_reqwest)?;
        let now = Instant::now();

        if outcome.chunks_received == 0 {
            outcome.ttfb_ms = now.duration_since(t0).as_secs_f64() * 1000.0;
            outcome.first_chunk_ts = now.duration_since(run_origin).as_secs_f64();
        }

        outcome.chunks_received += 1;
        outcome.bytes_received += chunk.len() as u64;
        outcome.last_chunk_ts = now.duration_since(run_origin).as_secs_f64();
    }

    Ok(())
}
