// Concurrency observation
// Two views of in-flight load: the local counter every worker updates, and a
// background poller sampling the target's own active_streams gauge.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How often the remote gauge is sampled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Per-poll request deadline.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(2);
/// Deadline for the one-off post-run usage fetch.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared count of streams currently in flight, plus the highest value seen.
/// The peak is a best-effort sample taken after each worker resolves, not an
/// exact maximum under parallel execution.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn current(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Fold the current in-flight count into the running peak.
    pub fn observe_peak(&self) {
        self.peak.fetch_max(self.current(), Ordering::Relaxed);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// Usage counters reported by the target's `/v1/usage` endpoint. Every field
/// is optional; whatever is present is surfaced verbatim in the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default)]
    pub active_streams: Option<f64>,
    #[serde(default)]
    pub total_requests: Option<u64>,
    #[serde(default)]
    pub total_failures: Option<u64>,
}

/// Fetch the target's usage counters. Any failure (transport, non-200,
/// malformed body) yields `None`.
pub async fn fetch_usage(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Option<UsageSnapshot> {
    let url = format!("{}/v1/usage", base_url);
    let resp = client.get(&url).timeout(timeout).send().await.ok()?;
    if resp.status() != reqwest::StatusCode::OK {
        return None;
    }
    resp.json::<UsageSnapshot>().await.ok()
}

/// Background task polling the target's active_streams gauge every
/// [`POLL_INTERVAL`] and tracking the peak it observed. The task owns the
/// peak and returns it on join, so no locking is needed around the value.
pub struct GaugePoller {
    handle: JoinHandle<f64>,
    stop_tx: oneshot::Sender<()>,
}

impl GaugePoller {
    /// Spawn the poller. It runs until [`GaugePoller::stop`] is called and
    /// reacts to the stop signal within one polling interval.
    pub fn spawn(client: reqwest::Client, base_url: String) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut peak = 0.0_f64;
            loop {
                // A missed sample is discarded, not an error
                if let Some(snapshot) = fetch_usage(&client, &base_url, POLL_TIMEOUT).await {
                    if let Some(active) = snapshot.active_streams {
                        if active > peak {
                            peak = active;
                        }
                    }
                }

                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
            peak
        });

        Self { handle, stop_tx }
    }

    /// Signal the poller to stop and return the peak it observed. A poller
    /// that died early reports 0.0 rather than failing the run.
    pub async fn stop(self) -> f64 {
        let _ = self.stop_tx.send(());
        self.handle.await.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_gauge_counts_and_peak() {
        let gauge = ConcurrencyGauge::new();
        gauge.increment();
        gauge.increment();
        gauge.observe_peak();
        gauge.decrement();
        gauge.observe_peak();

        assert_eq!(gauge.current(), 1);
        assert_eq!(gauge.peak(), 2);
    }

    #[tokio::test]
    async fn test_gauge_concurrent_updates_balance() {
        let gauge = Arc::new(ConcurrencyGauge::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let gauge = gauge.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    gauge.increment();
                    gauge.decrement();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(gauge.current(), 0);
    }

    #[test]
    fn test_usage_snapshot_tolerates_partial_json() {
        let snapshot: UsageSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.active_streams.is_none());

        let snapshot: UsageSnapshot =
            serde_json::from_str(r#"{"active_streams": 12.0, "uptime_s": 5}"#).unwrap();
        assert_eq!(snapshot.active_streams, Some(12.0));
        assert!(snapshot.total_requests.is_none());
    }

    #[tokio::test]
    async fn test_poller_stops_within_one_interval() {
        // Nothing listening on this port: every poll is a miss
        let client = reqwest::Client::new();
        let poller = GaugePoller::spawn(client, "http://127.0.0.1:9".to_string());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = Instant::now();
        let peak = poller.stop().await;

        assert_eq!(peak, 0.0);
        assert!(started.elapsed() < POLL_INTERVAL + Duration::from_millis(200));
    }
}
