// Result aggregation
// Consumes the full outcome set once per run and derives the statistical
// report. Inputs are never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::gauge::UsageSnapshot;
use crate::outcome::StreamOutcome;

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StressReport {
    pub total_streams: usize,
    pub successful: usize,
    pub failed: usize,
    /// Error classification key -> occurrence count
    pub errors: BTreeMap<String, u64>,
    pub ttfb_p50_ms: f64,
    pub ttfb_p95_ms: f64,
    pub ttfb_p99_ms: f64,
    pub ttfb_max_ms: f64,
    pub duration_p50_ms: f64,
    pub duration_p95_ms: f64,
    pub duration_p99_ms: f64,
    pub duration_max_ms: f64,
    pub total_bytes: u64,
    pub total_chunks: u64,
    pub throughput_mbps: f64,
    pub wall_clock_s: f64,
    /// Best-effort peak of the local in-flight counter
    pub peak_concurrent: usize,
    /// Peak of the target's active_streams gauge as sampled by the poller
    pub remote_streams_peak: f64,
    /// Target usage counters fetched after the run, if reachable
    pub target_usage: Option<UsageSnapshot>,
}

/// Interpolated percentile over an ascending-sorted slice. Empty input
/// yields 0. For percentile `p` over `n` samples: `k = (n-1) * p/100`; the
/// value is the sample at `floor(k)`, linearly interpolated toward the next
/// sample by the fractional part.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * (pct / 100.0);
    let f = k.floor() as usize;
    let c = f + 1;
    if c >= sorted.len() {
        return sorted[f];
    }
    sorted[f] + (k - f as f64) * (sorted[c] - sorted[f])
}

/// Classification key of an error string: the text before the first colon,
/// trimmed, or the whole string when there is none.
pub fn error_key(error: &str) -> &str {
    match error.split_once(':') {
        Some((head, _)) => head.trim(),
        None => error,
    }
}

/// Derive the aggregate report from the complete outcome set, the measured
/// wall clock, and the two concurrency peaks.
pub fn build_report(
    outcomes: &[StreamOutcome],
    wall_clock: Duration,
    peak_concurrent: usize,
    remote_streams_peak: f64,
    target_usage: Option<UsageSnapshot>,
) -> StressReport {
    let mut report = StressReport {
        total_streams: outcomes.len(),
        wall_clock_s: wall_clock.as_secs_f64(),
        peak_concurrent,
        remote_streams_peak,
        target_usage,
        ..Default::default()
    };

    let successes: Vec<&StreamOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
    report.successful = successes.len();
    report.failed = outcomes.len() - successes.len();

    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        *report
            .errors
            .entry(error_key(&outcome.error).to_string())
            .or_insert(0) += 1;
    }

    if !successes.is_empty() {
        let mut ttfbs: Vec<f64> = successes.iter().map(|o| o.ttfb_ms).collect();
        let mut durations: Vec<f64> = successes.iter().map(|o| o.duration_ms).collect();
        ttfbs.sort_by(|a, b| a.total_cmp(b));
        durations.sort_by(|a, b| a.total_cmp(b));

        report.ttfb_p50_ms = percentile(&ttfbs, 50.0);
        report.ttfb_p95_ms = percentile(&ttfbs, 95.0);
        report.ttfb_p99_ms = percentile(&ttfbs, 99.0);
        report.ttfb_max_ms = *ttfbs.last().unwrap();

        report.duration_p50_ms = percentile(&durations, 50.0);
        report.duration_p95_ms = percentile(&durations, 95.0);
        report.duration_p99_ms = percentile(&durations, 99.0);
        report.duration_max_ms = *durations.last().unwrap();

        report.total_bytes = successes.iter().map(|o| o.bytes_received).sum();
        report.total_chunks = successes.iter().map(|o| o.chunks_received).sum();

        if report.wall_clock_s > 0.0 {
            report.throughput_mbps =
                (report.total_bytes as f64 * 8.0) / (report.wall_clock_s * 1_000_000.0);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn success(id: usize, ttfb_ms: f64, duration_ms: f64, bytes: u64, chunks: u64) -> StreamOutcome {
        StreamOutcome {
            ttfb_ms,
            duration_ms,
            bytes_received: bytes,
            chunks_received: chunks,
            status_code: 200,
            ..StreamOutcome::new(id)
        }
    }

    #[test]
    fn test_percentile_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        // k = 4 * 0.75 = 3.0 exactly on a sample
        assert_eq!(percentile(&data, 75.0), 4.0);
        // k = 4 * 0.9 = 3.6, interpolated between 4 and 5
        assert!((percentile(&data, 90.0) - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[], 99.0), 0.0);
        assert_eq!(percentile(&[7.5], 1.0), 7.5);
        assert_eq!(percentile(&[7.5], 99.0), 7.5);
    }

    #[test]
    fn test_error_key_extraction() {
        assert_eq!(error_key("timeout"), "timeout");
        assert_eq!(error_key("HTTP 500: server error"), "HTTP 500");
        assert_eq!(error_key("connect: connection refused"), "connect");
        assert_eq!(error_key(""), "");
    }

    #[test]
    fn test_report_partitions_and_classifies() {
        let outcomes = vec![
            success(0, 10.0, 100.0, 1000, 5),
            success(1, 20.0, 200.0, 2000, 8),
            StreamOutcome::failed(2, "timeout".to_string()),
            StreamOutcome::failed(3, "HTTP 500: boom".to_string()),
            StreamOutcome::failed(4, "HTTP 500: still boom".to_string()),
        ];

        let report = build_report(&outcomes, Duration::from_secs(2), 4, 3.0, None);

        assert_eq!(report.total_streams, 5);
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 3);
        assert_eq!(report.successful + report.failed, report.total_streams);
        assert_eq!(report.errors.get("timeout"), Some(&1));
        assert_eq!(report.errors.get("HTTP 500"), Some(&2));
        // Sums cover successes only
        assert_eq!(report.total_bytes, 3000);
        assert_eq!(report.total_chunks, 13);
        assert_eq!(report.peak_concurrent, 4);
        assert_eq!(report.remote_streams_peak, 3.0);
    }

    #[test]
    fn test_empty_success_set_yields_zero_percentiles() {
        let outcomes = vec![StreamOutcome::failed(0, "timeout".to_string())];
        let report = build_report(&outcomes, Duration::from_secs(1), 1, 0.0, None);

        assert_eq!(report.ttfb_p50_ms, 0.0);
        assert_eq!(report.ttfb_max_ms, 0.0);
        assert_eq!(report.duration_p99_ms, 0.0);
        assert_eq!(report.throughput_mbps, 0.0);
        assert_eq!(report.total_bytes, 0);
    }

    #[test]
    fn test_throughput_formula() {
        // 1,000,000 bytes over 1.0s is exactly 8.0 Mbps
        let outcomes = vec![success(0, 1.0, 900.0, 1_000_000, 10)];
        let report = build_report(&outcomes, Duration::from_secs(1), 1, 0.0, None);
        assert!((report.throughput_mbps - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_wall_clock_yields_zero_throughput() {
        let outcomes = vec![success(0, 1.0, 2.0, 1_000_000, 10)];
        let report = build_report(&outcomes, Duration::ZERO, 1, 0.0, None);
        assert_eq!(report.throughput_mbps, 0.0);
    }

    proptest! {
        #[test]
        fn prop_percentile_stays_within_bounds(
            mut xs in proptest::collection::vec(0.0f64..10_000.0, 1..200),
            pct in 0.0f64..=100.0,
        ) {
            xs.sort_by(|a, b| a.total_cmp(b));
            let p = percentile(&xs, pct);
            prop_assert!(p >= xs[0]);
            prop_assert!(p <= xs[xs.len() - 1]);
        }

        #[test]
        fn prop_success_and_failed_partition_total(
            errors in proptest::collection::vec(
                proptest::option::of("[a-z]{1,8}(: [a-z ]{1,16})?"),
                0..60,
            ),
        ) {
            let outcomes: Vec<StreamOutcome> = errors
                .iter()
                .enumerate()
                .map(|(i, e)| match e {
                    Some(msg) => StreamOutcome::failed(i, msg.clone()),
                    None => success(i, 1.0, 2.0, 10, 1),
                })
                .collect();

            let report = build_report(&outcomes, Duration::from_secs(1), 0, 0.0, None);

            prop_assert_eq!(report.successful + report.failed, report.total_streams);
            prop_assert_eq!(report.errors.values().sum::<u64>(), report.failed as u64);
        }
    }
}
