// Report rendering
// Turns a StressReport into the human-readable summary, the run verdict, the
// process exit classification, and the optional JSON dump.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aggregate::StressReport;
use crate::outcome::StreamOutcome;

/// Run verdict as worded in the rendered report. Warn tolerates up to 5%
/// failed streams; anything above is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn from_counts(failed: usize, total: usize) -> Self {
        if failed == 0 {
            Verdict::Pass
        } else if failed as f64 <= total as f64 * 0.05 {
            Verdict::Warn
        } else {
            Verdict::Fail
        }
    }
}

pub fn verdict(report: &StressReport) -> Verdict {
    Verdict::from_counts(report.failed, report.total_streams)
}

/// Process exit classification. Deliberately on its own scale, not derived
/// from the verdict wording: 0 up to 5% failed, 1 up to half, 2 beyond.
pub fn exit_code(report: &StressReport) -> i32 {
    let failed = report.failed as f64;
    let total = report.total_streams as f64;
    if failed > total * 0.5 {
        2
    } else if failed > total * 0.05 {
        1
    } else {
        0
    }
}

/// Print the fixed-structure text report to stdout.
pub fn print_report(report: &StressReport) {
    let rule = "=".repeat(72);

    println!("\n{}", rule);
    println!("  SSE STRESS TEST REPORT");
    println!("{}", rule);

    println!("\n  Streams:  {}", report.total_streams);
    println!(
        "  Success:  {}  |  Failed: {}",
        report.successful, report.failed
    );
    println!("  Wall time: {:.2}s", report.wall_clock_s);
    println!("  Peak local concurrency: {}", report.peak_concurrent);
    println!(
        "  Peak target active_streams: {:.0}",
        report.remote_streams_peak
    );

    if !report.errors.is_empty() {
        println!("\n  Errors:");
        let mut entries: Vec<(&String, &u64)> = report.errors.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (key, count) in entries {
            println!("    {}: {}", key, count);
        }
    }

    if report.successful > 0 {
        println!("\n  Time-to-First-Byte (TTFB):");
        println!("    p50:  {:>10.1} ms", report.ttfb_p50_ms);
        println!("    p95:  {:>10.1} ms", report.ttfb_p95_ms);
        println!("    p99:  {:>10.1} ms", report.ttfb_p99_ms);
        println!("    max:  {:>10.1} ms", report.ttfb_max_ms);

        println!("\n  Stream Duration:");
        println!("    p50:  {:>10.1} ms", report.duration_p50_ms);
        println!("    p95:  {:>10.1} ms", report.duration_p95_ms);
        println!("    p99:  {:>10.1} ms", report.duration_p99_ms);
        println!("    max:  {:>10.1} ms", report.duration_max_ms);

        println!("\n  Throughput:");
        println!("    Total bytes:  {:>12}", report.total_bytes);
        println!("    Total chunks: {:>12}", report.total_chunks);
        println!("    Aggregate:    {:>10.2} Mbps", report.throughput_mbps);
    }

    if let Some(usage) = &report.target_usage {
        println!("\n  Target usage (post-run):");
        println!("    total_requests: {}", fmt_opt_u64(usage.total_requests));
        println!("    total_failures: {}", fmt_opt_u64(usage.total_failures));
        println!(
            "    active_streams: {}",
            usage
                .active_streams
                .map(|v| format!("{:.0}", v))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }

    println!("\n{}", rule);
    println!("  {}", verdict_line(report));
    println!("{}\n", rule);
}

fn fmt_opt_u64(value: Option<u64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn verdict_line(report: &StressReport) -> String {
    match verdict(report) {
        Verdict::Pass => "RESULT: PASS - all streams completed successfully".to_string(),
        Verdict::Warn => format!(
            "RESULT: WARN - {}/{} streams failed (<5%)",
            report.failed, report.total_streams
        ),
        Verdict::Fail => format!(
            "RESULT: FAIL - {}/{} streams failed",
            report.failed, report.total_streams
        ),
    }
}

/// Structured dump of a whole run: the aggregate plus every raw outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunDump {
    pub generated_at: DateTime<Utc>,
    pub report: StressReport,
    pub streams: Vec<StreamOutcome>,
}

/// Persist the aggregate and raw outcomes as pretty-printed JSON.
pub fn write_dump(path: &Path, report: &StressReport, outcomes: &[StreamOutcome]) -> Result<()> {
    let dump = RunDump {
        generated_at: Utc::now(),
        report: report.clone(),
        streams: outcomes.to_vec(),
    };
    let json = serde_json::to_string_pretty(&dump).context("failed to serialize run dump")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write results to {}", path.display()))?;
    Ok(())
}
