// Per-stream result record
// One StreamOutcome is produced per launched stream and never mutated after
// the worker hands it off.

use serde::{Deserialize, Serialize};

/// Everything measured for a single stream: timing, volume, and failure
/// classification. `ttfb_ms` and the chunk timestamps stay 0.0 when no byte
/// ever arrived; `status_code` stays 0 when no response completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOutcome {
    /// Ordinal launch position, unique within a run
    pub stream_id: usize,
    pub status_code: u16,
    /// Request start to first received byte
    pub ttfb_ms: f64,
    /// Request start to final resolution, set on every exit path
    pub duration_ms: f64,
    /// Transport-level reads, not parsed SSE events
    pub chunks_received: u64,
    pub bytes_received: u64,
    /// Empty on success, otherwise "kind" or "kind: detail"
    pub error: String,
    /// Seconds since the run origin, 0.0 if no chunk arrived
    pub first_chunk_ts: f64,
    pub last_chunk_ts: f64,
}

impl StreamOutcome {
    pub fn new(stream_id: usize) -> Self {
        Self {
            stream_id,
            status_code: 0,
            ttfb_ms: 0.0,
            duration_ms: 0.0,
            chunks_received: 0,
            bytes_received: 0,
            error: String::new(),
            first_chunk_ts: 0.0,
            last_chunk_ts: 0.0,
        }
    }

    /// Synthetic outcome for a stream whose task never returned one.
    pub fn failed(stream_id: usize, error: String) -> Self {
        Self {
            error,
            ..Self::new(stream_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_outcome_is_success() {
        let outcome = StreamOutcome::new(7);
        assert_eq!(outcome.stream_id, 7);
        assert_eq!(outcome.status_code, 0);
        assert_eq!(outcome.chunks_received, 0);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = StreamOutcome::failed(3, "timeout".to_string());
        assert_eq!(outcome.stream_id, 3);
        assert!(!outcome.is_success());
        assert_eq!(outcome.error, "timeout");
        assert_eq!(outcome.duration_ms, 0.0);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = StreamOutcome::new(0);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["stream_id"], 0);
        assert_eq!(json["error"], "");
    }
}
