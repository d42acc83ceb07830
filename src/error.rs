// Stream failure taxonomy
// Display strings double as the classification text stored in StreamOutcome,
// so the aggregator can key on the substring before the first colon.

use thiserror::Error;

/// Ways a single stream can fail. Never propagates past the worker; it is
/// rendered to a string and recorded in the stream's outcome.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Non-200 response, with the body truncated for the report
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Per-stream deadline exceeded
    #[error("timeout")]
    Timeout,

    /// Stream aborted from outside mid-flight
    #[error("cancelled")]
    Cancelled,

    /// Connection-level failure, carrying the underlying kind and message
    #[error("{kind}: {message}")]
    Transport { kind: String, message: String },
}

impl StreamError {
    /// Classify a reqwest error into the taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return StreamError::Timeout;
        }

        let kind = if err.is_connect() {
            "connect"
        } else if err.is_body() || err.is_decode() {
            "body"
        } else if err.is_request() {
            "request"
        } else {
            "transport"
        };

        StreamError::Transport {
            kind: kind.to_string(),
            message: err.without_url().to_string(),
        }
    }

    /// Truncate a response body for inclusion in an error string.
    pub fn truncate_body(body: &str, max_chars: usize) -> String {
        body.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_strings() {
        let err = StreamError::HttpStatus {
            status: 500,
            body: "server error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: server error");

        assert_eq!(StreamError::Timeout.to_string(), "timeout");
        assert_eq!(StreamError::Cancelled.to_string(), "cancelled");

        let err = StreamError::Transport {
            kind: "connect".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "connect: connection refused");
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        assert_eq!(StreamError::truncate_body(&long, 200).len(), 200);
        assert_eq!(StreamError::truncate_body("short", 200), "short");
        // Cuts on char boundaries, not bytes
        let accented = "é".repeat(300);
        assert_eq!(
            StreamError::truncate_body(&accented, 200).chars().count(),
            200
        );
    }
}
