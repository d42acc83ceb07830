use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// SSE Stress - concurrent streaming load harness
#[derive(Parser, Debug)]
#[command(name = "sse-stress", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Target proxy base URL
    #[arg(
        short = 'u',
        long,
        env = "STRESS_TARGET_URL",
        default_value = "http://127.0.0.1:3456"
    )]
    pub target_url: String,

    /// Number of concurrent streams
    #[arg(short = 'n', long, env = "STRESS_STREAMS", default_value = "100")]
    pub streams: usize,

    /// Ramp-up window in milliseconds (0 = launch all at once)
    #[arg(long, env = "STRESS_RAMP_MS", default_value = "0")]
    pub ramp_ms: u64,

    /// Per-stream timeout in seconds
    #[arg(short = 't', long, env = "STRESS_TIMEOUT", default_value = "120")]
    pub timeout: f64,

    /// Model name sent in request bodies
    #[arg(
        short = 'm',
        long,
        env = "STRESS_MODEL",
        default_value = "mock,mock-model"
    )]
    pub model: String,

    /// max_tokens field in request bodies
    #[arg(long, env = "STRESS_MAX_TOKENS", default_value = "4096")]
    pub max_tokens: u32,

    /// Write the aggregate report plus raw outcomes to a JSON file
    #[arg(long, env = "STRESS_JSON_OUT")]
    pub json_out: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Resolved harness configuration. Priority: CLI > ENV > defaults.
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub target_url: String,
    pub streams: usize,
    pub ramp_ms: u64,
    pub timeout_secs: f64,
    pub model: String,
    pub max_tokens: u32,
    pub json_out: Option<PathBuf>,
    pub log_level: String,
}

impl StressConfig {
    /// Load configuration from .env, environment, and CLI flags.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_args(CliArgs::parse()))
    }

    pub fn from_args(args: CliArgs) -> Self {
        Self {
            target_url: args.target_url.trim_end_matches('/').to_string(),
            streams: args.streams,
            ramp_ms: args.ramp_ms,
            timeout_secs: args.timeout,
            model: args.model,
            max_tokens: args.max_tokens,
            json_out: args.json_out,
            log_level: args.log_level,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.streams == 0 {
            bail!("stream count must be at least 1");
        }
        if !(self.timeout_secs > 0.0) {
            bail!("per-stream timeout must be positive");
        }
        if !self.target_url.starts_with("http://") && !self.target_url.starts_with("https://") {
            bail!("target URL must start with http:// or https://");
        }
        Ok(())
    }

    /// Per-stream total deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            target_url: "http://127.0.0.1:3456".to_string(),
            streams: 100,
            ramp_ms: 0,
            timeout_secs: 120.0,
            model: "mock,mock-model".to_string(),
            max_tokens: 4096,
            json_out: None,
            log_level: "info".to_string(),
        }
    }
}
