//! Standalone mock SSE backend.
//!
//! Serves a synthetic streaming chat-completion endpoint so the harness can
//! be exercised without real API keys or token spend.
//!
//! Usage:
//!   cargo run --bin mock-backend -- --port 9999 --chunks 20 --delay-ms 50

use anyhow::Result;
use clap::Parser;

use sse_stress::mock::{MockBackendConfig, MockSseBackend};

/// Mock SSE backend for stress-harness runs
#[derive(Parser, Debug)]
#[command(name = "mock-backend", author, version, about, long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, env = "MOCK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port (0 for random)
    #[arg(short, long, env = "MOCK_PORT", default_value = "9999")]
    port: u16,

    /// SSE chunks per streaming response
    #[arg(short, long, env = "MOCK_CHUNKS", default_value = "20")]
    chunks: usize,

    /// Delay between chunks in milliseconds
    #[arg(short, long, env = "MOCK_DELAY_MS", default_value = "50")]
    delay_ms: u64,

    /// Fraction of requests answered with a 500 (0.0 to 1.0)
    #[arg(long, env = "MOCK_ERROR_RATE", default_value = "0.0")]
    error_rate: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = MockBackendConfig {
        host: args.host.clone(),
        port: args.port,
        chunk_count: args.chunks,
        chunk_delay_ms: args.delay_ms,
        error_rate: args.error_rate,
    };

    let mut backend = MockSseBackend::new(config);
    let port = backend.start().await?;

    println!("Mock SSE backend listening on http://{}:{}", args.host, port);
    println!(
        "  chunks={}, delay={}ms per chunk (~{}ms per stream)",
        args.chunks,
        args.delay_ms,
        args.chunks as u64 * args.delay_ms
    );

    tokio::signal::ctrl_c().await?;
    backend.stop();

    Ok(())
}
