use anyhow::Result;

use sse_stress::config::StressConfig;
use sse_stress::{report, runner};

#[tokio::main]
async fn main() -> Result<()> {
    let config = StressConfig::load()?;
    config.validate()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    print_banner(&config);

    let output = runner::run(&config).await?;

    report::print_report(&output.report);

    if let Some(path) = &config.json_out {
        report::write_dump(path, &output.report, &output.outcomes)?;
        println!("JSON results written to {}", path.display());
    }

    std::process::exit(report::exit_code(&output.report));
}

fn print_banner(config: &StressConfig) {
    println!(
        "Starting stress test: {} concurrent SSE streams",
        config.streams
    );
    println!("  Target: {}", config.target_url);
    println!("  Model:  {}", config.model);
    println!(
        "  Ramp:   {}ms | Timeout: {}s",
        config.ramp_ms, config.timeout_secs
    );
}
