//! # Wayline server
//!
//! Command-line entry point for the itinerary replanning engine.

use anyhow::Result;
use clap::Parser;

use wayline::Config;

/// Command-line interface for the wayline replan server
#[derive(Parser)]
#[command(name = "wayline")]
#[command(about = "Real-time multi-stop itinerary replanning engine", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the PORT environment variable)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log output format: "text" or "json"
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    wayline::init_tracing(&cli.log_format);

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        demo_mode = config.demo_mode,
        port = config.port,
        "starting wayline"
    );
    wayline::serve(config).await
}
