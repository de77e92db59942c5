//! # Wayline
//!
//! Real-time multi-stop itinerary replanning engine. Given an active
//! itinerary (ordered stops, a budget, a return deadline, preferred
//! transport modes) and a disruption event, the engine produces a new
//! itinerary that still satisfies the hard constraints, plus a structured
//! diff of what changed, inside a 3000 ms pipeline SLA.
//!
//! # Architecture
//!
//! - [`engine::oracle`]: directions lookups with a deterministic offline
//!   fallback; the only networked component.
//! - [`engine::matrix`]: concurrent fan-out of all pairwise directions
//!   queries into square cost/time matrices.
//! - [`engine::solver`]: complete-search route solver with a wall-clock
//!   cap, plus the greedy nearest-neighbour fallback.
//! - [`engine::friction`]: per-leg congestion-risk scoring.
//! - [`engine::pipeline`]: the seven-stage orchestrator.
//! - [`api`]: Axum HTTP surface over the engine and the session store.

pub mod api;
pub mod core;
pub mod engine;

use std::sync::Arc;

use anyhow::Result;

pub use crate::core::config::Config;
pub use crate::core::error::Error;
pub use crate::engine::Engine;

/// Initialize structured logging with tracing.
///
/// - `log_format`: "text" for human-readable, "json" for structured JSON lines.
/// - Respects RUST_LOG env var for filtering (default: `info,tower_http=debug`).
pub fn init_tracing(log_format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    match log_format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(false).init();
        }
    }
}

/// Shutdown signal: waits for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}

/// Build the engine from `config` and serve the HTTP API.
pub async fn serve(config: Config) -> Result<()> {
    let port = config.port;
    let engine = Arc::new(Engine::new(Arc::new(config)));
    let app = api::build_router(engine);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!(port = port, "server listening on http://127.0.0.1:{}", port);
    tracing::info!(
        port = port,
        "Swagger UI: http://127.0.0.1:{}/swagger-ui/",
        port
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
