//! Runtime configuration.
//!
//! Everything is environment-driven with defaults suitable for the offline
//! demo: `DEMO_MODE=true` short-circuits the route oracle to its
//! deterministic fallback so the whole engine runs without network access.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, constructed once at startup and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the primary OSRM-compatible directions service.
    pub primary_directions_base_url: String,
    /// Base URL of the transit alternatives service.
    pub transit_directions_url: String,
    /// Base URL of the e-bike alternatives service.
    pub ebike_directions_url: String,
    /// When true, the route oracle skips upstream calls entirely and serves
    /// the deterministic offline estimate.
    pub demo_mode: bool,
    /// Session id that triggers the fixed-result replan strategy.
    pub demo_session_id: String,
    /// Per-call budget for any single upstream directions request.
    pub api_call_timeout: Duration,
    /// Wall-clock cap for the complete-search solver.
    pub solver_timeout: Duration,
    /// Location of the pre-trained friction model artifact. Absence is
    /// tolerated; the deterministic mock scorer is used instead.
    pub friction_model_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_directions_base_url: "https://router.project-osrm.org".to_string(),
            transit_directions_url: "http://localhost:4001".to_string(),
            ebike_directions_url: "http://localhost:4001".to_string(),
            demo_mode: true,
            demo_session_id: "demo-maya-001".to_string(),
            api_call_timeout: Duration::from_secs(2),
            solver_timeout: Duration::from_secs(1),
            friction_model_path: PathBuf::from("ml/models/friction_model.json"),
            port: 8000,
        }
    }
}

impl Config {
    /// Build a configuration from the process environment, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            primary_directions_base_url: env_string(
                "DIRECTIONS_BASE_URL",
                defaults.primary_directions_base_url,
            ),
            transit_directions_url: env_string("TRANSIT_API_URL", defaults.transit_directions_url),
            ebike_directions_url: env_string("EBIKE_API_URL", defaults.ebike_directions_url),
            demo_mode: env_bool("DEMO_MODE", defaults.demo_mode),
            demo_session_id: env_string("DEMO_SESSION_ID", defaults.demo_session_id),
            api_call_timeout: env_secs("API_CALL_TIMEOUT_SEC", defaults.api_call_timeout),
            solver_timeout: env_secs("SOLVER_TIMEOUT_SEC", defaults.solver_timeout),
            friction_model_path: std::env::var("FRICTION_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.friction_model_path),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|s| *s > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(default)
}
