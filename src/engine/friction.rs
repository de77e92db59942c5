//! Friction scoring: per-leg congestion risk in `[0, 1]` plus a categorical
//! level.
//!
//! The scorer prefers a pre-trained logistic model loaded from disk. The
//! artifact is read once on first use and cached process-wide; when it is
//! absent the deterministic mock takes over for the life of the process, so
//! the choice never flips between requests. Scoring an entire itinerary is
//! pure CPU and sits well inside its 200 ms budget.

use std::hash::Hasher;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Timelike, Utc};
use rustc_hash::FxHasher;
use serde::Deserialize;

use crate::core::config::Config;
use crate::core::model::{FrictionLevel, Leg, TransportMode};

/// hour, weekday, mode one-hot (4), historical delay p50, precipitation,
/// temperature, local-event flag, crowd density prior.
const FEATURE_COUNT: usize = 11;

/// Feature defaults when no live feed is wired in.
const DEFAULT_DELAY_P50: f64 = 0.0;
const DEFAULT_PRECIP_MM: f64 = 0.0;
const DEFAULT_TEMP_C: f64 = 20.0;
const DEFAULT_EVENT_FLAG: f64 = 0.0;
const DEFAULT_CROWD_PRIOR: f64 = 0.3;

/// Score plus its categorical level for one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegFriction {
    pub score: f64,
    pub level: FrictionLevel,
}

/// Map a friction score to its categorical level.
pub fn classify(score: f64) -> FrictionLevel {
    if score < 0.3 {
        FrictionLevel::Low
    } else if score <= 0.7 {
        FrictionLevel::Medium
    } else {
        FrictionLevel::High
    }
}

/// Logistic regression over the leg feature vector.
#[derive(Debug, Clone, Deserialize)]
pub struct FrictionModel {
    weights: Vec<f64>,
    bias: f64,
}

impl FrictionModel {
    /// Read and validate an artifact. Fails on missing files, bad JSON or a
    /// weight vector that does not match the feature layout.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model: FrictionModel = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if model.weights.len() != FEATURE_COUNT {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "friction model has {} weights, expected {}",
                    model.weights.len(),
                    FEATURE_COUNT
                ),
            ));
        }
        Ok(model)
    }

    pub fn predict(&self, leg: &Leg, now: DateTime<Utc>) -> f64 {
        let features = feature_vector(leg, now);
        let z: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

fn feature_vector(leg: &Leg, now: DateTime<Utc>) -> [f64; FEATURE_COUNT] {
    let one_hot = match leg.mode {
        TransportMode::Walking => [1.0, 0.0, 0.0, 0.0],
        TransportMode::Transit => [0.0, 1.0, 0.0, 0.0],
        TransportMode::Ebike => [0.0, 0.0, 1.0, 0.0],
        TransportMode::Rideshare => [0.0, 0.0, 0.0, 1.0],
    };
    [
        now.hour() as f64,
        now.weekday().num_days_from_monday() as f64,
        one_hot[0],
        one_hot[1],
        one_hot[2],
        one_hot[3],
        DEFAULT_DELAY_P50,
        DEFAULT_PRECIP_MM,
        DEFAULT_TEMP_C,
        DEFAULT_EVENT_FLAG,
        DEFAULT_CROWD_PRIOR,
    ]
}

static MODEL: OnceLock<Option<FrictionModel>> = OnceLock::new();

/// Process-wide model, loaded on first access from the configured path.
fn global_model(path: &Path) -> Option<&'static FrictionModel> {
    MODEL
        .get_or_init(|| match FrictionModel::from_path(path) {
            Ok(model) => {
                tracing::info!(path = %path.display(), "friction model loaded");
                Some(model)
            }
            Err(err) => {
                tracing::info!(
                    path = %path.display(),
                    error = %err,
                    "no friction model, using deterministic mock"
                );
                None
            }
        })
        .as_ref()
}

/// Deterministic mock score: a per-mode base (elevated for peak-hour
/// transit) plus a ±0.2 perturbation hashed from the endpoint ids.
pub fn mock_score(leg: &Leg, now: DateTime<Utc>) -> f64 {
    let hour = now.hour();
    let base = match leg.mode {
        TransportMode::Transit if (7..=9).contains(&hour) || (17..=19).contains(&hour) => 0.55,
        TransportMode::Ebike => 0.25,
        TransportMode::Rideshare => 0.35,
        _ => 0.15,
    };

    let mut hasher = FxHasher::default();
    hasher.write(leg.from_stop_id.as_bytes());
    hasher.write(leg.to_stop_id.as_bytes());
    let variation = ((hasher.finish() % 100) as f64 - 50.0) * 0.004;

    (base + variation).clamp(0.0, 1.0)
}

/// Score every leg of an itinerary. Results align index-wise with `legs`.
pub fn score_legs(config: &Config, legs: &[Leg], now: DateTime<Utc>) -> Vec<LegFriction> {
    let model = global_model(&config.friction_model_path);
    legs.iter()
        .map(|leg| {
            let raw = match model {
                Some(model) => model.predict(leg, now),
                None => mock_score(leg, now),
            };
            let score = (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
            LegFriction {
                score,
                level: classify(score),
            }
        })
        .collect()
}
