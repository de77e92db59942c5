//! Route oracle: directions lookup with upstream fan-out targets and a
//! deterministic offline fallback.
//!
//! The oracle is the only networked component in the engine and it never
//! fails: any timeout, connection error or unexpected upstream payload
//! degrades to the offline estimate, because returning a leg is always
//! preferable to aborting a replan. Callable concurrently; the only shared
//! mutable state is the optional session-store cache, which is
//! last-writer-wins.

use std::sync::Arc;

use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::geo::{approx_distance_m, coord_hash};
use crate::core::model::{Stop, TransportMode};
use crate::core::store::SessionStore;

/// What the oracle knows about one origin→destination→mode triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegEstimate {
    pub cost_cents: u32,
    pub duration_sec: u32,
    pub polyline: String,
    pub available: bool,
}

#[derive(Debug, Error)]
enum UpstreamError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected upstream response: {0}")]
    Response(String),
}

/// Cruising speed in m/s used by the offline estimate.
fn cruise_speed_mps(mode: TransportMode) -> f64 {
    match mode {
        TransportMode::Walking => 1.4,
        TransportMode::Transit => 12.0,
        TransportMode::Ebike => 5.5,
        TransportMode::Rideshare => 10.0,
    }
}

/// Fare rate in cents per metre. Fixed part of the design, shared by the
/// offline estimate and upstream distance-based pricing.
fn rate_cents_per_meter(mode: TransportMode) -> f64 {
    match mode {
        TransportMode::Walking => 0.0,
        TransportMode::Transit => 0.003,
        TransportMode::Ebike => 0.005,
        TransportMode::Rideshare => 0.012,
    }
}

/// Price a leg from mode and travelled distance.
pub(crate) fn cost_for_distance(mode: TransportMode, distance_m: f64) -> u32 {
    (distance_m * rate_cents_per_meter(mode)).max(0.0) as u32
}

/// Deterministic estimate used when upstreams are unavailable or demo mode
/// is on. Pure function of its inputs.
pub fn offline_estimate(origin: &Stop, dest: &Stop, mode: TransportMode) -> LegEstimate {
    let distance_m = approx_distance_m(origin.lat, origin.lng, dest.lat, dest.lng);
    let duration_sec = ((distance_m / cruise_speed_mps(mode)) as u32).max(60);
    LegEstimate {
        cost_cents: cost_for_distance(mode, distance_m),
        duration_sec,
        polyline: String::new(),
        available: true,
    }
}

fn directions_cache_key(origin: &Stop, dest: &Stop, mode: TransportMode) -> String {
    format!(
        "directions:{}:{}:{}",
        coord_hash(origin.lat, origin.lng),
        coord_hash(dest.lat, dest.lng),
        mode
    )
}

/// OSRM-style profile for the primary directions service.
fn osrm_profile(mode: TransportMode) -> &'static str {
    match mode {
        TransportMode::Walking => "foot",
        TransportMode::Ebike => "bike",
        // No transit profile upstream; car is the closest approximation.
        TransportMode::Transit | TransportMode::Rideshare => "car",
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

/// Payload shape shared by the transit and e-bike alternative services.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlternativeResponse {
    cost_cents: Option<u32>,
    duration_sec: Option<u32>,
    polyline: Option<String>,
}

/// Directions capability backed by mode-specific upstreams.
pub struct RouteOracle {
    client: Client,
    config: Arc<Config>,
    store: Option<Arc<SessionStore>>,
}

impl RouteOracle {
    pub fn new(config: Arc<Config>, store: Option<Arc<SessionStore>>) -> Self {
        let client = ClientBuilder::new()
            .timeout(config.api_call_timeout)
            .connect_timeout(config.api_call_timeout)
            .build()
            .expect("failed to build directions HTTP client");
        Self {
            client,
            config,
            store,
        }
    }

    /// Resolve `(cost, duration, polyline, available)` for one directed
    /// pair. Never fails; see module docs.
    pub async fn directions(&self, origin: &Stop, dest: &Stop, mode: TransportMode) -> LegEstimate {
        let cache_key = directions_cache_key(origin, dest, mode);
        if let Some(store) = &self.store {
            if let Some(json) = store.get(&cache_key) {
                if let Ok(estimate) = serde_json::from_str::<LegEstimate>(&json) {
                    return estimate;
                }
            }
        }

        let estimate = if self.config.demo_mode {
            offline_estimate(origin, dest, mode)
        } else {
            match self.fetch_upstream(origin, dest, mode).await {
                Ok(estimate) => estimate,
                Err(err) => {
                    tracing::warn!(
                        mode = %mode,
                        from = %origin.id,
                        to = %dest.id,
                        error = %err,
                        "directions upstream failed, using offline estimate"
                    );
                    offline_estimate(origin, dest, mode)
                }
            }
        };

        if let Some(store) = &self.store {
            if let Ok(json) = serde_json::to_string(&estimate) {
                store.put(&cache_key, json);
            }
        }
        estimate
    }

    /// Which upstream serves which mode is internal to the oracle; the
    /// matrix fan-out only ever sees `directions`.
    async fn fetch_upstream(
        &self,
        origin: &Stop,
        dest: &Stop,
        mode: TransportMode,
    ) -> Result<LegEstimate, UpstreamError> {
        match mode {
            TransportMode::Transit => {
                self.fetch_alternative(&self.config.transit_directions_url, "transit", origin, dest)
                    .await
            }
            TransportMode::Ebike => {
                self.fetch_alternative(&self.config.ebike_directions_url, "ebike", origin, dest)
                    .await
            }
            TransportMode::Walking | TransportMode::Rideshare => {
                self.fetch_primary(origin, dest, mode).await
            }
        }
    }

    async fn fetch_primary(
        &self,
        origin: &Stop,
        dest: &Stop,
        mode: TransportMode,
    ) -> Result<LegEstimate, UpstreamError> {
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.config.primary_directions_base_url.trim_end_matches('/'),
            osrm_profile(mode),
            origin.lng,
            origin.lat,
            dest.lng,
            dest.lat,
        );
        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?
            .error_for_status()?;
        let parsed: OsrmResponse = response.json().await?;

        if parsed.code != "Ok" {
            return Err(UpstreamError::Response(format!(
                "directions status {}",
                parsed.code
            )));
        }
        let route = parsed
            .routes
            .first()
            .ok_or_else(|| UpstreamError::Response("empty route list".to_string()))?;

        Ok(LegEstimate {
            cost_cents: cost_for_distance(mode, route.distance),
            duration_sec: (route.duration as u32).max(60),
            polyline: String::new(),
            available: true,
        })
    }

    async fn fetch_alternative(
        &self,
        base_url: &str,
        path: &str,
        origin: &Stop,
        dest: &Stop,
    ) -> Result<LegEstimate, UpstreamError> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("from_lat", origin.lat),
                ("from_lng", origin.lng),
                ("to_lat", dest.lat),
                ("to_lng", dest.lng),
            ])
            .send()
            .await?
            .error_for_status()?;
        let parsed: AlternativeResponse = response.json().await?;

        let (default_cost, default_duration) = match path {
            "transit" => (350, 900),
            _ => (200, 720),
        };
        Ok(LegEstimate {
            cost_cents: parsed.cost_cents.unwrap_or(default_cost),
            duration_sec: parsed.duration_sec.unwrap_or(default_duration),
            polyline: parsed.polyline.unwrap_or_default(),
            available: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{StopPriority, StopStatus};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stop(id: &str, lat: f64, lng: f64) -> Stop {
        Stop {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lng,
            priority: StopPriority::MustVisit,
            status: StopStatus::Pending,
            drop_reason: None,
        }
    }

    fn test_config(base_url: &str) -> Config {
        Config {
            primary_directions_base_url: base_url.to_string(),
            transit_directions_url: base_url.to_string(),
            ebike_directions_url: base_url.to_string(),
            demo_mode: false,
            api_call_timeout: Duration::from_millis(200),
            ..Config::default()
        }
    }

    #[test]
    fn offline_estimate_is_deterministic() {
        let a = stop("a", 37.7749, -122.4194);
        let b = stop("b", 37.7851, -122.4008);
        let first = offline_estimate(&a, &b, TransportMode::Transit);
        let second = offline_estimate(&a, &b, TransportMode::Transit);
        assert_eq!(first, second);
        assert!(first.available);
        assert!(first.duration_sec >= 60);
    }

    #[test]
    fn offline_estimate_floors_duration_at_one_minute() {
        let a = stop("a", 37.7749, -122.4194);
        let b = stop("b", 37.77491, -122.41941);
        let estimate = offline_estimate(&a, &b, TransportMode::Rideshare);
        assert_eq!(estimate.duration_sec, 60);
    }

    #[test]
    fn rate_table_prices_by_mode() {
        assert_eq!(cost_for_distance(TransportMode::Walking, 10_000.0), 0);
        assert_eq!(cost_for_distance(TransportMode::Transit, 10_000.0), 30);
        assert_eq!(cost_for_distance(TransportMode::Ebike, 10_000.0), 50);
        assert_eq!(cost_for_distance(TransportMode::Rideshare, 10_000.0), 120);
    }

    #[tokio::test]
    async fn primary_response_is_priced_with_the_rate_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route/v1/car/-122.4194,37.7749;-122.4008,37.7851"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "Ok",
                "routes": [{"distance": 5000.0, "duration": 600.0}],
            })))
            .mount(&server)
            .await;

        let oracle = RouteOracle::new(Arc::new(test_config(&server.uri())), None);
        let estimate = oracle
            .directions(
                &stop("a", 37.7749, -122.4194),
                &stop("b", 37.7851, -122.4008),
                TransportMode::Rideshare,
            )
            .await;

        assert_eq!(estimate.cost_cents, 60); // 5000 m * 0.012 ¢/m
        assert_eq!(estimate.duration_sec, 600);
        assert!(estimate.available);
    }

    #[tokio::test]
    async fn upstream_error_degrades_to_offline_estimate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let a = stop("a", 37.7749, -122.4194);
        let b = stop("b", 37.7851, -122.4008);
        let oracle = RouteOracle::new(Arc::new(test_config(&server.uri())), None);
        let estimate = oracle.directions(&a, &b, TransportMode::Rideshare).await;

        assert_eq!(estimate, offline_estimate(&a, &b, TransportMode::Rideshare));
    }

    #[tokio::test]
    async fn slow_upstream_times_out_into_offline_estimate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({
                        "code": "Ok",
                        "routes": [{"distance": 1.0, "duration": 1.0}],
                    })),
            )
            .mount(&server)
            .await;

        let a = stop("a", 37.7749, -122.4194);
        let b = stop("b", 37.7851, -122.4008);
        let oracle = RouteOracle::new(Arc::new(test_config(&server.uri())), None);
        let estimate = oracle.directions(&a, &b, TransportMode::Walking).await;

        assert_eq!(estimate, offline_estimate(&a, &b, TransportMode::Walking));
    }

    #[tokio::test]
    async fn alternative_service_defaults_fill_missing_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let oracle = RouteOracle::new(Arc::new(test_config(&server.uri())), None);
        let estimate = oracle
            .directions(
                &stop("a", 37.7749, -122.4194),
                &stop("b", 37.7851, -122.4008),
                TransportMode::Transit,
            )
            .await;

        assert_eq!(estimate.cost_cents, 350);
        assert_eq!(estimate.duration_sec, 900);
    }

    #[tokio::test]
    async fn cached_estimate_short_circuits_the_lookup() {
        let store = Arc::new(SessionStore::new());
        let a = stop("a", 37.7749, -122.4194);
        let b = stop("b", 37.7851, -122.4008);
        let planted = LegEstimate {
            cost_cents: 123,
            duration_sec: 456,
            polyline: String::new(),
            available: true,
        };
        store.put(
            &directions_cache_key(&a, &b, TransportMode::Transit),
            serde_json::to_string(&planted).unwrap(),
        );

        // Demo-mode oracle would normally return the offline estimate; the
        // planted cache entry must win.
        let oracle = RouteOracle::new(Arc::new(Config::default()), Some(store));
        let estimate = oracle.directions(&a, &b, TransportMode::Transit).await;
        assert_eq!(estimate, planted);
    }
}
