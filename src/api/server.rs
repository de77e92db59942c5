//! HTTP API handlers with Axum and Utoipa.
//!
//! The surface mirrors the session lifecycle: create an itinerary, inject a
//! disruption (which snapshots the current version for undo and runs the
//! replan), read it back, undo, and score friction on demand. The replan
//! entrypoint is also exposed directly for callers that carry their own
//! itinerary state.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::error::Error;
use crate::core::model::{
    DisruptionEvent, DisruptionType, EventSource, FrictionLevel, Itinerary, ItineraryDiff,
    ItineraryStatus, Leg, ReplanRequest, ReplanResponse, Severity, Stop, StopPriority, StopStatus,
    TransportMode, UserConstraints,
};
use crate::engine::friction;
use crate::engine::Engine;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        replan,
        create_itinerary,
        inject_disruption,
        get_itinerary,
        undo_itinerary,
        friction_scores,
        health
    ),
    components(schemas(
        ReplanRequest,
        ReplanResponse,
        Itinerary,
        ItineraryDiff,
        Stop,
        Leg,
        DisruptionEvent,
        UserConstraints,
        CreateItineraryRequest,
        CreateItineraryResponse,
        DisruptionRequest,
        DisruptionResponse,
        ItineraryResponse,
        UndoResponse,
        FrictionResponse,
        FrictionAlert,
        StopInput,
        HealthResponse,
        ErrorResponse
    )),
    info(
        title = "Wayline Replan API",
        version = "1.0.0",
        description = "Real-time multi-stop itinerary replanning engine"
    )
)]
struct ApiDoc;

/// Build the Axum router
pub fn build_router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/engine/replan", post(replan))
        .route("/api/itinerary", post(create_itinerary))
        .route("/api/itinerary/{session_id}", get(get_itinerary))
        .route("/api/disruption", post(inject_disruption))
        .route("/api/undo/{session_id}", post(undo_itinerary))
        .route("/api/friction/{session_id}", get(friction_scores))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(engine)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Engine errors carried across the HTTP boundary.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn fresh_id(prefix: &str) -> String {
    format!("{}-{:08x}", prefix, rand::random::<u32>())
}

// ============ Replan Endpoint ============

/// Run the elastic replan pipeline on a carried itinerary
#[utoipa::path(
    post,
    path = "/api/engine/replan",
    request_body = ReplanRequest,
    responses(
        (status = 200, description = "Replan succeeded", body = ReplanResponse),
        (status = 422, description = "Infeasible input", body = ErrorResponse),
        (status = 500, description = "Internal engine error", body = ErrorResponse),
    )
)]
async fn replan(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<ReplanRequest>,
) -> Result<Json<ReplanResponse>, ApiError> {
    let response = engine.replan(req).await?;
    Ok(Json(response))
}

// ============ Itinerary Creation ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct StopInput {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_priority")]
    pub priority: StopPriority,
}

fn default_priority() -> StopPriority {
    StopPriority::MustVisit
}

fn default_start_name() -> String {
    "Start".to_string()
}

fn default_modes() -> Vec<TransportMode> {
    vec![TransportMode::Walking, TransportMode::Transit]
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItineraryRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub start_lat: f64,
    pub start_lng: f64,
    #[serde(default = "default_start_name")]
    pub start_name: String,
    pub stops: Vec<StopInput>,
    pub budget_cents: u32,
    pub return_deadline: String,
    #[serde(default = "default_modes")]
    pub preferred_modes: Vec<TransportMode>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateItineraryResponse {
    pub itinerary: Itinerary,
    pub session_id: String,
    pub elapsed_ms: u64,
}

/// Create an itinerary, pricing each consecutive leg via the route oracle
#[utoipa::path(
    post,
    path = "/api/itinerary",
    request_body = CreateItineraryRequest,
    responses(
        (status = 200, description = "Itinerary created", body = CreateItineraryResponse),
    )
)]
async fn create_itinerary(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<CreateItineraryRequest>,
) -> Result<Json<CreateItineraryResponse>, ApiError> {
    let started = Instant::now();
    let session_id = req.session_id.unwrap_or_else(|| fresh_id("sess"));

    let mut stops = vec![Stop {
        id: "start".to_string(),
        name: req.start_name.clone(),
        lat: req.start_lat,
        lng: req.start_lng,
        priority: StopPriority::MustVisit,
        status: StopStatus::Pending,
        drop_reason: None,
    }];
    for (i, s) in req.stops.iter().enumerate() {
        stops.push(Stop {
            id: format!("stop-{}", i + 1),
            name: s.name.clone(),
            lat: s.lat,
            lng: s.lng,
            priority: s.priority,
            status: StopStatus::Pending,
            drop_reason: None,
        });
    }

    let mode = req
        .preferred_modes
        .first()
        .copied()
        .unwrap_or(TransportMode::Transit);

    let mut legs = Vec::with_capacity(stops.len().saturating_sub(1));
    let mut total_cost: u32 = 0;
    let mut total_duration: i64 = 0;
    for pair in stops.windows(2) {
        let estimate = engine.oracle.directions(&pair[0], &pair[1], mode).await;
        total_cost += estimate.cost_cents;
        total_duration += estimate.duration_sec as i64;
        legs.push(Leg {
            from_stop_id: pair[0].id.clone(),
            to_stop_id: pair[1].id.clone(),
            mode,
            cost_cents: estimate.cost_cents,
            duration_sec: estimate.duration_sec,
            available: estimate.available,
            polyline: (!estimate.polyline.is_empty()).then(|| estimate.polyline.clone()),
            friction_score: None,
            friction_level: None,
        });
    }

    let now = Utc::now();
    let itinerary = Itinerary {
        id: session_id.clone(),
        version: 1,
        user: UserConstraints {
            budget_cents: req.budget_cents,
            return_deadline: req.return_deadline,
            preferred_modes: req.preferred_modes,
        },
        stops,
        legs,
        total_cost,
        projected_eta: (now + chrono::Duration::seconds(total_duration)).to_rfc3339(),
        status: ItineraryStatus::Active,
    };

    engine.store.save_itinerary(&session_id, &itinerary);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(session = %session_id, elapsed_ms, "itinerary created");

    Ok(Json(CreateItineraryResponse {
        itinerary,
        session_id,
        elapsed_ms,
    }))
}

// ============ Disruption Injection ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisruptionRequest {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: DisruptionType,
    pub severity: Severity,
    #[serde(default)]
    pub affected_routes: Option<Vec<String>>,
    #[serde(default)]
    pub affected_modes: Option<Vec<TransportMode>>,
    #[serde(default)]
    pub affected_stop_id: Option<String>,
    #[serde(default)]
    pub delay_minutes: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisruptionResponse {
    pub itinerary: Itinerary,
    pub diff: ItineraryDiff,
    pub disruption: DisruptionEvent,
    pub session_id: String,
    pub elapsed_ms: u64,
}

/// Ingest a disruption, snapshot the undo slot and replan the session
#[utoipa::path(
    post,
    path = "/api/disruption",
    request_body = DisruptionRequest,
    responses(
        (status = 200, description = "Replanned", body = DisruptionResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 422, description = "Infeasible after disruption", body = ErrorResponse),
    )
)]
async fn inject_disruption(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<DisruptionRequest>,
) -> Result<Json<DisruptionResponse>, ApiError> {
    let started = Instant::now();
    let session_id = req.session_id.clone();

    let event = DisruptionEvent {
        id: fresh_id("evt"),
        kind: req.kind,
        severity: req.severity,
        affected_routes: req.affected_routes,
        affected_modes: req.affected_modes,
        affected_stop_id: req.affected_stop_id,
        delay_minutes: req.delay_minutes,
        timestamp: Utc::now().to_rfc3339(),
        source: EventSource::DemoInject,
    };

    let itinerary = engine
        .store
        .load_itinerary(&session_id)
        .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;

    // Keep the pre-disruption version around so undo can restore it.
    engine.store.save_previous(&session_id, &itinerary);

    let response = engine
        .replan(ReplanRequest {
            itinerary,
            disruption: event.clone(),
        })
        .await?;

    engine.store.save_itinerary(&session_id, &response.itinerary);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(session = %session_id, elapsed_ms, "disruption processed");

    Ok(Json(DisruptionResponse {
        itinerary: response.itinerary,
        diff: response.diff,
        disruption: event,
        session_id,
        elapsed_ms,
    }))
}

// ============ Session Reads, Undo, Friction ============

#[derive(Debug, Serialize, ToSchema)]
pub struct ItineraryResponse {
    pub itinerary: Itinerary,
    pub session_id: String,
}

/// Fetch the current itinerary for a session
#[utoipa::path(
    get,
    path = "/api/itinerary/{session_id}",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current itinerary", body = ItineraryResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
async fn get_itinerary(
    State(engine): State<Arc<Engine>>,
    Path(session_id): Path<String>,
) -> Result<Json<ItineraryResponse>, ApiError> {
    let itinerary = engine
        .store
        .load_itinerary(&session_id)
        .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
    Ok(Json(ItineraryResponse {
        itinerary,
        session_id,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UndoResponse {
    pub itinerary: Itinerary,
    pub session_id: String,
    pub action: String,
}

/// Restore the previous itinerary version
#[utoipa::path(
    post,
    path = "/api/undo/{session_id}",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Previous version restored", body = UndoResponse),
        (status = 404, description = "No previous version", body = ErrorResponse),
    )
)]
async fn undo_itinerary(
    State(engine): State<Arc<Engine>>,
    Path(session_id): Path<String>,
) -> Result<Json<UndoResponse>, ApiError> {
    let previous = engine
        .store
        .load_previous(&session_id)
        .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;

    // The undone version becomes the new "previous", so undo toggles.
    if let Some(current) = engine.store.load_itinerary(&session_id) {
        engine.store.save_previous(&session_id, &current);
    }
    engine.store.save_itinerary(&session_id, &previous);

    Ok(Json(UndoResponse {
        itinerary: previous,
        session_id,
        action: "restored_previous_version".to_string(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FrictionAlert {
    pub leg_id: String,
    pub leg_index: usize,
    pub friction_score: f64,
    pub friction_level: FrictionLevel,
    pub departure_in: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FrictionResponse {
    pub itinerary: Itinerary,
    pub alerts: Vec<FrictionAlert>,
    pub session_id: String,
    pub scored_in_ms: u64,
}

/// Score the stored itinerary's legs, raising proactive HIGH alerts
#[utoipa::path(
    get,
    path = "/api/friction/{session_id}",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Scored itinerary", body = FrictionResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
    )
)]
async fn friction_scores(
    State(engine): State<Arc<Engine>>,
    Path(session_id): Path<String>,
) -> Result<Json<FrictionResponse>, ApiError> {
    let started = Instant::now();
    let mut itinerary = engine
        .store
        .load_itinerary(&session_id)
        .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;

    let now = Utc::now();
    let scored = friction::score_legs(&engine.config, &itinerary.legs, now);

    let mut alerts = Vec::new();
    let mut cumulative_sec: i64 = 0;
    for (index, (leg, friction)) in itinerary.legs.iter_mut().zip(&scored).enumerate() {
        leg.friction_score = Some(friction.score);
        leg.friction_level = Some(friction.level);

        // Alert on HIGH legs the user can still act on (departing >= 5 min
        // from now, estimated from cumulative leg durations).
        let minutes_until = cumulative_sec / 60;
        if friction.level == FrictionLevel::High && minutes_until >= 5 {
            alerts.push(FrictionAlert {
                leg_id: leg.route_key(),
                leg_index: index,
                friction_score: friction.score,
                friction_level: friction.level,
                departure_in: format!("{minutes_until} min"),
                message: format!(
                    "High congestion risk on {} leg {}. Departing in ~{} min. \
                     Consider switching to an alternative mode.",
                    leg.mode,
                    leg.route_key(),
                    minutes_until
                ),
            });
        }
        cumulative_sec += leg.duration_sec as i64;
    }

    let scored_in_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        session = %session_id,
        legs = itinerary.legs.len(),
        alerts = alerts.len(),
        scored_in_ms,
        "friction scored"
    );

    Ok(Json(FrictionResponse {
        itinerary,
        alerts,
        session_id,
        scored_in_ms,
    }))
}

// ============ Health ============

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
