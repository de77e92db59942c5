//! Wire-level data model for itineraries, disruptions and replan results.
//!
//! Field names follow the JSON contract used by the frontend and the session
//! store (`camelCase`, enum variants in SCREAMING_SNAKE_CASE). Instants are
//! carried as ISO-8601 strings so that an unparseable deadline can degrade
//! gracefully instead of failing deserialization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Transport mode of a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Walking,
    Transit,
    Ebike,
    Rideshare,
}

impl TransportMode {
    /// Wire representation, also used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Walking => "WALKING",
            TransportMode::Transit => "TRANSIT",
            TransportMode::Ebike => "EBIKE",
            TransportMode::Rideshare => "RIDESHARE",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopPriority {
    MustVisit,
    NiceToHave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Pending,
    Completed,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItineraryStatus {
    Active,
    Replanning,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisruptionType {
    TransitDelay,
    LineCancellation,
    VenueClosed,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrictionLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    LiveApi,
    DemoInject,
}

/// A place the user wants to visit.
///
/// `drop_reason` is set whenever the engine decides to drop a stop, either
/// because its venue closed or because constraints could not be met with it
/// kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub priority: StopPriority,
    pub status: StopStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_reason: Option<String>,
}

/// A directed transport edge between two stops in one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub mode: TransportMode,
    pub cost_cents: u32,
    pub duration_sec: u32,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction_level: Option<FrictionLevel>,
}

impl Leg {
    /// `"{from}->{to}"`, the key disruption events use to target a leg.
    pub fn route_key(&self) -> String {
        format!("{}->{}", self.from_stop_id, self.to_stop_id)
    }

    /// Endpoint pair identifying this leg across itinerary versions.
    pub fn endpoints(&self) -> (&str, &str) {
        (&self.from_stop_id, &self.to_stop_id)
    }
}

/// Hard constraints attached to the itinerary's owner.
///
/// `preferred_modes` is ordered and treated as a hint; the engine may fall
/// back to any mode when the preferred ones are disrupted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserConstraints {
    pub budget_cents: u32,
    pub return_deadline: String,
    pub preferred_modes: Vec<TransportMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub id: String,
    pub version: u32,
    pub user: UserConstraints,
    pub stops: Vec<Stop>,
    pub legs: Vec<Leg>,
    pub total_cost: u32,
    #[serde(rename = "projectedETA")]
    pub projected_eta: String,
    pub status: ItineraryStatus,
}

/// An external event invalidating part of the current itinerary.
///
/// Which optional fields matter depends on `kind`; the rest are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisruptionEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DisruptionType,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_routes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_modes: Option<Vec<TransportMode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_stop_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
    pub timestamp: String,
    pub source: EventSource,
}

/// Structured change set between the input and the replanned itinerary.
///
/// `new_legs` and `changed_legs` partition the output legs that differ from
/// the input: a leg whose endpoint pair existed before lands in
/// `changed_legs` only when mode, cost or duration differ, and never in both
/// lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDiff {
    pub dropped_stops: Vec<Stop>,
    pub new_legs: Vec<Leg>,
    pub changed_legs: Vec<Leg>,
    pub cost_delta: i64,
    pub eta_delta: i64,
}

/// Which implementation produced the accepted route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Primary,
    Greedy,
    DemoHardcoded,
}

/// Elapsed wall time per pipeline stage, in milliseconds.
///
/// The solve/drop loop interleaves stages 4 and 5, so they are reported as a
/// single `solveLoop` measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub apply_disruption: f64,
    pub select_stops: f64,
    pub fetch_matrices: f64,
    pub solve_loop: f64,
    pub friction: f64,
    pub assemble: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplanMeta {
    pub pipeline_ms: f64,
    pub solver: SolverKind,
    pub stops_dropped: usize,
    pub version: u32,
    pub step_timings: StageTimings,
}

/// Input to the replan entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplanRequest {
    pub itinerary: Itinerary,
    pub disruption: DisruptionEvent,
}

/// Output of a successful replan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplanResponse {
    pub itinerary: Itinerary,
    pub diff: ItineraryDiff,
    pub meta: ReplanMeta,
}
