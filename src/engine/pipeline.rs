//! The elastic replan pipeline.
//!
//! Seven stages turn `(itinerary, disruption)` into `(itinerary', diff)`:
//!
//! 1. Apply the disruption to the working copy (leg availability, delays,
//!    venue-closed stop drops).
//! 2. Select active stops; fewer than two is a user-input failure.
//! 3. Fan out directions queries into cost/time matrices.
//! 4. Solve with the complete search, falling back to greedy.
//! 5. On infeasibility, drop the lowest-priority stop and re-solve.
//! 6. Friction-score the winning legs.
//! 7. Assemble the new itinerary version and the structured diff.
//!
//! The input itinerary is never mutated; a working copy flows through the
//! stages and a fresh value is emitted. Stages run strictly in order; all
//! concurrency lives inside stage 3 and the solver. The pipeline is shaped
//! so that bounded stage latencies keep total wall time inside the 3000 ms
//! SLA: one fan-out round (≤ per-call timeout) + solver cap (1000 ms) +
//! CPU-bound assembly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::model::{
    DisruptionEvent, DisruptionType, Itinerary, ItineraryDiff, ItineraryStatus, Leg, ReplanMeta,
    ReplanRequest, ReplanResponse, Severity, SolverKind, StageTimings, Stop, StopPriority,
    StopStatus, TransportMode,
};
use crate::core::store::SessionStore;
use crate::engine::matrix::{fetch_matrices, shrink_matrix, RouteMatrices};
use crate::engine::solver::{greedy_fallback, route_totals, solve_complete};
use crate::engine::{demo, friction};

/// Drop reason attached by the constraint-driven drop loop.
const DROP_REASON_CONSTRAINTS: &str = "Removed to satisfy budget/time constraints";

/// Fallback deadline budget when the return deadline cannot be parsed.
const DEFAULT_DEADLINE_SEC: u32 = 3600;

/// Which replan implementation handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplanStrategy {
    /// The full seven-stage pipeline.
    Elastic,
    /// Fixed-result bypass for reproducible demos.
    DemoFixed,
}

fn select_strategy(config: &Config, req: &ReplanRequest) -> ReplanStrategy {
    if req.itinerary.id == config.demo_session_id
        && req.disruption.kind == DisruptionType::LineCancellation
    {
        ReplanStrategy::DemoFixed
    } else {
        ReplanStrategy::Elastic
    }
}

/// Replan engine: owns the oracle, the session store and the configuration.
/// Safe to share across concurrent replans; requests for different
/// itineraries share no mutable state beyond the store cache.
pub struct Engine {
    pub config: Arc<Config>,
    pub oracle: crate::engine::oracle::RouteOracle,
    pub store: Arc<SessionStore>,
}

impl Engine {
    pub fn new(config: Arc<Config>) -> Self {
        let store = Arc::new(SessionStore::new());
        let oracle = crate::engine::oracle::RouteOracle::new(config.clone(), Some(store.clone()));
        Self {
            config,
            oracle,
            store,
        }
    }

    /// Replan entrypoint.
    pub async fn replan(&self, req: ReplanRequest) -> Result<ReplanResponse> {
        self.replan_at(req, Utc::now()).await
    }

    /// Replan with a pinned "now". With demo mode on and the store empty the
    /// result's itinerary and diff are a pure function of `(req, now)`; the
    /// public entrypoint passes the current instant.
    pub async fn replan_at(&self, req: ReplanRequest, now: DateTime<Utc>) -> Result<ReplanResponse> {
        match select_strategy(&self.config, &req) {
            ReplanStrategy::DemoFixed => {
                tracing::info!(itinerary = %req.itinerary.id, "demo fixed-result replan activated");
                Ok(demo::fixed_replan(&req.itinerary, now))
            }
            ReplanStrategy::Elastic => self.elastic_replan(req, now).await,
        }
    }

    async fn elastic_replan(
        &self,
        req: ReplanRequest,
        now: DateTime<Utc>,
    ) -> Result<ReplanResponse> {
        let started = Instant::now();
        let mut timings = StageTimings::default();
        let input = &req.itinerary;
        let event = &req.disruption;
        let mut work = input.clone();

        tracing::info!(
            itinerary = %input.id,
            version = input.version,
            event = ?event.kind,
            severity = ?event.severity,
            "replan start"
        );

        // Stage 1: apply the disruption to the working copy.
        let stage = Instant::now();
        apply_disruption(&mut work, event);
        timings.apply_disruption = ms(stage);
        tracing::info!(elapsed_ms = ms(started), "stage 1: disruption applied");

        // Stage 2: select active stops.
        let stage = Instant::now();
        let active: Vec<Stop> = work
            .stops
            .iter()
            .filter(|s| s.status == StopStatus::Pending)
            .cloned()
            .collect();
        timings.select_stops = ms(stage);
        if active.len() < 2 {
            return Err(Error::infeasible(
                "need at least two active stops to build an itinerary",
            ));
        }
        tracing::info!(
            elapsed_ms = ms(started),
            active = active.len(),
            "stage 2: active stops selected"
        );

        // Stage 3: fetch alternative-route matrices.
        let stage = Instant::now();
        let mode = select_mode(&work.user.preferred_modes, &disabled_modes(event));
        let matrices = fetch_matrices(&self.oracle, &active, mode).await;
        timings.fetch_matrices = ms(stage);
        tracing::info!(
            elapsed_ms = ms(started),
            stops = active.len(),
            pairs = matrices.details.len(),
            mode = %mode,
            "stage 3: route matrices fetched"
        );

        let deadline_sec = deadline_budget_sec(&work.user.return_deadline, now);
        let budget_cents = work.user.budget_cents;

        // Stages 4+5: solve, dropping lowest-priority stops on infeasibility.
        let stage = Instant::now();
        let solver_cap = self.config.solver_timeout;
        let routed = solve_with_drops(&active, &matrices, budget_cents, deadline_sec, &|c, t, b, d| {
            solve_complete(c, t, b, d, solver_cap)
        });
        timings.solve_loop = ms(stage);

        let routed = routed.ok_or_else(|| {
            Error::infeasible("unable to find any feasible route even after dropping all droppable stops")
        })?;
        tracing::info!(
            elapsed_ms = ms(started),
            solver = ?routed.solver,
            order = ?routed.order,
            dropped = routed.dropped.len(),
            "stages 4-5: route solved"
        );

        // Stage 6: build the winning legs and friction-score them.
        let stage = Instant::now();
        let mut new_legs = build_legs(&routed, &matrices, mode);
        let scored = friction::score_legs(&self.config, &new_legs, now);
        for (leg, friction) in new_legs.iter_mut().zip(scored) {
            leg.friction_score = Some(friction.score);
            leg.friction_level = Some(friction.level);
        }
        timings.friction = ms(stage);
        tracing::info!(
            elapsed_ms = ms(started),
            legs = new_legs.len(),
            "stage 6: friction scores applied"
        );

        // Stage 7: assemble the new itinerary version and the diff.
        let stage = Instant::now();
        let total_cost: u32 = new_legs.iter().map(|l| l.cost_cents).sum();
        let total_duration: i64 = new_legs.iter().map(|l| l.duration_sec as i64).sum();
        let new_eta = now + chrono::Duration::seconds(total_duration);

        // Stops dropped by stage 1 (venue closures); pre-existing drops in
        // the input are not part of this change set.
        let mut dropped: Vec<Stop> = work
            .stops
            .iter()
            .filter(|s| s.status == StopStatus::Dropped)
            .filter(|s| {
                input
                    .stops
                    .iter()
                    .any(|orig| orig.id == s.id && orig.status != StopStatus::Dropped)
            })
            .cloned()
            .collect();
        dropped.extend(routed.dropped.iter().cloned());

        let mut itinerary = work.clone();
        for stop in &mut itinerary.stops {
            if let Some(d) = routed.dropped.iter().find(|d| d.id == stop.id) {
                stop.status = StopStatus::Dropped;
                stop.drop_reason = d.drop_reason.clone();
            }
        }
        itinerary.version = input.version + 1;
        itinerary.legs = new_legs.clone();
        itinerary.total_cost = total_cost;
        itinerary.projected_eta = new_eta.to_rfc3339();
        itinerary.status = ItineraryStatus::Replanning;

        let (brand_new, changed) = partition_legs(&input.legs, &new_legs);
        let old_eta = DateTime::parse_from_rfc3339(&input.projected_eta)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        let diff = ItineraryDiff {
            dropped_stops: dropped.clone(),
            new_legs: brand_new,
            changed_legs: changed,
            cost_delta: total_cost as i64 - input.total_cost as i64,
            eta_delta: (new_eta - old_eta).num_seconds(),
        };
        timings.assemble = ms(stage);

        let pipeline_ms = ms(started);
        tracing::info!(
            elapsed_ms = pipeline_ms,
            within_sla = pipeline_ms <= 3000.0,
            cost_delta = diff.cost_delta,
            eta_delta = diff.eta_delta,
            "replan complete"
        );

        Ok(ReplanResponse {
            meta: ReplanMeta {
                pipeline_ms,
                solver: routed.solver,
                stops_dropped: dropped.len(),
                version: itinerary.version,
                step_timings: timings,
            },
            itinerary,
            diff,
        })
    }
}

fn ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Stage 1: mutate availability (and venue-closed stop state) on the
/// working copy according to the event type.
pub(crate) fn apply_disruption(itin: &mut Itinerary, event: &DisruptionEvent) {
    let affected_modes = event.affected_modes.as_deref().unwrap_or(&[]);
    let affected_routes: HashSet<&str> = event
        .affected_routes
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(String::as_str)
        .collect();

    match event.kind {
        DisruptionType::TransitDelay => {
            let delay_sec = event.delay_minutes.unwrap_or(0) * 60;
            for leg in &mut itin.legs {
                if affected_modes.contains(&leg.mode) {
                    leg.duration_sec += delay_sec;
                }
                if affected_routes.contains(leg.route_key().as_str()) {
                    leg.available = false;
                }
            }
        }
        DisruptionType::LineCancellation => {
            for leg in &mut itin.legs {
                if affected_modes.contains(&leg.mode)
                    || affected_routes.contains(leg.route_key().as_str())
                {
                    leg.available = false;
                }
            }
        }
        DisruptionType::VenueClosed => {
            let Some(stop_id) = event.affected_stop_id.as_deref() else {
                return;
            };
            for stop in &mut itin.stops {
                if stop.id == stop_id && stop.status == StopStatus::Pending {
                    stop.status = StopStatus::Dropped;
                    stop.drop_reason = Some(format!("Venue closed (disruption {})", event.id));
                }
            }
            for leg in &mut itin.legs {
                if leg.from_stop_id == stop_id || leg.to_stop_id == stop_id {
                    leg.available = false;
                }
            }
        }
        DisruptionType::Weather => {
            if event.severity >= Severity::Major {
                for leg in &mut itin.legs {
                    if matches!(leg.mode, TransportMode::Walking | TransportMode::Ebike) {
                        leg.available = false;
                    }
                }
            }
        }
    }
}

/// Modes the event rules out for replacement legs.
fn disabled_modes(event: &DisruptionEvent) -> Vec<TransportMode> {
    match event.kind {
        DisruptionType::LineCancellation => event.affected_modes.clone().unwrap_or_default(),
        DisruptionType::Weather if event.severity >= Severity::Major => {
            vec![TransportMode::Walking, TransportMode::Ebike]
        }
        _ => Vec::new(),
    }
}

/// First preferred mode still usable; preferences are a hint, so when the
/// event rules them all out any surviving mode will do.
fn select_mode(preferred: &[TransportMode], disabled: &[TransportMode]) -> TransportMode {
    preferred
        .iter()
        .copied()
        .find(|m| !disabled.contains(m))
        .or_else(|| {
            [
                TransportMode::Transit,
                TransportMode::Rideshare,
                TransportMode::Ebike,
                TransportMode::Walking,
            ]
            .into_iter()
            .find(|m| !disabled.contains(m))
        })
        .or_else(|| preferred.first().copied())
        .unwrap_or(TransportMode::Walking)
}

/// Seconds from `now` until the user's return deadline, floored at one and
/// defaulting to an hour when the instant cannot be parsed.
pub(crate) fn deadline_budget_sec(deadline: &str, now: DateTime<Utc>) -> u32 {
    match DateTime::parse_from_rfc3339(deadline) {
        Ok(dt) => (dt.with_timezone(&Utc) - now)
            .num_seconds()
            .clamp(1, u32::MAX as i64) as u32,
        Err(_) => DEFAULT_DEADLINE_SEC,
    }
}

/// Output of the solve/drop loop.
pub(crate) struct RoutingOutcome {
    /// Visiting order over `stops`.
    pub order: Vec<usize>,
    /// Stops still in the routing set.
    pub stops: Vec<Stop>,
    /// Map from routing index back to the fan-out's stop index, for detail
    /// lookups after rows/columns have been deleted.
    pub orig_index: Vec<usize>,
    pub cost: Vec<Vec<u32>>,
    pub time: Vec<Vec<u32>>,
    /// Stops removed by the drop loop, status and reason already set.
    pub dropped: Vec<Stop>,
    pub solver: SolverKind,
}

/// Stages 4 and 5: run the primary solver, fall back to greedy, and drop
/// the lowest-priority stop between attempts. `primary` is injectable so
/// the fallback path stays testable without a real timeout.
pub(crate) fn solve_with_drops(
    active: &[Stop],
    matrices: &RouteMatrices,
    budget_cents: u32,
    deadline_sec: u32,
    primary: &dyn Fn(&[Vec<u32>], &[Vec<u32>], u32, u32) -> Option<Vec<usize>>,
) -> Option<RoutingOutcome> {
    let mut stops = active.to_vec();
    let mut orig_index: Vec<usize> = (0..stops.len()).collect();
    let mut cost = matrices.cost.clone();
    let mut time = matrices.time.clone();
    let mut dropped: Vec<Stop> = Vec::new();

    for iteration in 0..active.len() {
        if stops.len() < 2 {
            break;
        }

        // The complete search can in principle hand back an order whose
        // measured totals breach a cap (anytime cutoff mid-improvement);
        // re-verify before accepting.
        let mut solver = SolverKind::Primary;
        let mut order = primary(&cost, &time, budget_cents, deadline_sec).filter(|order| {
            let (c, t) = route_totals(order, &cost, &time);
            c <= budget_cents as u64 && t <= deadline_sec as u64
        });

        if order.is_none() {
            tracing::info!(iteration, "primary solver infeasible or timed out, trying greedy");
            solver = SolverKind::Greedy;
            order = greedy_fallback(&cost, &time, budget_cents, deadline_sec);
        }

        if let Some(order) = order {
            return Some(RoutingOutcome {
                order,
                stops,
                orig_index,
                cost,
                time,
                dropped,
                solver,
            });
        }

        let Some(drop_idx) = drop_candidate(&stops) else {
            break;
        };
        let mut stop = stops.remove(drop_idx);
        orig_index.remove(drop_idx);
        cost = shrink_matrix(&cost, drop_idx);
        time = shrink_matrix(&time, drop_idx);
        stop.status = StopStatus::Dropped;
        stop.drop_reason = Some(DROP_REASON_CONSTRAINTS.to_string());
        tracing::info!(iteration, stop = %stop.id, "constraints violated, dropping stop");
        dropped.push(stop);
    }

    None
}

/// Pick the stop to sacrifice: the last NICE_TO_HAVE, else the last stop
/// outright. Index 0 (the start) is never droppable.
fn drop_candidate(stops: &[Stop]) -> Option<usize> {
    (1..stops.len())
        .rev()
        .find(|&i| stops[i].priority == StopPriority::NiceToHave)
        .or_else(|| (stops.len() > 1).then(|| stops.len() - 1))
}

/// Materialise legs for the solved order, pulling mode and polyline from
/// the fan-out's detail map.
fn build_legs(routed: &RoutingOutcome, matrices: &RouteMatrices, fallback_mode: TransportMode) -> Vec<Leg> {
    routed
        .order
        .windows(2)
        .map(|w| {
            let (i, j) = (w[0], w[1]);
            let detail = matrices
                .details
                .get(&(routed.orig_index[i], routed.orig_index[j]));
            Leg {
                from_stop_id: routed.stops[i].id.clone(),
                to_stop_id: routed.stops[j].id.clone(),
                mode: detail.map_or(fallback_mode, |d| d.mode),
                cost_cents: routed.cost[i][j],
                duration_sec: routed.time[i][j],
                available: true,
                polyline: detail
                    .map(|d| d.estimate.polyline.clone())
                    .filter(|p| !p.is_empty()),
                friction_score: None,
                friction_level: None,
            }
        })
        .collect()
}

/// Split the output legs into truly-new and changed relative to the input.
/// A pair that existed before with identical mode, cost and duration is in
/// neither list.
fn partition_legs(old_legs: &[Leg], new_legs: &[Leg]) -> (Vec<Leg>, Vec<Leg>) {
    let old_map: HashMap<(&str, &str), &Leg> =
        old_legs.iter().map(|l| (l.endpoints(), l)).collect();

    let mut brand_new = Vec::new();
    let mut changed = Vec::new();
    for leg in new_legs {
        match old_map.get(&leg.endpoints()) {
            Some(old) => {
                if old.mode != leg.mode
                    || old.cost_cents != leg.cost_cents
                    || old.duration_sec != leg.duration_sec
                {
                    changed.push(leg.clone());
                }
            }
            None => brand_new.push(leg.clone()),
        }
    }
    (brand_new, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::EventSource;
    use chrono::TimeZone;

    fn stop(id: &str, priority: StopPriority) -> Stop {
        Stop {
            id: id.to_string(),
            name: id.to_string(),
            lat: 37.7749,
            lng: -122.4194,
            priority,
            status: StopStatus::Pending,
            drop_reason: None,
        }
    }

    fn leg(from: &str, to: &str, mode: TransportMode) -> Leg {
        Leg {
            from_stop_id: from.to_string(),
            to_stop_id: to.to_string(),
            mode,
            cost_cents: 300,
            duration_sec: 900,
            available: true,
            polyline: None,
            friction_score: None,
            friction_level: None,
        }
    }

    fn itinerary(stops: Vec<Stop>, legs: Vec<Leg>) -> Itinerary {
        Itinerary {
            id: "itin-1".to_string(),
            version: 1,
            user: crate::core::model::UserConstraints {
                budget_cents: 50_000,
                return_deadline: "2026-08-01T23:00:00Z".to_string(),
                preferred_modes: vec![TransportMode::Transit],
            },
            total_cost: legs.iter().map(|l| l.cost_cents).sum(),
            stops,
            legs,
            projected_eta: "2026-08-01T18:00:00Z".to_string(),
            status: ItineraryStatus::Active,
        }
    }

    fn event(kind: DisruptionType, severity: Severity) -> DisruptionEvent {
        DisruptionEvent {
            id: "evt-1".to_string(),
            kind,
            severity,
            affected_routes: None,
            affected_modes: None,
            affected_stop_id: None,
            delay_minutes: None,
            timestamp: "2026-08-01T12:00:00Z".to_string(),
            source: EventSource::DemoInject,
        }
    }

    #[test]
    fn transit_delay_extends_matching_legs() {
        let mut itin = itinerary(
            vec![stop("a", StopPriority::MustVisit), stop("b", StopPriority::MustVisit)],
            vec![leg("a", "b", TransportMode::Transit), leg("b", "a", TransportMode::Walking)],
        );
        let mut evt = event(DisruptionType::TransitDelay, Severity::Major);
        evt.affected_modes = Some(vec![TransportMode::Transit]);
        evt.delay_minutes = Some(15);

        apply_disruption(&mut itin, &evt);
        assert_eq!(itin.legs[0].duration_sec, 900 + 15 * 60);
        assert!(itin.legs[0].available);
        assert_eq!(itin.legs[1].duration_sec, 900, "walking leg untouched");
    }

    #[test]
    fn transit_delay_disables_named_routes() {
        let mut itin = itinerary(
            vec![stop("a", StopPriority::MustVisit), stop("b", StopPriority::MustVisit)],
            vec![leg("a", "b", TransportMode::Transit)],
        );
        let mut evt = event(DisruptionType::TransitDelay, Severity::Major);
        evt.affected_routes = Some(vec!["a->b".to_string()]);

        apply_disruption(&mut itin, &evt);
        assert!(!itin.legs[0].available);
    }

    #[test]
    fn line_cancellation_disables_by_mode_or_route() {
        let mut itin = itinerary(
            vec![stop("a", StopPriority::MustVisit), stop("b", StopPriority::MustVisit)],
            vec![
                leg("a", "b", TransportMode::Transit),
                leg("b", "c", TransportMode::Walking),
                leg("c", "a", TransportMode::Rideshare),
            ],
        );
        let mut evt = event(DisruptionType::LineCancellation, Severity::Critical);
        evt.affected_modes = Some(vec![TransportMode::Transit]);
        evt.affected_routes = Some(vec!["c->a".to_string()]);

        apply_disruption(&mut itin, &evt);
        assert!(!itin.legs[0].available, "mode match");
        assert!(itin.legs[1].available, "unrelated leg survives");
        assert!(!itin.legs[2].available, "route match");
    }

    #[test]
    fn venue_closed_drops_the_stop_and_its_legs() {
        let mut itin = itinerary(
            vec![
                stop("a", StopPriority::MustVisit),
                stop("b", StopPriority::MustVisit),
                stop("c", StopPriority::MustVisit),
            ],
            vec![leg("a", "b", TransportMode::Transit), leg("b", "c", TransportMode::Transit)],
        );
        let mut evt = event(DisruptionType::VenueClosed, Severity::Major);
        evt.affected_stop_id = Some("b".to_string());

        apply_disruption(&mut itin, &evt);
        let b = itin.stops.iter().find(|s| s.id == "b").unwrap();
        assert_eq!(b.status, StopStatus::Dropped);
        assert_eq!(b.drop_reason.as_deref(), Some("Venue closed (disruption evt-1)"));
        assert!(!itin.legs[0].available);
        assert!(!itin.legs[1].available);
    }

    #[test]
    fn minor_weather_is_a_no_op() {
        let mut itin = itinerary(
            vec![stop("a", StopPriority::MustVisit), stop("b", StopPriority::MustVisit)],
            vec![leg("a", "b", TransportMode::Walking)],
        );
        apply_disruption(&mut itin, &event(DisruptionType::Weather, Severity::Minor));
        assert!(itin.legs[0].available);
    }

    #[test]
    fn major_weather_disables_outdoor_modes() {
        let mut itin = itinerary(
            vec![stop("a", StopPriority::MustVisit), stop("b", StopPriority::MustVisit)],
            vec![
                leg("a", "b", TransportMode::Walking),
                leg("b", "c", TransportMode::Ebike),
                leg("c", "a", TransportMode::Transit),
            ],
        );
        apply_disruption(&mut itin, &event(DisruptionType::Weather, Severity::Major));
        assert!(!itin.legs[0].available);
        assert!(!itin.legs[1].available);
        assert!(itin.legs[2].available);
    }

    #[test]
    fn deadline_budget_floors_and_falls_back() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        assert_eq!(deadline_budget_sec("2026-08-01T13:00:00Z", now), 3600);
        assert_eq!(deadline_budget_sec("2026-08-01T11:00:00Z", now), 1, "past deadline floors at 1");
        assert_eq!(deadline_budget_sec("not a timestamp", now), 3600);
    }

    #[test]
    fn drop_candidate_prefers_nice_to_have_and_spares_the_start() {
        let stops = vec![
            stop("start", StopPriority::NiceToHave),
            stop("a", StopPriority::MustVisit),
            stop("b", StopPriority::NiceToHave),
            stop("c", StopPriority::MustVisit),
        ];
        assert_eq!(drop_candidate(&stops), Some(2));

        let all_must = vec![
            stop("start", StopPriority::MustVisit),
            stop("a", StopPriority::MustVisit),
            stop("b", StopPriority::MustVisit),
        ];
        assert_eq!(drop_candidate(&all_must), Some(2), "last stop when no NICE_TO_HAVE");

        assert_eq!(drop_candidate(&[stop("start", StopPriority::MustVisit)]), None);
    }

    #[test]
    fn select_mode_skips_disabled_preferences() {
        let preferred = vec![TransportMode::Walking, TransportMode::Transit];
        assert_eq!(select_mode(&preferred, &[]), TransportMode::Walking);
        assert_eq!(
            select_mode(&preferred, &[TransportMode::Walking, TransportMode::Ebike]),
            TransportMode::Transit
        );
        assert_eq!(
            select_mode(&[TransportMode::Walking], &[TransportMode::Walking]),
            TransportMode::Transit,
            "falls back beyond the preference list"
        );
    }

    #[test]
    fn partition_legs_never_double_counts() {
        let old = vec![
            leg("a", "b", TransportMode::Transit),
            leg("b", "c", TransportMode::Transit),
        ];
        let mut same = leg("a", "b", TransportMode::Transit);
        same.polyline = Some("abc".to_string()); // polyline-only change is not a change
        let mut altered = leg("b", "c", TransportMode::Transit);
        altered.cost_cents += 50;
        let fresh = leg("c", "d", TransportMode::Ebike);

        let (brand_new, changed) = partition_legs(&old, &[same, altered.clone(), fresh.clone()]);
        assert_eq!(brand_new, vec![fresh]);
        assert_eq!(changed, vec![altered]);
    }

    fn demo_matrices(stops: &[Stop], cost: Vec<Vec<u32>>, time: Vec<Vec<u32>>) -> RouteMatrices {
        use crate::engine::matrix::PairEstimate;
        use crate::engine::oracle::LegEstimate;
        let mut details = HashMap::new();
        for i in 0..stops.len() {
            for j in 0..stops.len() {
                if i != j {
                    details.insert(
                        (i, j),
                        PairEstimate {
                            mode: TransportMode::Transit,
                            estimate: LegEstimate {
                                cost_cents: cost[i][j],
                                duration_sec: time[i][j],
                                polyline: String::new(),
                                available: true,
                            },
                        },
                    );
                }
            }
        }
        RouteMatrices { cost, time, details }
    }

    #[test]
    fn stubbed_primary_falls_back_to_greedy() {
        let stops = vec![
            stop("start", StopPriority::MustVisit),
            stop("a", StopPriority::MustVisit),
            stop("b", StopPriority::NiceToHave),
        ];
        let cost = vec![vec![0, 100, 100], vec![100, 0, 100], vec![100, 100, 0]];
        let time = vec![vec![0, 60, 120], vec![60, 0, 60], vec![120, 60, 0]];
        let matrices = demo_matrices(&stops, cost, time);

        let routed = solve_with_drops(&stops, &matrices, 50_000, 7200, &|_, _, _, _| None)
            .expect("greedy should route");
        assert_eq!(routed.solver, SolverKind::Greedy);
        let (total_cost, total_time) = route_totals(&routed.order, &routed.cost, &routed.time);
        assert!(total_cost <= 50_000 && total_time <= 7200);
        assert!(routed.dropped.is_empty());
    }

    #[test]
    fn tight_budget_drops_the_nice_to_have_first() {
        let stops = vec![
            stop("start", StopPriority::MustVisit),
            stop("a", StopPriority::MustVisit),
            stop("b", StopPriority::NiceToHave),
        ];
        // Every full route needs two edges at 300¢ each; with a 500¢ budget
        // only a two-stop route fits.
        let cost = vec![vec![0, 300, 300], vec![300, 0, 300], vec![300, 300, 0]];
        let time = vec![vec![0, 60, 60], vec![60, 0, 60], vec![60, 60, 0]];
        let matrices = demo_matrices(&stops, cost.clone(), time.clone());

        let routed = solve_with_drops(&stops, &matrices, 500, 7200, &|c, t, b, d| {
            solve_complete(c, t, b, d, std::time::Duration::from_secs(1))
        })
        .expect("feasible after one drop");

        assert_eq!(routed.dropped.len(), 1);
        assert_eq!(routed.dropped[0].id, "b");
        assert_eq!(routed.dropped[0].status, StopStatus::Dropped);
        assert_eq!(
            routed.dropped[0].drop_reason.as_deref(),
            Some(DROP_REASON_CONSTRAINTS)
        );
        assert_eq!(routed.stops.len(), 2);
        assert_eq!(routed.order, vec![0, 1]);
        // Detail lookups still resolve through the original indices.
        assert_eq!(routed.orig_index, vec![0, 1]);
    }

    #[test]
    fn exhausted_drops_reports_infeasible() {
        let stops = vec![
            stop("start", StopPriority::MustVisit),
            stop("a", StopPriority::MustVisit),
        ];
        let cost = vec![vec![0, 900], vec![900, 0]];
        let time = vec![vec![0, 60], vec![60, 0]];
        let matrices = demo_matrices(&stops, cost, time);

        // Budget admits no edge at all; after dropping "a" fewer than two
        // stops remain, so the loop must give up.
        assert!(solve_with_drops(&stops, &matrices, 100, 7200, &|c, t, b, d| {
            solve_complete(c, t, b, d, std::time::Duration::from_secs(1))
        })
        .is_none());
    }
}
