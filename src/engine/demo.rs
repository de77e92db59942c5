//! Fixed-result replan strategy for reproducible demos.
//!
//! When the configured demo session reports a line cancellation, the
//! dispatcher routes here instead of the elastic pipeline and the response
//! is hard-coded: the e-bike and rideshare substitutions always win, the
//! rooftop bar is always the casualty. This is a design-level escape hatch
//! for live demos, not an optimisation.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::core::model::{
    FrictionLevel, Itinerary, ItineraryDiff, ItineraryStatus, Leg, ReplanMeta, ReplanResponse,
    SolverKind, StageTimings, Stop, StopStatus, TransportMode,
};

const DROPPED_STOP_ID: &str = "rooftop-bar";
const DROP_REASON: &str = "Rooftop Bar removed — insufficient budget after e-bike reroute";

/// Produce the canned replan for the demo itinerary.
pub(crate) fn fixed_replan(input: &Itinerary, now: DateTime<Utc>) -> ReplanResponse {
    let started = Instant::now();

    let mut dropped_stops: Vec<Stop> = Vec::new();
    let stops: Vec<Stop> = input
        .stops
        .iter()
        .map(|s| {
            let mut stop = s.clone();
            if stop.id == DROPPED_STOP_ID {
                stop.status = StopStatus::Dropped;
                stop.drop_reason = Some(DROP_REASON.to_string());
                dropped_stops.push(stop.clone());
            }
            stop
        })
        .collect();

    let ebike_leg = Leg {
        from_stop_id: "farmers-market".to_string(),
        to_stop_id: "art-museum".to_string(),
        mode: TransportMode::Ebike,
        cost_cents: 500,
        duration_sec: 1200,
        available: true,
        polyline: Some("ier~F~achVcAeAkAy@oAs@qAi@sA_@uAOuA@sAP".to_string()),
        friction_score: Some(0.45),
        friction_level: Some(FrictionLevel::Medium),
    };
    let rideshare_leg = Leg {
        from_stop_id: "art-museum".to_string(),
        to_stop_id: "home".to_string(),
        mode: TransportMode::Rideshare,
        cost_cents: 750,
        duration_sec: 1500,
        available: true,
        polyline: Some("qmr~Ft_chVdBnCjBjCdBrB~@pA`@fBXrBJpBCnBQlB".to_string()),
        friction_score: Some(0.22),
        friction_level: Some(FrictionLevel::Low),
    };

    // The first leg of the original plan survives untouched.
    let mut legs: Vec<Leg> = input
        .legs
        .iter()
        .find(|l| l.from_stop_id == "home" && l.to_stop_id == "farmers-market")
        .cloned()
        .into_iter()
        .collect();
    legs.push(ebike_leg.clone());
    legs.push(rideshare_leg.clone());

    let total_cost: u32 = legs.iter().map(|l| l.cost_cents).sum();
    let total_duration: i64 = legs.iter().map(|l| l.duration_sec as i64).sum();
    let projected_eta = now + chrono::Duration::seconds(total_duration);

    let itinerary = Itinerary {
        id: input.id.clone(),
        version: input.version + 1,
        user: input.user.clone(),
        stops,
        legs,
        total_cost,
        projected_eta: projected_eta.to_rfc3339(),
        status: ItineraryStatus::Replanning,
    };

    let diff = ItineraryDiff {
        dropped_stops: dropped_stops.clone(),
        new_legs: vec![ebike_leg, rideshare_leg],
        changed_legs: vec![],
        cost_delta: total_cost as i64 - input.total_cost as i64,
        eta_delta: 300,
    };

    ReplanResponse {
        meta: ReplanMeta {
            pipeline_ms: started.elapsed().as_secs_f64() * 1000.0,
            solver: SolverKind::DemoHardcoded,
            stops_dropped: dropped_stops.len(),
            version: itinerary.version,
            step_timings: StageTimings::default(),
        },
        itinerary,
        diff,
    }
}
