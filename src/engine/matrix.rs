//! Matrix fan-out: all pairwise directions queries for the active stops,
//! issued concurrently and assembled into square cost/time matrices.
//!
//! Every non-diagonal ordered pair is queried in parallel, so total wall
//! time is bounded by the slowest single oracle call (itself capped by the
//! per-call timeout) plus scheduling. The oracle degrades failed queries to
//! offline estimates, so a single bad pair never aborts the batch.

use std::collections::HashMap;

use crate::core::model::{Stop, TransportMode};
use crate::engine::oracle::{LegEstimate, RouteOracle};

/// Everything known about one `(i, j)` pair beyond the integer matrices.
#[derive(Debug, Clone)]
pub struct PairEstimate {
    pub mode: TransportMode,
    pub estimate: LegEstimate,
}

/// Square cost/time matrices over the active stops plus per-pair details.
/// Diagonal entries are zero. Costs are integer cents, times integer
/// seconds; the solver never sees floating point.
#[derive(Debug, Clone)]
pub struct RouteMatrices {
    pub cost: Vec<Vec<u32>>,
    pub time: Vec<Vec<u32>>,
    pub details: HashMap<(usize, usize), PairEstimate>,
}

/// Fetch matrices for `stops` using `mode` on every edge.
pub async fn fetch_matrices(
    oracle: &RouteOracle,
    stops: &[Stop],
    mode: TransportMode,
) -> RouteMatrices {
    let n = stops.len();
    let mut cost = vec![vec![0u32; n]; n];
    let mut time = vec![vec![0u32; n]; n];
    let mut details = HashMap::with_capacity(n.saturating_mul(n.saturating_sub(1)));

    let queries = (0..n).flat_map(|i| {
        (0..n).filter(move |&j| j != i).map(move |j| async move {
            let estimate = oracle.directions(&stops[i], &stops[j], mode).await;
            ((i, j), estimate)
        })
    });

    for ((i, j), estimate) in futures::future::join_all(queries).await {
        cost[i][j] = estimate.cost_cents;
        time[i][j] = estimate.duration_sec;
        details.insert((i, j), PairEstimate { mode, estimate });
    }

    RouteMatrices { cost, time, details }
}

/// Copy of `matrix` with row and column `index` removed; used when the drop
/// loop removes a stop from the routing set.
pub fn shrink_matrix(matrix: &[Vec<u32>], index: usize) -> Vec<Vec<u32>> {
    matrix
        .iter()
        .enumerate()
        .filter(|(row, _)| *row != index)
        .map(|(_, row)| {
            row.iter()
                .enumerate()
                .filter(|(col, _)| *col != index)
                .map(|(_, &v)| v)
                .collect()
        })
        .collect()
}
