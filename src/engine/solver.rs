//! Constrained route solver.
//!
//! Two implementations of one contract: given square cost/time matrices, a
//! budget in cents and a deadline in seconds, return a visiting order that
//! starts at index 0, contains every index exactly once and satisfies both
//! caps, or report infeasibility. The order is an open path; no closing
//! edge back to the start is required.
//!
//! The primary implementation is a complete search: depth-first
//! branch-and-bound over permutations fixed at the start index, pruning any
//! prefix whose running cost exceeds the budget, whose running arrival time
//! exceeds the deadline, or whose admissible completion bound cannot beat
//! the best feasible solution found so far. The search is hard-capped at a
//! wall-clock budget and returns the best feasible order found inside it.
//!
//! The fallback is a nearest-neighbour greedy walk under the same caps,
//! used when the complete search times out or proves infeasibility.

use std::time::{Duration, Instant};

/// Fixed start index for every order the solver produces.
const START: usize = 0;

/// Complete search for the time-minimal feasible order.
///
/// Returns `None` when no permutation satisfies both constraints, or when
/// the wall-clock cap expires before any feasible order is found.
pub fn solve_complete(
    cost: &[Vec<u32>],
    time: &[Vec<u32>],
    budget_cents: u32,
    deadline_sec: u32,
    time_cap: Duration,
) -> Option<Vec<usize>> {
    let n = cost.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(vec![START]);
    }

    // Cheapest inbound edge per node: an admissible lower bound on the time
    // still needed to reach every unvisited node.
    let min_in_time: Vec<u64> = (0..n)
        .map(|j| {
            (0..n)
                .filter(|&i| i != j)
                .map(|i| time[i][j] as u64)
                .min()
                .unwrap_or(0)
        })
        .collect();

    let mut search = Search {
        cost,
        time,
        n,
        budget: budget_cents as u64,
        deadline: deadline_sec as u64,
        min_in_time,
        started: Instant::now(),
        cap: time_cap,
        best_order: None,
        best_time: u64::MAX,
        expired: false,
    };

    let mut visited = vec![false; n];
    visited[START] = true;
    let mut path = Vec::with_capacity(n);
    path.push(START);
    search.explore(&mut path, &mut visited, 0, 0);
    search.best_order
}

struct Search<'a> {
    cost: &'a [Vec<u32>],
    time: &'a [Vec<u32>],
    n: usize,
    budget: u64,
    deadline: u64,
    min_in_time: Vec<u64>,
    started: Instant,
    cap: Duration,
    best_order: Option<Vec<usize>>,
    best_time: u64,
    expired: bool,
}

impl Search<'_> {
    fn explore(
        &mut self,
        path: &mut Vec<usize>,
        visited: &mut [bool],
        cost_so_far: u64,
        time_so_far: u64,
    ) {
        if self.expired || self.started.elapsed() >= self.cap {
            self.expired = true;
            return;
        }

        if path.len() == self.n {
            if time_so_far < self.best_time {
                self.best_time = time_so_far;
                self.best_order = Some(path.clone());
            }
            return;
        }

        // Completion bound: every unvisited node still needs at least its
        // cheapest inbound edge.
        let remaining: u64 = (0..self.n)
            .filter(|&j| !visited[j])
            .map(|j| self.min_in_time[j])
            .sum();
        let optimistic = time_so_far.saturating_add(remaining);
        if optimistic >= self.best_time || optimistic > self.deadline {
            return;
        }

        let curr = *path.last().expect("path starts non-empty");

        // Expand nearest-first so a good incumbent lands early; that is what
        // makes the wall-clock cap an anytime cutoff instead of a coin flip.
        let mut candidates: Vec<usize> = (0..self.n).filter(|&j| !visited[j]).collect();
        candidates.sort_by_key(|&j| self.time[curr][j]);

        for j in candidates {
            let next_cost = cost_so_far + self.cost[curr][j] as u64;
            let next_time = time_so_far + self.time[curr][j] as u64;
            if next_cost > self.budget || next_time > self.deadline {
                continue;
            }

            visited[j] = true;
            path.push(j);
            self.explore(path, visited, next_cost, next_time);
            path.pop();
            visited[j] = false;

            if self.expired {
                return;
            }
        }
    }
}

/// Greedy nearest-neighbour fallback.
///
/// Repeatedly extends by the unvisited index with minimum travel time among
/// those that keep both running totals within their caps. Returns `None` as
/// soon as no admissible extension exists.
pub fn greedy_fallback(
    cost: &[Vec<u32>],
    time: &[Vec<u32>],
    budget_cents: u32,
    deadline_sec: u32,
) -> Option<Vec<usize>> {
    let n = cost.len();
    if n == 0 {
        return None;
    }

    let mut visited = vec![false; n];
    visited[START] = true;
    let mut route = vec![START];
    let mut curr = START;
    let mut cost_total: u64 = 0;
    let mut time_total: u64 = 0;

    while route.len() < n {
        let mut best: Option<(usize, u64)> = None;
        for j in 0..n {
            if visited[j] {
                continue;
            }
            let edge_cost = cost[curr][j] as u64;
            let edge_time = time[curr][j] as u64;
            if cost_total + edge_cost > budget_cents as u64
                || time_total + edge_time > deadline_sec as u64
            {
                continue;
            }
            if best.map_or(true, |(_, t)| edge_time < t) {
                best = Some((j, edge_time));
            }
        }

        let (next, _) = best?;
        visited[next] = true;
        route.push(next);
        cost_total += cost[curr][next] as u64;
        time_total += time[curr][next] as u64;
        curr = next;
    }

    Some(route)
}

/// Total (cost, time) along an order, for post-solve verification.
pub fn route_totals(order: &[usize], cost: &[Vec<u32>], time: &[Vec<u32>]) -> (u64, u64) {
    let mut total_cost: u64 = 0;
    let mut total_time: u64 = 0;
    for w in order.windows(2) {
        total_cost += cost[w[0]][w[1]] as u64;
        total_time += time[w[0]][w[1]] as u64;
    }
    (total_cost, total_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a matrix from a 2D cost specification, outer = rows (from).
    fn matrix(rows: &[&[u32]]) -> Vec<Vec<u32>> {
        let n = rows.len();
        for row in rows {
            assert_eq!(row.len(), n, "matrix must be square");
        }
        rows.iter().map(|r| r.to_vec()).collect()
    }

    fn zeros(n: usize) -> Vec<Vec<u32>> {
        vec![vec![0; n]; n]
    }

    fn cap() -> Duration {
        Duration::from_secs(1)
    }

    #[test]
    fn complete_finds_the_time_minimal_order() {
        // Strongly asymmetric: the optimal open path is 0->1->2->3 = 10+1+1.
        let time = matrix(&[
            &[0, 10, 50, 1],
            &[100, 0, 1, 50],
            &[50, 100, 0, 1],
            &[1, 50, 100, 0],
        ]);
        let cost = zeros(4);

        let order = solve_complete(&cost, &time, 1000, 1000, cap()).unwrap();
        assert_eq!(route_totals(&order, &cost, &time).1, 12);
        let mut seen = order.clone();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(order[0], 0);
    }

    #[test]
    fn budget_redirects_away_from_the_fastest_path() {
        // Fastest order 0->1->2 (20s) blows the budget; the solver must take
        // the slower affordable detour 0->2->1.
        let cost = matrix(&[
            &[0, 900, 50],
            &[900, 0, 50],
            &[50, 50, 0],
        ]);
        let time = matrix(&[
            &[0, 10, 15],
            &[10, 0, 15],
            &[15, 15, 0],
        ]);

        let order = solve_complete(&cost, &time, 500, 1000, cap()).unwrap();
        assert_eq!(order, vec![0, 2, 1]);
        let (total_cost, _) = route_totals(&order, &cost, &time);
        assert!(total_cost <= 500);
    }

    #[test]
    fn complete_reports_infeasible_budget() {
        let cost = matrix(&[
            &[0, 300, 300],
            &[300, 0, 300],
            &[300, 300, 0],
        ]);
        let time = zeros(3);
        // Any full order needs two edges at 300¢ each.
        assert_eq!(solve_complete(&cost, &time, 100, 1000, cap()), None);
    }

    #[test]
    fn deadline_binds_on_cumulative_arrival_time() {
        let cost = zeros(3);
        let time = matrix(&[
            &[0, 50, 70],
            &[50, 0, 60],
            &[20, 20, 0],
        ]);
        // 0->1->2 arrives at 110 > 100; 0->2->1 arrives at 90.
        let order = solve_complete(&cost, &time, 1000, 100, cap()).unwrap();
        assert_eq!(order, vec![0, 2, 1]);

        // Tighten the deadline below every full path.
        assert_eq!(solve_complete(&cost, &time, 1000, 80, cap()), None);
    }

    #[test]
    fn expired_cap_with_no_incumbent_is_infeasible() {
        let cost = matrix(&[&[0, 1], &[1, 0]]);
        let time = matrix(&[&[0, 1], &[1, 0]]);
        assert_eq!(solve_complete(&cost, &time, 10, 10, Duration::ZERO), None);
    }

    #[test]
    fn two_stop_instance_is_direct() {
        let cost = matrix(&[&[0, 5], &[5, 0]]);
        let time = matrix(&[&[0, 30], &[30, 0]]);
        assert_eq!(solve_complete(&cost, &time, 10, 60, cap()), Some(vec![0, 1]));
        assert_eq!(solve_complete(&cost, &time, 4, 60, cap()), None);
    }

    #[test]
    fn greedy_walks_nearest_admissible_first() {
        let cost = zeros(3);
        let time = matrix(&[
            &[0, 5, 20],
            &[5, 0, 3],
            &[20, 3, 0],
        ]);
        assert_eq!(greedy_fallback(&cost, &time, 100, 100), Some(vec![0, 1, 2]));
    }

    #[test]
    fn greedy_skips_over_budget_neighbours() {
        // Index 1 is nearest but unaffordable; greedy must detour via 2.
        let cost = matrix(&[
            &[0, 900, 10],
            &[10, 0, 10],
            &[10, 10, 0],
        ]);
        let time = matrix(&[
            &[0, 5, 20],
            &[5, 0, 3],
            &[20, 3, 0],
        ]);
        assert_eq!(greedy_fallback(&cost, &time, 100, 100), Some(vec![0, 2, 1]));
    }

    #[test]
    fn greedy_reports_infeasible_when_stuck() {
        let cost = matrix(&[
            &[0, 900, 900],
            &[900, 0, 900],
            &[900, 900, 0],
        ]);
        let time = zeros(3);
        assert_eq!(greedy_fallback(&cost, &time, 100, 100), None);
    }

    #[test]
    fn greedy_result_is_an_open_path() {
        // The return edge to the start is prohibitively expensive; an open
        // path must still be accepted.
        let cost = matrix(&[
            &[0, 10, 10],
            &[10, 0, 10],
            &[5000, 5000, 0],
        ]);
        let time = matrix(&[
            &[0, 10, 20],
            &[10, 0, 10],
            &[20, 10, 0],
        ]);
        let order = greedy_fallback(&cost, &time, 100, 100).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
        let (total_cost, total_time) = route_totals(&order, &cost, &time);
        assert!(total_cost <= 100 && total_time <= 100);
    }

    #[test]
    fn route_totals_sums_consecutive_edges() {
        let cost = matrix(&[
            &[0, 5, 10],
            &[5, 0, 3],
            &[10, 3, 0],
        ]);
        let time = matrix(&[
            &[0, 60, 120],
            &[60, 0, 90],
            &[120, 90, 0],
        ]);
        assert_eq!(route_totals(&[0, 1, 2], &cost, &time), (8, 150));
        assert_eq!(route_totals(&[0], &cost, &time), (0, 0));
    }
}
