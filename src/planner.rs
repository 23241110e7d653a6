//! Greedy nearest-neighbor route construction.
//!
//! This is a construction heuristic, not an optimal TSP solver. Each step
//! scans every unplaced stop, so planning is O(n²) in the number of stops.
//! Per-driver stop counts are small (single digits to low tens); fleets with
//! hundreds of stops per entity would want a matrix-aware improvement pass.

use crate::haversine::distance;
use crate::model::Coordinate;

/// Orders `anchor` plus `stops` by repeated nearest-neighbor selection.
///
/// The result always starts with `anchor` and contains every stop exactly
/// once. Equal distances resolve to the stop that appears first in `stops`.
pub fn plan(anchor: Coordinate, stops: &[Coordinate]) -> Vec<Coordinate> {
    let points: Vec<Coordinate> = std::iter::once(anchor).chain(stops.iter().copied()).collect();
    let order = nearest_neighbor_order(points.len(), |from, to| {
        distance(points[from], points[to])
    });

    std::iter::once(anchor)
        .chain(order.into_iter().map(|index| points[index]))
        .collect()
}

/// Nearest-neighbor tour over point indices `0..len`, starting at index 0.
///
/// Returns the visiting order of indices `1..len`. `cost(a, b)` is the travel
/// cost from point `a` to point `b`. Terminates after exactly `len - 1`
/// selections regardless of the cost values.
pub fn nearest_neighbor_order<F>(len: usize, cost: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    let mut unplaced: Vec<usize> = (1..len).collect();
    let mut order = Vec::with_capacity(unplaced.len());
    let mut last = 0;

    while !unplaced.is_empty() {
        let mut nearest_slot = 0;
        let mut nearest_cost = f64::INFINITY;

        for (slot, &candidate) in unplaced.iter().enumerate() {
            let candidate_cost = cost(last, candidate);
            // Strict comparison keeps the earliest candidate on ties.
            if candidate_cost < nearest_cost {
                nearest_cost = candidate_cost;
                nearest_slot = slot;
            }
        }

        // `remove` keeps the remaining candidates in input order.
        let next = unplaced.remove(nearest_slot);
        order.push(next);
        last = next;
    }

    order
}

/// Total cost of travelling from index 0 through `order`.
pub fn tour_cost<F>(order: &[usize], cost: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    let mut total = 0.0;
    let mut last = 0;
    for &next in order {
        total += cost(last, next);
        last = next;
    }
    total
}
