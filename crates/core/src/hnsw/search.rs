//! HNSW search algorithms: greedy descent, single-layer beam search and
//! multi-layer KNN.
//!
//! The same routines serve construction and queries. Candidates are ordered
//! by `(distance, id)`, so equal distances resolve to the earlier-added node
//! and a fixed graph always yields the same answer.

use crate::hnsw::distance::Space;
use crate::hnsw::graph::Graph;
use crate::hnsw::visited::{with_visited, VisitedSet};
use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A node paired with its distance to some target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u32,
    pub distance: f32,
}

impl Neighbor {
    #[inline]
    pub fn new(id: u32, distance: f32) -> Self {
        Self { id, distance }
    }

    #[inline]
    fn key(&self) -> (OrderedFloat<f32>, u32) {
        (OrderedFloat(self.distance), self.id)
    }
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-candidate hill climb on one level.
///
/// Moves to any neighbor strictly closer to `query` than the current best and
/// repeats until a full pass finds no improvement.
pub fn greedy_closest(graph: &Graph, space: &Space<'_>, query: &[f32], start: Neighbor, level: usize) -> Neighbor {
    let mut best = start;
    loop {
        let mut changed = false;
        if let Some(links) = graph.node(best.id).links(level) {
            for &next in links.iter() {
                let d = space.to_node(query, next);
                if d < best.distance {
                    best = Neighbor::new(next, d);
                    changed = true;
                }
            }
        }
        if !changed {
            return best;
        }
    }
}

/// Greedy descent from `start` (sitting at `from_level`) down to, but not
/// including, `to_level`. Returns the closest node found on the last level
/// visited, or `start` when there is nothing to descend.
pub fn descend(
    graph: &Graph,
    space: &Space<'_>,
    query: &[f32],
    start: Neighbor,
    from_level: usize,
    to_level: usize,
) -> Neighbor {
    let mut current = start;
    let mut level = from_level;
    while level > to_level {
        current = greedy_closest(graph, space, query, current, level);
        level -= 1;
    }
    current
}

/// Bounded beam search over a single level.
///
/// Keeps a min-frontier of unexpanded candidates and a max-heap of the `ef`
/// best nodes seen. Stops once the closest unexpanded candidate is farther than
/// the worst kept result. Returns results ascending by `(distance, id)`.
pub fn search_layer(
    graph: &Graph,
    space: &Space<'_>,
    query: &[f32],
    entry_points: &[Neighbor],
    ef: usize,
    level: usize,
    visited: &mut VisitedSet,
) -> Vec<Neighbor> {
    visited.clear();
    let ef = ef.max(1);
    let mut candidates: BinaryHeap<Reverse<Neighbor>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(ef + 1);

    for &ep in entry_points {
        if visited.insert(ep.id) {
            candidates.push(Reverse(ep));
            results.push(ep);
            if results.len() > ef {
                results.pop();
            }
        }
    }

    while let Some(Reverse(candidate)) = candidates.pop() {
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                if candidate > *worst {
                    break;
                }
            }
        }

        let Some(links) = graph.node(candidate.id).links(level) else {
            continue;
        };
        for &next in links.iter() {
            if !visited.insert(next) {
                continue;
            }
            let found = Neighbor::new(next, space.to_node(query, next));
            let admit = results.len() < ef || results.peek().map_or(true, |worst| found < *worst);
            if admit {
                candidates.push(Reverse(found));
                results.push(found);
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    results.into_sorted_vec()
}

/// Multi-layer KNN search.
///
/// Descends from the entry point to level 1 with the hill climb, then runs a
/// beam of width `max(ef, k)` on level 0. Returns at most `k` results ascending
/// by `(distance, id)`; an empty graph yields an empty result.
pub fn knn_search(graph: &Graph, space: &Space<'_>, query: &[f32], k: usize, ef: usize) -> Vec<Neighbor> {
    let Some(ep) = graph.entry_point() else {
        return Vec::new();
    };
    if k == 0 {
        return Vec::new();
    }

    let start = Neighbor::new(ep.node, space.to_node(query, ep.node));
    let nearest = descend(graph, space, query, start, ep.level, 0);

    let mut results = with_visited(graph.len(), |visited| {
        search_layer(graph, space, query, &[nearest], ef.max(k), 0, visited)
    });
    results.truncate(k);
    results
}
