//! Neighbor selection: decides which candidate edges a node keeps under its
//! degree cap.
//!
//! The heuristic policies implement Algorithm 4 of the HNSW paper: a candidate
//! is admitted only if it is at least as close to the target as to every
//! neighbor admitted before it. This keeps edges spread out in different
//! directions instead of clustering on one side of the target.

use crate::hnsw::distance::Space;
use crate::hnsw::search::Neighbor;
use serde::{Deserialize, Serialize};

/// Pruning rule applied when a candidate edge set exceeds its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NeighborSelectingPolicy {
    /// Keep the closest candidates. Cheap, but tends to produce locally
    /// clustered, poorly connected graphs.
    Naive,
    /// Relative-neighborhood diversity rule (Algorithm 4).
    #[default]
    Heuristic,
    /// Diversity rule, then top up with the closest rejected candidates until
    /// the cap is reached.
    HeuristicSaveRemains,
}

impl std::str::FromStr for NeighborSelectingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(NeighborSelectingPolicy::Naive),
            "heuristic" => Ok(NeighborSelectingPolicy::Heuristic),
            "heuristic_save_remains" => Ok(NeighborSelectingPolicy::HeuristicSaveRemains),
            other => Err(format!("unknown neighbor selecting policy '{other}'")),
        }
    }
}

/// Select at most `cap` neighbors from `candidates`.
///
/// `candidates` must be sorted ascending by `(distance, id)` with distances
/// measured to the target. A list that already fits under the cap is kept
/// as-is for every policy.
pub fn select_neighbors(
    policy: NeighborSelectingPolicy,
    candidates: &[Neighbor],
    cap: usize,
    space: &Space<'_>,
) -> Vec<Neighbor> {
    if candidates.len() <= cap {
        return candidates.to_vec();
    }
    match policy {
        NeighborSelectingPolicy::Naive => candidates[..cap].to_vec(),
        NeighborSelectingPolicy::Heuristic => select_diverse(candidates, cap, space, false),
        NeighborSelectingPolicy::HeuristicSaveRemains => {
            select_diverse(candidates, cap, space, true)
        }
    }
}

fn select_diverse(
    candidates: &[Neighbor],
    cap: usize,
    space: &Space<'_>,
    save_remains: bool,
) -> Vec<Neighbor> {
    let mut selected: Vec<Neighbor> = Vec::with_capacity(cap);
    let mut skipped: Vec<Neighbor> = Vec::new();

    for &candidate in candidates {
        if selected.len() >= cap {
            break;
        }
        let is_diverse = selected
            .iter()
            .all(|s| candidate.distance <= space.between(candidate.id, s.id));
        if is_diverse {
            selected.push(candidate);
        } else if save_remains {
            skipped.push(candidate);
        }
    }

    // `skipped` inherits the ascending order of `candidates`. If both lists run
    // dry the result stays under-filled.
    if save_remains {
        let room = cap - selected.len();
        selected.extend(skipped.into_iter().take(room));
    }
    selected
}

/// Re-prune the adjacency of `node` down to `cap`.
///
/// Computes each neighbor's distance to `node`, sorts by `(distance, id)` and
/// applies `policy`. Lists already within the cap come back unchanged.
pub fn shrink_links(
    policy: NeighborSelectingPolicy,
    node: u32,
    links: &[u32],
    cap: usize,
    space: &Space<'_>,
) -> Vec<u32> {
    if links.len() <= cap {
        return links.to_vec();
    }
    let mut candidates: Vec<Neighbor> = links
        .iter()
        .map(|&id| Neighbor::new(id, space.between(node, id)))
        .collect();
    candidates.sort_unstable();
    select_neighbors(policy, &candidates, cap, space)
        .into_iter()
        .map(|n| n.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::DistanceKind;
    use crate::hnsw::graph::VectorStore;

    /// Target at the origin (id 0), a tight cluster to the east (ids 1..=3)
    /// and single points to the west (4) and north (5).
    fn fixture() -> VectorStore {
        let mut store = VectorStore::new(2);
        for p in [
            [0.0, 0.0],
            [1.0, 0.0],
            [1.1, 0.0],
            [1.2, 0.1],
            [-1.5, 0.0],
            [0.0, 2.0],
        ] {
            store.push(&p);
        }
        store
    }

    fn candidates(space: &Space<'_>) -> Vec<Neighbor> {
        let mut c: Vec<Neighbor> = (1..=5).map(|id| Neighbor::new(id, space.between(0, id))).collect();
        c.sort_unstable();
        c
    }

    fn ids(v: &[Neighbor]) -> Vec<u32> {
        v.iter().map(|n| n.id).collect()
    }

    #[test]
    fn test_naive_keeps_closest() {
        let store = fixture();
        let space = Space::new(&store, DistanceKind::L2);
        let picked = select_neighbors(NeighborSelectingPolicy::Naive, &candidates(&space), 3, &space);
        assert_eq!(ids(&picked), vec![1, 2, 3]);
    }

    #[test]
    fn test_heuristic_skips_redundant_cluster() {
        let store = fixture();
        let space = Space::new(&store, DistanceKind::L2);
        let picked = select_neighbors(NeighborSelectingPolicy::Heuristic, &candidates(&space), 4, &space);
        // 2 and 3 are closer to 1 than to the origin; 4 and 5 point elsewhere.
        assert_eq!(ids(&picked), vec![1, 4, 5]);
    }

    #[test]
    fn test_save_remains_fills_from_overflow() {
        let store = fixture();
        let space = Space::new(&store, DistanceKind::L2);
        let picked = select_neighbors(
            NeighborSelectingPolicy::HeuristicSaveRemains,
            &candidates(&space),
            4,
            &space,
        );
        assert_eq!(ids(&picked), vec![1, 4, 5, 2]);
    }

    #[test]
    fn test_save_remains_matches_heuristic_when_nothing_is_skipped() {
        let mut store = VectorStore::new(2);
        for p in [[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]] {
            store.push(&p);
        }
        let space = Space::new(&store, DistanceKind::L2);
        let cands: Vec<Neighbor> = (1..=4).map(|id| Neighbor::new(id, space.between(0, id))).collect();
        // All four are mutually diverse, so nothing is skipped.
        let picked = select_neighbors(NeighborSelectingPolicy::HeuristicSaveRemains, &cands, 3, &space);
        assert_eq!(ids(&picked), vec![1, 2, 3]);
    }

    #[test]
    fn test_under_cap_is_unchanged() {
        let store = fixture();
        let space = Space::new(&store, DistanceKind::L2);
        let cands = candidates(&space);
        for policy in [
            NeighborSelectingPolicy::Naive,
            NeighborSelectingPolicy::Heuristic,
            NeighborSelectingPolicy::HeuristicSaveRemains,
        ] {
            assert_eq!(select_neighbors(policy, &cands, 5, &space), cands);
        }
    }

    #[test]
    fn test_shrink_links_sorts_by_distance() {
        let store = fixture();
        let space = Space::new(&store, DistanceKind::L2);
        let shrunk = shrink_links(NeighborSelectingPolicy::Naive, 0, &[5, 3, 1, 4, 2], 2, &space);
        assert_eq!(shrunk, vec![1, 2]);
        let kept = shrink_links(NeighborSelectingPolicy::Naive, 0, &[5, 3], 2, &space);
        assert_eq!(kept, vec![5, 3]);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "heuristic_save_remains".parse::<NeighborSelectingPolicy>(),
            Ok(NeighborSelectingPolicy::HeuristicSaveRemains)
        );
        assert!("random".parse::<NeighborSelectingPolicy>().is_err());
    }
}
