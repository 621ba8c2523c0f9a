//! Level-0 reachability repair.
//!
//! Reciprocal pruning can evict the only edge into a node, and on clustered
//! data it can evict every edge into a whole cluster. This pass links each
//! node the entry point cannot reach on level 0 from its nearest reachable
//! node. Degree caps are kept: when that node is full, one of its edges that
//! is not needed for reachability is replaced.

use crate::hnsw::distance::Space;
use crate::hnsw::graph::Graph;
use crate::hnsw::search::{knn_search, Neighbor};
use ordered_float::OrderedFloat;
use std::collections::VecDeque;

/// Statistics from a repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Nodes unreachable from the entry point before the pass.
    pub unreachable: usize,
    /// Edges added from a reachable node to an unreachable one.
    pub edges_added: usize,
    /// Edges replaced because the reachable node was at its cap.
    pub edges_evicted: usize,
}

const UNREACHED: u32 = u32::MAX;

/// BFS tree over level 0. `parent[v]` is the node that first reached `v`
/// (the root is its own parent), or `UNREACHED`.
fn bfs_tree(graph: &Graph, root: u32) -> Vec<u32> {
    let mut parent = vec![UNREACHED; graph.len()];
    parent[root as usize] = root;
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        for next in graph.node(id).neighbors(0) {
            if parent[next as usize] == UNREACHED {
                parent[next as usize] = id;
                queue.push_back(next);
            }
        }
    }
    parent
}

/// Reconnect every level-0 node the entry point cannot reach.
///
/// `cap` is the level-0 degree cap and `ef` the beam width used to find
/// nearby reachable nodes. Every pass over an orphan makes it and everything
/// it links to reachable without losing any node reached before, so the loop
/// ends with the whole graph connected.
pub fn repair_level0(graph: &Graph, space: &Space<'_>, cap: usize, ef: usize) -> RepairStats {
    let mut stats = RepairStats::default();
    let Some(ep) = graph.entry_point() else {
        return stats;
    };
    let mut parent = bfs_tree(graph, ep.node);
    stats.unreachable = parent.iter().filter(|&&p| p == UNREACHED).count();

    let mut from = 0;
    while let Some(orphan) = (from..graph.len()).find(|&i| parent[i] == UNREACHED) {
        from = orphan + 1;
        let orphan = orphan as u32;
        let Some(anchor) = find_anchor(graph, space, &parent, orphan, cap, ef) else {
            tracing::warn!(orphan, "No reachable node can take a repair edge");
            continue;
        };

        {
            let mut links = graph.node(anchor).links_mut(0);
            if links.len() >= cap {
                // Only edges off the BFS tree are safe to drop.
                let victim = links
                    .iter()
                    .copied()
                    .filter(|&v| parent[v as usize] != anchor)
                    .max_by_key(|&v| (OrderedFloat(space.between(anchor, v)), v));
                if let Some(victim) = victim {
                    links.retain(|&v| v != victim);
                    stats.edges_evicted += 1;
                }
            }
            links.push(orphan);
        }
        {
            let mut back = graph.node(orphan).links_mut(0);
            if back.len() < cap && !back.contains(&anchor) {
                back.push(anchor);
            }
        }
        stats.edges_added += 1;
        parent = bfs_tree(graph, ep.node);
    }

    if stats.unreachable > 0 {
        tracing::debug!(
            unreachable = stats.unreachable,
            edges_added = stats.edges_added,
            edges_evicted = stats.edges_evicted,
            "Level 0 reachability repaired"
        );
    }
    stats
}

/// Closest reachable node that can take one more edge: it has room under the
/// cap or an edge off the BFS tree that can be replaced.
fn find_anchor(
    graph: &Graph,
    space: &Space<'_>,
    parent: &[u32],
    orphan: u32,
    cap: usize,
    ef: usize,
) -> Option<u32> {
    let reachable = |id: u32| parent[id as usize] != UNREACHED;
    let can_take = |id: u32| {
        let links = graph.node(id).neighbors(0);
        links.len() < cap || links.iter().any(|&v| parent[v as usize] != id)
    };

    let query = space.vector(orphan);
    let nearby = knn_search(graph, space, query, ef, ef);
    if let Some(n) = nearby.iter().find(|n| reachable(n.id) && can_take(n.id)) {
        return Some(n.id);
    }

    // The beam may have started inside the orphan's own component.
    let mut all: Vec<Neighbor> = (0..graph.len() as u32)
        .filter(|&id| reachable(id))
        .map(|id| Neighbor::new(id, space.to_node(query, id)))
        .collect();
    all.sort_unstable();
    all.into_iter().map(|n| n.id).find(|&id| can_take(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::DistanceKind;
    use crate::hnsw::graph::{EntryPoint, VectorStore};

    fn line_store(n: usize) -> VectorStore {
        let mut store = VectorStore::new(1);
        for i in 0..n {
            store.push(&[i as f32]);
        }
        store
    }

    #[test]
    fn test_links_cut_off_component() {
        let store = line_store(6);
        let space = Space::new(&store, DistanceKind::L2);
        let links = vec![
            vec![vec![1]],
            vec![vec![0, 2]],
            vec![vec![1]],
            vec![vec![4]],
            vec![vec![3, 5]],
            vec![vec![4]],
        ];
        let graph = Graph::from_links(links, Some(EntryPoint { node: 0, level: 0 }));
        assert_eq!(graph.level0_reachable(), 3);

        let stats = repair_level0(&graph, &space, 2, 8);
        assert_eq!(
            stats,
            RepairStats {
                unreachable: 3,
                edges_added: 1,
                edges_evicted: 0
            }
        );
        assert_eq!(graph.node(2).neighbors(0), vec![1, 3]);
        assert_eq!(graph.node(3).neighbors(0), vec![4, 2]);
        assert_eq!(graph.level0_reachable(), 6);
    }

    #[test]
    fn test_full_anchor_replaces_edge_off_tree() {
        let store = line_store(4);
        let space = Space::new(&store, DistanceKind::L2);
        let links = vec![vec![vec![1, 2]], vec![vec![0, 2]], vec![vec![0, 1]], vec![vec![]]];
        let graph = Graph::from_links(links, Some(EntryPoint { node: 0, level: 0 }));

        let stats = repair_level0(&graph, &space, 2, 8);
        assert_eq!(stats.edges_evicted, 1);
        // 2 -> 0 is the farthest edge the tree does not use.
        assert_eq!(graph.node(2).neighbors(0), vec![1, 3]);
        assert_eq!(graph.node(3).neighbors(0), vec![2]);
        assert_eq!(graph.level0_reachable(), 4);
        assert!(graph.nodes().iter().all(|n| n.degree(0) <= 2));
    }

    #[test]
    fn test_connected_graph_is_untouched() {
        let store = line_store(3);
        let space = Space::new(&store, DistanceKind::L2);
        let links = vec![vec![vec![1]], vec![vec![0, 2]], vec![vec![1]]];
        let graph = Graph::from_links(links.clone(), Some(EntryPoint { node: 0, level: 0 }));
        assert_eq!(repair_level0(&graph, &space, 2, 8), RepairStats::default());
        assert_eq!(graph.to_links(), links);
    }
}
