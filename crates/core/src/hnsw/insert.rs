//! HNSW insertion algorithm and build drivers.
//!
//! Inserts a node into the graph with bidirectional connections and policy
//! driven pruning. Levels are sampled before the build starts, so the
//! hierarchy depends only on the seed and the insertion order, never on
//! thread scheduling.
//!
//! Concurrent inserters share the graph without a global lock: adjacency is
//! locked per node and level, each worker holds at most one adjacency lock at
//! a time, and the entry point is compare-and-updated under its own lock.

use crate::error::Result;
use crate::hnsw::distance::Space;
use crate::hnsw::graph::{Graph, HnswConfig};
use crate::hnsw::repair::repair_level0;
use crate::hnsw::search::{descend, search_layer, Neighbor};
use crate::hnsw::select::{select_neighbors, shrink_links, NeighborSelectingPolicy};
use crate::hnsw::visited::with_visited;
use rayon::prelude::*;
use std::time::Instant;

/// Builds a [`Graph`] over the vectors of a [`Space`].
pub struct GraphBuilder<'a> {
    space: Space<'a>,
    policy: NeighborSelectingPolicy,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    num_threads: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &HnswConfig, space: Space<'a>) -> Self {
        Self {
            space,
            policy: config.neighbor_selecting,
            m: config.m,
            m_max0: config.m_max0,
            ef_construction: config.ef_construction,
            num_threads: config.num_threads,
        }
    }

    #[inline]
    fn cap(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Insert the nodes of `order` into a fresh graph.
    ///
    /// `levels[id]` is the pre-sampled level of node `id`; `order` must be a
    /// permutation of `0..levels.len()`. The first node is always inserted
    /// alone. With one thread the rest follow sequentially, which makes the
    /// result reproducible bit for bit. Level 0 is repaired afterwards so
    /// every node is reachable from the entry point.
    pub fn build(&self, order: &[u32], levels: &[usize]) -> Result<Graph> {
        let started = Instant::now();
        let graph = Graph::with_levels(levels, self.m, self.m_max0);
        let Some((&first, rest)) = order.split_first() else {
            return Ok(graph);
        };

        self.insert(&graph, first);
        if self.num_threads <= 1 {
            for &node in rest {
                self.insert(&graph, node);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads)
                .thread_name(|i| format!("smallworld-build-{i}"))
                .build()?;
            pool.install(|| rest.par_iter().for_each(|&node| self.insert(&graph, node)));
        }
        let repaired = repair_level0(&graph, &self.space, self.m_max0, self.ef_construction);

        tracing::debug!(
            nodes = order.len(),
            repaired = repaired.edges_added,
            max_level = graph.max_level(),
            threads = self.num_threads,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph built"
        );
        Ok(graph)
    }

    /// Insert one node. Its vector must already be in the space and its slot
    /// must exist in `graph`.
    pub fn insert(&self, graph: &Graph, node: u32) {
        let level = graph.node(node).level();
        let Some(ep) = graph.entry_point_or_init(node, level) else {
            return;
        };

        let space = &self.space;
        let query = space.vector(node);
        let top = level.min(ep.level);

        // Phase 1: greedy descent through the levels above the node's own
        let start = Neighbor::new(ep.node, space.to_node(query, ep.node));
        let nearest = descend(graph, space, query, start, ep.level, top);

        // Phase 2: beam search, select and link on every shared level
        with_visited(graph.len(), |visited| {
            let mut entry = vec![nearest];
            for l in (0..=top).rev() {
                let mut candidates =
                    search_layer(graph, space, query, &entry, self.ef_construction, l, visited);
                candidates.retain(|n| n.id != node);

                let selected = select_neighbors(self.policy, &candidates, self.cap(l), space);
                self.connect(graph, node, l, &selected);

                if !candidates.is_empty() {
                    entry = candidates;
                }
            }
        });

        // Phase 3: take over as entry point if this node reaches higher
        if graph.promote_entry_point(node, level) {
            tracing::trace!(node, level, "Entry point promoted");
        }
    }

    /// Publish `selected` as the node's adjacency on `level` and add the
    /// reciprocal edges, re-pruning any list pushed over its cap.
    fn connect(&self, graph: &Graph, node: u32, level: usize, selected: &[Neighbor]) {
        let cap = self.cap(level);
        let kept: Vec<u32> = {
            let mut own = graph.node(node).links_mut(level);
            // Other workers may have linked to this node already.
            for n in selected {
                if !own.contains(&n.id) {
                    own.push(n.id);
                }
            }
            if own.len() > cap {
                let pruned = shrink_links(self.policy, node, &own, cap, &self.space);
                *own = pruned;
            }
            own.clone()
        };

        for n in selected.iter().filter(|n| kept.contains(&n.id)) {
            let mut theirs = graph.node(n.id).links_mut(level);
            if theirs.contains(&node) {
                continue;
            }
            theirs.push(node);
            if theirs.len() > cap {
                let pruned = shrink_links(self.policy, n.id, &theirs, cap, &self.space);
                *theirs = pruned;
            }
        }
    }
}
