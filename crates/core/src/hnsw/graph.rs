//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, distance kind,
//! neighbor selection, post-processing). [`VectorStore`] is the contiguous
//! vector arena. [`Graph`] holds one [`GraphNode`] per vector plus the shared
//! entry point.
//!
//! Adjacency lists are guarded per node and per level so that concurrent
//! inserters never observe a half-written list and never contend on a global
//! lock. Every mutation path holds at most one adjacency lock at a time.

use crate::config;
use crate::error::{HnswError, Result};
use crate::hnsw::distance::DistanceKind;
use crate::hnsw::merge::GraphPostProcessing;
use crate::hnsw::select::NeighborSelectingPolicy;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration parameters for an HNSW index.
///
/// Fixed when the index is created. Controls the trade-off between build
/// speed, search speed, recall and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Distance function for similarity computation.
    pub distance_kind: DistanceKind,
    /// Pruning rule applied when a candidate edge set exceeds its cap.
    pub neighbor_selecting: NeighborSelectingPolicy,
    /// Maximum links per node on levels ≥ 1.
    pub m: usize,
    /// Maximum links per node on level 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Default candidate list size during search.
    pub ef_search: usize,
    /// Optional reverse-order build merged into level 0.
    pub post_processing: GraphPostProcessing,
    /// Number of build workers.
    pub num_threads: usize,
    /// Seed for level sampling.
    pub seed: u64,
    /// Upper bound for sampled levels.
    pub max_level: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            distance_kind: DistanceKind::default(),
            neighbor_selecting: NeighborSelectingPolicy::default(),
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M_MAX0,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            post_processing: GraphPostProcessing::default(),
            num_threads: config::HNSW_DEFAULT_NUM_THREADS,
            seed: config::HNSW_DEFAULT_SEED,
            max_level: config::HNSW_DEFAULT_MAX_LEVEL,
        }
    }
}

impl HnswConfig {
    pub fn with_distance(mut self, kind: DistanceKind) -> Self {
        self.distance_kind = kind;
        self
    }

    /// Set `m` and derive `m_max0 = 2 * m`.
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.m_max0 = m.saturating_mul(2);
        self
    }

    pub fn with_m_max0(mut self, m_max0: usize) -> Self {
        self.m_max0 = m_max0;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_neighbor_selecting(mut self, policy: NeighborSelectingPolicy) -> Self {
        self.neighbor_selecting = policy;
        self
    }

    pub fn with_post_processing(mut self, mode: GraphPostProcessing) -> Self {
        self.post_processing = mode;
        self
    }

    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Degree cap for the given level.
    #[inline]
    pub fn cap(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Level multiplier `1 / ln(M)` for the geometric level distribution.
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// Reject parameter combinations the builder cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(HnswError::config(format!("m must be at least 2, got {}", self.m)));
        }
        if self.m_max0 < self.m {
            return Err(HnswError::config(format!(
                "m_max0 ({}) must be >= m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 {
            return Err(HnswError::config("ef_construction must be at least 1"));
        }
        if self.num_threads == 0 {
            return Err(HnswError::config("num_threads must be at least 1"));
        }
        if self.max_level == 0 {
            return Err(HnswError::config("max_level must be at least 1"));
        }
        Ok(())
    }
}

/// Contiguous arena of prepared vectors, indexed by internal node id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector and return its internal id. Caller checks the length.
    pub fn push(&mut self, v: &[f32]) -> u32 {
        debug_assert_eq!(v.len(), self.dimension);
        let id = self.len() as u32;
        self.data.extend_from_slice(v);
        id
    }

    /// O(1) slice into the arena.
    #[inline]
    pub fn get(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub(crate) fn raw_len(&self) -> usize {
        self.data.len()
    }
}

/// One vector's place in the graph: its top level and an adjacency list per
/// level `0..=level`.
#[derive(Debug)]
pub struct GraphNode {
    level: usize,
    links: Vec<RwLock<Vec<u32>>>,
}

impl GraphNode {
    pub fn new(level: usize, m: usize, m_max0: usize) -> Self {
        let links = (0..=level)
            .map(|l| {
                let cap = if l == 0 { m_max0 } else { m };
                RwLock::new(Vec::with_capacity(cap + 1))
            })
            .collect();
        Self { level, links }
    }

    fn from_links(level: usize, links: Vec<Vec<u32>>) -> Self {
        Self {
            level,
            links: links.into_iter().map(RwLock::new).collect(),
        }
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Snapshot of the neighbors at `level`. Empty above the node's level.
    pub fn neighbors(&self, level: usize) -> Vec<u32> {
        match self.links.get(level) {
            Some(lock) => lock.read().clone(),
            None => Vec::new(),
        }
    }

    /// Number of neighbors at `level`.
    pub fn degree(&self, level: usize) -> usize {
        self.links.get(level).map_or(0, |lock| lock.read().len())
    }

    pub(crate) fn links(&self, level: usize) -> Option<RwLockReadGuard<'_, Vec<u32>>> {
        self.links.get(level).map(|lock| lock.read())
    }

    pub(crate) fn links_mut(&self, level: usize) -> RwLockWriteGuard<'_, Vec<u32>> {
        self.links[level].write()
    }

    pub(crate) fn set_links(&self, level: usize, neighbors: Vec<u32>) {
        *self.links[level].write() = neighbors;
    }
}

/// The node every descent starts from, located at the graph's maximum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub node: u32,
    pub level: usize,
}

/// Multi-level proximity graph over the ids `0..len`.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    entry_point: RwLock<Option<EntryPoint>>,
}

impl Graph {
    /// Allocate one unlinked node per pre-sampled level.
    pub fn with_levels(levels: &[usize], m: usize, m_max0: usize) -> Self {
        Self {
            nodes: levels
                .iter()
                .map(|&level| GraphNode::new(level, m, m_max0))
                .collect(),
            entry_point: RwLock::new(None),
        }
    }

    /// Rebuild a graph from its per-node adjacency (`[node][level][neighbor]`).
    pub fn from_links(links: Vec<Vec<Vec<u32>>>, entry_point: Option<EntryPoint>) -> Self {
        Self {
            nodes: links
                .into_iter()
                .map(|mut node_links| {
                    if node_links.is_empty() {
                        node_links.push(Vec::new());
                    }
                    let level = node_links.len() - 1;
                    GraphNode::from_links(level, node_links)
                })
                .collect(),
            entry_point: RwLock::new(entry_point),
        }
    }

    /// Copy out the adjacency as `[node][level][neighbor]`.
    pub fn to_links(&self) -> Vec<Vec<Vec<u32>>> {
        self.nodes
            .iter()
            .map(|node| (0..=node.level).map(|l| node.neighbors(l)).collect())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: u32) -> &GraphNode {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn entry_point(&self) -> Option<EntryPoint> {
        *self.entry_point.read()
    }

    /// Highest populated level, 0 for an empty graph.
    pub fn max_level(&self) -> usize {
        self.entry_point().map_or(0, |ep| ep.level)
    }

    /// Return the current entry point, or install `node` as the first one and
    /// return `None`. Exactly one of several racing inserters gets `None`.
    pub(crate) fn entry_point_or_init(&self, node: u32, level: usize) -> Option<EntryPoint> {
        if let Some(ep) = *self.entry_point.read() {
            return Some(ep);
        }
        let mut ep = self.entry_point.write();
        match *ep {
            Some(existing) => Some(existing),
            None => {
                *ep = Some(EntryPoint { node, level });
                None
            }
        }
    }

    /// Make `node` the entry point if its level strictly exceeds the current one.
    pub(crate) fn promote_entry_point(&self, node: u32, level: usize) -> bool {
        let mut ep = self.entry_point.write();
        match *ep {
            Some(current) if level <= current.level => false,
            _ => {
                *ep = Some(EntryPoint { node, level });
                true
            }
        }
    }

    /// Number of nodes reachable from the entry point over level-0 edges.
    pub fn level0_reachable(&self) -> usize {
        let Some(ep) = self.entry_point() else {
            return 0;
        };
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([ep.node]);
        seen[ep.node as usize] = true;
        let mut count = 0;
        while let Some(id) = queue.pop_front() {
            count += 1;
            for next in self.node(id).neighbors(0) {
                if !std::mem::replace(&mut seen[next as usize], true) {
                    queue.push_back(next);
                }
            }
        }
        count
    }
}

/// Seeded geometric level sampler: `floor(-ln(U) * mult)`, `U ∈ (0, 1]`.
#[derive(Debug)]
pub struct LevelSampler {
    rng: StdRng,
    mult: f64,
    max_level: usize,
}

impl LevelSampler {
    pub fn new(mult: f64, max_level: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            mult,
            max_level,
        }
    }

    pub fn sample(&mut self) -> usize {
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.mult).floor() as usize;
        level.min(self.max_level)
    }

    /// Draw `n` levels in order.
    pub fn sample_n(&mut self, n: usize) -> Vec<usize> {
        (0..n).map(|_| self.sample()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HnswConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.m_max0, 2 * config.m);
        assert_eq!(config.cap(0), config.m_max0);
        assert_eq!(config.cap(3), config.m);
    }

    #[test]
    fn test_config_rejects_bad_parameters() {
        assert!(HnswConfig::default().with_m(1).validate().is_err());
        assert!(HnswConfig::default().with_m(8).with_m_max0(4).validate().is_err());
        assert!(HnswConfig::default().with_ef_construction(0).validate().is_err());
        assert!(HnswConfig::default().with_num_threads(0).validate().is_err());
    }

    #[test]
    fn test_vector_store_slices() {
        let mut store = VectorStore::new(3);
        assert_eq!(store.push(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(store.push(&[4.0, 5.0, 6.0]), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_entry_point_compare_and_update() {
        let graph = Graph::with_levels(&[0, 2, 1, 3], 4, 8);
        assert!(graph.entry_point().is_none());
        assert_eq!(graph.entry_point_or_init(0, 0), None);
        assert_eq!(
            graph.entry_point_or_init(1, 2),
            Some(EntryPoint { node: 0, level: 0 })
        );
        assert!(graph.promote_entry_point(1, 2));
        assert!(!graph.promote_entry_point(2, 1));
        assert!(!graph.promote_entry_point(2, 2));
        assert!(graph.promote_entry_point(3, 3));
        assert_eq!(graph.entry_point(), Some(EntryPoint { node: 3, level: 3 }));
        assert_eq!(graph.max_level(), 3);
    }

    #[test]
    fn test_neighbors_above_level_are_empty() {
        let node = GraphNode::new(1, 4, 8);
        node.set_links(1, vec![7, 9]);
        assert_eq!(node.neighbors(1), vec![7, 9]);
        assert!(node.neighbors(2).is_empty());
        assert_eq!(node.degree(5), 0);
    }

    #[test]
    fn test_links_round_trip() {
        let links = vec![vec![vec![1], vec![1]], vec![vec![0], vec![0]], vec![vec![0]]];
        let graph = Graph::from_links(links.clone(), Some(EntryPoint { node: 0, level: 1 }));
        assert_eq!(graph.to_links(), links);
        assert_eq!(graph.node(2).level(), 0);
        assert_eq!(graph.level0_reachable(), 3);
    }

    #[test]
    fn test_level_sampler_is_seeded() {
        let a = LevelSampler::new(1.0 / 12f64.ln(), 16, 7).sample_n(1000);
        let b = LevelSampler::new(1.0 / 12f64.ln(), 16, 7).sample_n(1000);
        assert_eq!(a, b);
        let zeros = a.iter().filter(|&&l| l == 0).count();
        // P(level = 0) = 1 - 1/M ≈ 0.92 for M = 12
        assert!(zeros > 850 && zeros < 970, "unexpected level-0 share {zeros}");
        assert!(a.iter().all(|&l| l <= 16));
    }
}
