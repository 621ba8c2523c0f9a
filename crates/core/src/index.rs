//! The user-facing HNSW index.
//!
//! An [`HnswIndex`] has two phases. While unbuilt it accepts vectors through
//! [`add`](HnswIndex::add); [`build`](HnswIndex::build) then constructs the
//! graph once, after which the index is read-only and answers queries from
//! any number of threads.

use crate::error::{HnswError, Result};
use crate::hnsw::distance::Space;
use crate::hnsw::graph::{Graph, HnswConfig, LevelSampler, VectorStore};
use crate::hnsw::insert::GraphBuilder;
use crate::hnsw::merge::{post_process, GraphPostProcessing};
use crate::hnsw::search::knn_search;
use crate::persistence;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    pub nodes: usize,
    pub max_level: usize,
    pub post_processing: GraphPostProcessing,
    pub elapsed: Duration,
}

/// Structural summary of a built graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub max_level: usize,
    /// External id of the entry point.
    pub entry_point: Option<u64>,
    /// `nodes_per_level[l]` counts nodes whose top level is at least `l`.
    pub nodes_per_level: Vec<usize>,
    pub avg_degree_per_level: Vec<f64>,
    /// Nodes reachable from the entry point over level-0 edges.
    pub level0_reachable: usize,
}

/// In-memory HNSW index over `u64`-keyed vectors.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) vectors: VectorStore,
    /// External id of every internal node, in add order.
    pub(crate) ids: Vec<u64>,
    pub(crate) id_to_node: HashMap<u64, u32>,
    pub(crate) graph: Option<Graph>,
}

impl HnswIndex {
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            vectors: VectorStore::new(dimension),
            ids: Vec::new(),
            id_to_node: HashMap::new(),
            graph: None,
        }
    }

    /// Queue a vector for the build.
    ///
    /// A rejected vector leaves the index unchanged; earlier vectors stay
    /// queued.
    pub fn add(&mut self, id: u64, vector: &[f32]) -> Result<()> {
        if self.graph.is_some() {
            return Err(HnswError::config("cannot add vectors after build"));
        }
        if self.dimension() == 0 {
            return Err(HnswError::config("index dimension must be at least 1"));
        }
        if vector.len() != self.dimension() {
            tracing::warn!(
                id,
                expected = self.dimension(),
                actual = vector.len(),
                "Rejected vector with wrong dimension"
            );
            return Err(HnswError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        if self.id_to_node.contains_key(&id) {
            tracing::warn!(id, "Rejected duplicate vector id");
            return Err(HnswError::DuplicateId(id));
        }
        if self.ids.len() >= u32::MAX as usize {
            return Err(HnswError::config("index is full"));
        }

        let prepared = self.config.distance_kind.prepare(vector);
        let node = self.vectors.push(&prepared);
        self.ids.push(id);
        self.id_to_node.insert(id, node);
        Ok(())
    }

    /// Build the graph over every queued vector.
    ///
    /// The graph is installed only when construction and post-processing both
    /// succeed; on error the index stays unbuilt.
    pub fn build(&mut self) -> Result<BuildStats> {
        if self.graph.is_some() {
            return Err(HnswError::config("index is already built"));
        }
        self.config.validate()?;
        if self.dimension() == 0 {
            return Err(HnswError::config("index dimension must be at least 1"));
        }
        let n = self.ids.len();
        if n == 0 && self.config.post_processing == GraphPostProcessing::MergeLevel0 {
            return Err(HnswError::config("level-0 merge requested on an empty index"));
        }

        tracing::info!(
            nodes = n,
            dimension = self.dimension(),
            distance = %self.config.distance_kind,
            m = self.config.m,
            ef_construction = self.config.ef_construction,
            threads = self.config.num_threads,
            "Building HNSW index"
        );
        let started = Instant::now();

        let levels =
            LevelSampler::new(self.config.level_mult(), self.config.max_level, self.config.seed).sample_n(n);
        let order: Vec<u32> = (0..n as u32).collect();
        let space = Space::new(&self.vectors, self.config.distance_kind);
        let graph = GraphBuilder::new(&self.config, space).build(&order, &levels)?;
        post_process(&self.config, space, &graph)?;

        let stats = BuildStats {
            nodes: n,
            max_level: graph.max_level(),
            post_processing: self.config.post_processing,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            nodes = stats.nodes,
            max_level = stats.max_level,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "HNSW index built"
        );
        self.graph = Some(graph);
        Ok(stats)
    }

    /// Return the `k` nearest stored vectors as `(id, distance)`, closest
    /// first.
    ///
    /// `ef_search` must be at least `k`. A built index with no vectors yields
    /// an empty result.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(u64, f32)>> {
        check_ef(k, ef_search)?;
        let graph = self.built_graph()?;
        self.check_dimension(query)?;
        let prepared = self.config.distance_kind.prepare(query);
        Ok(self.search_prepared(graph, &prepared, k, ef_search))
    }

    /// [`search`](Self::search) with the configured `ef_search`, raised to `k`.
    pub fn search_default(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        self.search(query, k, self.config.ef_search.max(k))
    }

    /// Search with the stored vector of `id`. The vector itself is among the
    /// results.
    pub fn search_by_id(&self, id: u64, k: usize, ef_search: usize) -> Result<Vec<(u64, f32)>> {
        check_ef(k, ef_search)?;
        let graph = self.built_graph()?;
        let node = *self.id_to_node.get(&id).ok_or(HnswError::UnknownId(id))?;
        Ok(self.search_prepared(graph, self.vectors.get(node), k, ef_search))
    }

    /// Run many queries on a dedicated pool of `num_threads` workers.
    /// Results come back in input order.
    pub fn batch_search(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        ef_search: usize,
        num_threads: usize,
    ) -> Result<Vec<Vec<(u64, f32)>>> {
        check_ef(k, ef_search)?;
        let graph = self.built_graph()?;
        if num_threads == 0 {
            return Err(HnswError::config("num_threads must be at least 1"));
        }
        for query in queries {
            self.check_dimension(query)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("smallworld-query-{i}"))
            .build()?;
        let kind = self.config.distance_kind;
        Ok(pool.install(|| {
            queries
                .par_iter()
                .map(|q| self.search_prepared(graph, &kind.prepare(q), k, ef_search))
                .collect()
        }))
    }

    fn search_prepared(&self, graph: &Graph, query: &[f32], k: usize, ef_search: usize) -> Vec<(u64, f32)> {
        let space = Space::new(&self.vectors, self.config.distance_kind);
        knn_search(graph, &space, query, k, ef_search)
            .into_iter()
            .map(|n| (self.ids[n.id as usize], n.distance))
            .collect()
    }

    fn built_graph(&self) -> Result<&Graph> {
        self.graph
            .as_ref()
            .ok_or_else(|| HnswError::config("index must be built before searching"))
    }

    fn check_dimension(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension() {
            return Err(HnswError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.id_to_node.contains_key(&id)
    }

    /// The built graph. Node ids are internal add-order positions; see
    /// [`external_id`](Self::external_id).
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    pub fn external_id(&self, node: u32) -> Option<u64> {
        self.ids.get(node as usize).copied()
    }

    /// The stored vector of `id`. Angular indexes store unit-length copies.
    pub fn get_vector(&self, id: u64) -> Option<&[f32]> {
        self.id_to_node.get(&id).map(|&node| self.vectors.get(node))
    }

    /// Per-level structure of the built graph. Empty before build.
    pub fn stats(&self) -> GraphStats {
        let Some(graph) = &self.graph else {
            return GraphStats::default();
        };
        let max_level = graph.max_level();
        let mut nodes_per_level = vec![0usize; max_level + 1];
        let mut edges_per_level = vec![0usize; max_level + 1];
        for node in graph.nodes() {
            for l in 0..=node.level().min(max_level) {
                nodes_per_level[l] += 1;
                edges_per_level[l] += node.degree(l);
            }
        }
        let avg_degree_per_level = nodes_per_level
            .iter()
            .zip(&edges_per_level)
            .map(|(&n, &e)| if n == 0 { 0.0 } else { e as f64 / n as f64 })
            .collect();
        GraphStats {
            nodes: graph.len(),
            max_level,
            entry_point: graph.entry_point().map(|ep| self.ids[ep.node as usize]),
            nodes_per_level,
            avg_degree_per_level,
            level0_reachable: graph.level0_reachable(),
        }
    }

    /// Write the built index to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save_index(self, path.as_ref())
    }

    /// Read an index written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        persistence::load_index(path.as_ref())
    }
}

fn check_ef(k: usize, ef_search: usize) -> Result<()> {
    if ef_search < k {
        return Err(HnswError::config(format!(
            "ef_search ({ef_search}) must be >= k ({k})"
        )));
    }
    Ok(())
}
