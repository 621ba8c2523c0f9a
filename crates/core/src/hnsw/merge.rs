//! Level-0 post-processing.
//!
//! `MergeLevel0` builds a second graph over the same vectors, inserting them
//! in reverse order with independently sampled levels, then folds its level-0
//! edges into the primary graph. Nodes added early in the primary build only
//! saw a small prefix of the data; the reverse pass gives them edges chosen
//! with the whole dataset in view.

use crate::config::REVERSE_GRAPH_SEED_SALT;
use crate::error::Result;
use crate::hnsw::distance::Space;
use crate::hnsw::graph::{Graph, HnswConfig, LevelSampler};
use crate::hnsw::insert::GraphBuilder;
use crate::hnsw::repair::repair_level0;
use crate::hnsw::search::Neighbor;
use crate::hnsw::select::{select_neighbors, NeighborSelectingPolicy};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Optional step run after the primary build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphPostProcessing {
    /// Leave the graph as built.
    #[default]
    Skip,
    /// Union level 0 with a reverse-order build and re-prune.
    MergeLevel0,
}

impl std::str::FromStr for GraphPostProcessing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(GraphPostProcessing::Skip),
            "merge_level0" => Ok(GraphPostProcessing::MergeLevel0),
            other => Err(format!("unknown post-processing mode '{other}'")),
        }
    }
}

/// Build the reverse-order companion of a primary graph over `space`.
///
/// Internal ids are shared with the primary graph; only the insertion order
/// and the level draw differ.
pub fn build_reverse_graph(config: &HnswConfig, space: Space<'_>, n: usize) -> Result<Graph> {
    let order: Vec<u32> = (0..n as u32).rev().collect();
    let mut sampler = LevelSampler::new(
        config.level_mult(),
        config.max_level,
        config.seed ^ REVERSE_GRAPH_SEED_SALT,
    );
    // Draw in insertion order so the first reverse insert gets the first level.
    let mut levels = vec![0usize; n];
    for &node in &order {
        levels[node as usize] = sampler.sample();
    }
    GraphBuilder::new(config, space).build(&order, &levels)
}

/// Compute the merged level-0 adjacency of every node.
///
/// For each node the primary list comes first, then reverse entries not
/// already present; the union is sorted by `(distance, id)` and pruned to
/// `m_max0` with `policy`. Neither graph is modified.
pub fn merge_level0(
    primary: &Graph,
    reverse: &Graph,
    space: &Space<'_>,
    policy: NeighborSelectingPolicy,
    m_max0: usize,
) -> Vec<Vec<u32>> {
    (0..primary.len() as u32)
        .into_par_iter()
        .map(|node| {
            let mut union = primary.node(node).neighbors(0);
            for id in reverse.node(node).neighbors(0) {
                if id != node && !union.contains(&id) {
                    union.push(id);
                }
            }
            let mut candidates: Vec<Neighbor> = union
                .into_iter()
                .map(|id| Neighbor::new(id, space.between(node, id)))
                .collect();
            candidates.sort_unstable();
            select_neighbors(policy, &candidates, m_max0, space)
                .into_iter()
                .map(|n| n.id)
                .collect()
        })
        .collect()
}

/// Run the configured post-processing on a freshly built graph.
///
/// Merged lists are computed in full before any is written back, so an error
/// while building the reverse graph leaves `primary` untouched. The merged
/// level 0 is repaired before returning, so it reaches every node.
pub fn post_process(config: &HnswConfig, space: Space<'_>, primary: &Graph) -> Result<()> {
    match config.post_processing {
        GraphPostProcessing::Skip => Ok(()),
        GraphPostProcessing::MergeLevel0 => {
            let started = Instant::now();
            let reverse = build_reverse_graph(config, space, primary.len())?;
            tracing::debug!(
                nodes = reverse.len(),
                max_level = reverse.max_level(),
                "Reverse graph built"
            );

            let merged = merge_level0(primary, &reverse, &space, config.neighbor_selecting, config.m_max0);
            for (node, links) in merged.into_iter().enumerate() {
                primary.node(node as u32).set_links(0, links);
            }
            // Re-pruning drops reverse edges as freely as the build did.
            let repaired = repair_level0(primary, &space, config.m_max0, config.ef_construction);
            tracing::debug!(
                nodes = primary.len(),
                repaired = repaired.edges_added,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Level 0 merged"
            );
            Ok(())
        }
    }
}
