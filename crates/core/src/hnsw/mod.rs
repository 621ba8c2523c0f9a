//! Hierarchical Navigable Small World (HNSW) graph engine.
//!
//! Vectors live in a contiguous [`VectorStore`] arena addressed by internal
//! node ids (add order). The [`Graph`] keeps one adjacency list per node and
//! level, each behind its own lock, so construction can run on several
//! threads while queries only ever take short read locks.
//!
//! Construction is split into level sampling ([`LevelSampler`]), insertion
//! ([`GraphBuilder`]) and optional level-0 post-processing ([`merge`]).
//! Both finish with a [`repair`] pass that relinks any level-0 node the entry
//! point can no longer reach.

/// Distance kinds and the per-index distance oracle.
pub mod distance;
/// HNSW graph structure, configuration, and vector arena.
pub mod graph;
/// HNSW insertion algorithm and build drivers.
pub mod insert;
/// Reverse-order build and level-0 merge.
pub mod merge;
/// Level-0 reachability repair.
pub mod repair;
/// HNSW search: greedy descent, single-layer beam search, multi-layer KNN.
pub mod search;
/// Neighbor selection policies.
pub mod select;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use distance::{DistanceKind, Space};
pub use graph::{EntryPoint, Graph, GraphNode, HnswConfig, LevelSampler, VectorStore};
pub use insert::GraphBuilder;
pub use merge::GraphPostProcessing;
pub use repair::RepairStats;
pub use search::{knn_search, Neighbor};
pub use select::NeighborSelectingPolicy;
