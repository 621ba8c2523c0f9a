//! # smallworld-core
//!
//! In-memory approximate nearest neighbor index built on Hierarchical
//! Navigable Small World graphs.
//!
//! Vectors are added under caller-chosen `u64` ids, the graph is built once
//! (optionally on several threads, optionally followed by a reverse-order
//! level-0 merge) and then answers concurrent k-NN queries.
//!
//! ```no_run
//! use smallworld_core::{DistanceKind, HnswConfig, HnswIndex};
//!
//! let config = HnswConfig::default().with_distance(DistanceKind::L2).with_m(4);
//! let mut index = HnswIndex::new(2, config);
//! index.add(1, &[0.0, 0.0])?;
//! index.add(2, &[1.0, 0.0])?;
//! index.build()?;
//! let hits = index.search(&[0.9, 0.0], 1, 10)?;
//! assert_eq!(hits[0].0, 2);
//! # Ok::<(), smallworld_core::HnswError>(())
//! ```

/// Global configuration constants: defaults and model format markers.
pub mod config;
/// Error type and result alias.
pub mod error;
/// HNSW graph engine: distance, graph, selection, insertion, merge, search.
pub mod hnsw;
/// The user-facing index: add, build, search, introspection.
pub mod index;
/// Model save/load with CRC32 integrity footer.
pub mod persistence;

pub use error::{HnswError, Result};
pub use hnsw::{DistanceKind, GraphPostProcessing, HnswConfig, NeighborSelectingPolicy};
pub use index::{BuildStats, GraphStats, HnswIndex};
