//! Global configuration constants for smallworld.
//!
//! All tuning defaults and structural limits are defined here. These are
//! compile-time constants; runtime configuration is carried by
//! [`HnswConfig`](crate::hnsw::HnswConfig), whose `Default` impl reads them.

/// Default maximum number of links per node on levels ≥ 1.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–48. Also drives level sampling (`mult = 1 / ln(M)`).
pub const HNSW_DEFAULT_M: usize = 12;

/// Default maximum number of links per node on level 0 (`2 * M`).
pub const HNSW_DEFAULT_M_MAX0: usize = HNSW_DEFAULT_M * 2;

/// Default beam width during index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 150;

/// Default beam width during search.
///
/// Used by [`HnswIndex::search_default`](crate::HnswIndex::search_default).
/// Always raised to at least `k`.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Hard cap on the sampled level of any node.
pub const HNSW_DEFAULT_MAX_LEVEL: usize = 16;

/// Default number of build workers. 1 = sequential, bit-reproducible build.
pub const HNSW_DEFAULT_NUM_THREADS: usize = 1;

/// Default seed for level sampling.
pub const HNSW_DEFAULT_SEED: u64 = 3;

/// Mixed into the configured seed to draw levels for the reverse-order graph
/// built by level-0 merging, so both graphs get independent hierarchies.
pub const REVERSE_GRAPH_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Magic bytes written before the CRC32 footer of a saved model.
pub const MODEL_CRC_MAGIC: &[u8; 4] = b"SWG1";

/// Size of the model footer: 4 magic bytes + 4 CRC32 bytes.
pub const MODEL_FOOTER_LEN: usize = 8;
