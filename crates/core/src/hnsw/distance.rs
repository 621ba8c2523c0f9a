//! Distance metrics for graph construction and search.
//!
//! Supports three distance kinds: angular (cosine), L2 (squared Euclidean) and
//! dot product. Every kind returns a value where **lower is more similar**, so
//! the builder, selector and query engine share one ordering contract.
//!
//! Angular vectors are normalized once when they enter the index (see
//! [`DistanceKind::prepare`]), which reduces the angular kernel to
//! `1 - dot(a, b)`.

use crate::hnsw::graph::VectorStore;
use serde::{Deserialize, Serialize};

/// Distance function applied uniformly to every comparison in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Angular distance: `1 - cosine_similarity`. Range: \[0, 2\].
    #[default]
    Angular,
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    L2,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    Dot,
}

impl DistanceKind {
    /// Distance between two vectors already passed through [`prepare`](Self::prepare).
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceKind::Angular => 1.0 - dot_product_f32(a, b),
            DistanceKind::L2 => euclidean_sq_f32(a, b),
            DistanceKind::Dot => -dot_product_f32(a, b),
        }
    }

    /// Per-kind preprocessing applied to stored vectors and queries alike.
    ///
    /// Angular vectors are scaled to unit length; a zero vector stays zero and
    /// ends up at distance 1 from everything. Other kinds are copied as-is.
    pub fn prepare(&self, v: &[f32]) -> Vec<f32> {
        match self {
            DistanceKind::Angular => normalize(v),
            DistanceKind::L2 | DistanceKind::Dot => v.to_vec(),
        }
    }

    /// Name used in logs and benchmark output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceKind::Angular => "angular",
            DistanceKind::L2 => "l2",
            DistanceKind::Dot => "dot",
        }
    }
}

impl std::fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "angular" | "cosine" => Ok(DistanceKind::Angular),
            "l2" | "euclidean" => Ok(DistanceKind::L2),
            "dot" | "inner_product" => Ok(DistanceKind::Dot),
            other => Err(format!("unknown distance kind '{other}'")),
        }
    }
}

/// Distance oracle over the vector arena of one index.
///
/// Node ids are internal arena positions. Queries must already be prepared
/// with the same [`DistanceKind`].
#[derive(Clone, Copy)]
pub struct Space<'a> {
    vectors: &'a VectorStore,
    kind: DistanceKind,
}

impl<'a> Space<'a> {
    pub fn new(vectors: &'a VectorStore, kind: DistanceKind) -> Self {
        Self { vectors, kind }
    }

    #[inline]
    pub fn vector(&self, id: u32) -> &'a [f32] {
        self.vectors.get(id)
    }

    /// Distance from a prepared query to a stored node.
    #[inline]
    pub fn to_node(&self, query: &[f32], id: u32) -> f32 {
        self.kind.distance(query, self.vectors.get(id))
    }

    /// Distance between two stored nodes.
    #[inline]
    pub fn between(&self, a: u32, b: u32) -> f32 {
        self.kind.distance(self.vectors.get(a), self.vectors.get(b))
    }
}

/// Dot product between two f32 slices.
#[inline]
pub fn dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// Squared Euclidean distance between two f32 slices.
#[inline]
pub fn euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Scale a vector to unit L2 norm. Near-zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = dot_product_f32(v, v).sqrt();
    if norm < 1e-10 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}
