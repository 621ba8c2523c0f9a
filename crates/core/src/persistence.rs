//! Disk persistence for built indexes using bincode serialization.
//!
//! A model file is the bincode payload of an [`IndexSnapshot`] followed by an
//! 8-byte footer `[magic "SWG1"][u32 CRC32 BE]`. Writes go to a temp file that
//! is renamed over the target, so a crash never leaves a half-written model.

use crate::config::{MODEL_CRC_MAGIC, MODEL_FOOTER_LEN};
use crate::error::{HnswError, Result};
use crate::hnsw::graph::{EntryPoint, Graph, HnswConfig, VectorStore};
use crate::index::HnswIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed to restore a built index.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub config: HnswConfig,
    pub vectors: VectorStore,
    pub ids: Vec<u64>,
    /// Adjacency as `[node][level][neighbor]`.
    pub links: Vec<Vec<Vec<u32>>>,
    pub entry_point: Option<EntryPoint>,
}

impl IndexSnapshot {
    fn capture(index: &HnswIndex) -> Result<Self> {
        let graph = index
            .graph
            .as_ref()
            .ok_or_else(|| HnswError::config("index must be built before saving"))?;
        Ok(Self {
            config: index.config.clone(),
            vectors: index.vectors.clone(),
            ids: index.ids.clone(),
            links: graph.to_links(),
            entry_point: graph.entry_point(),
        })
    }

    /// Check structural invariants after deserialization.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.ids.len();
        let dim = self.vectors.dimension();
        if dim == 0 {
            return Err("dimension is zero".into());
        }
        if self.vectors.raw_len() != n * dim {
            return Err(format!(
                "vector arena holds {} floats, expected {} ({} x {})",
                self.vectors.raw_len(),
                n * dim,
                n,
                dim
            ));
        }
        if self.links.len() != n {
            return Err(format!("{} adjacency entries for {} vectors", self.links.len(), n));
        }
        self.config.validate().map_err(|e| e.to_string())?;

        for (node, levels) in self.links.iter().enumerate() {
            if levels.is_empty() {
                return Err(format!("node {node} has no level 0"));
            }
            for (level, neighbors) in levels.iter().enumerate() {
                if neighbors.len() > self.config.cap(level) {
                    return Err(format!(
                        "node {node} has {} links on level {level}, cap is {}",
                        neighbors.len(),
                        self.config.cap(level)
                    ));
                }
                if let Some(&bad) = neighbors.iter().find(|&&id| id as usize >= n) {
                    return Err(format!("node {node} links to out-of-range node {bad}"));
                }
            }
        }

        match self.entry_point {
            None if n > 0 => Err("non-empty graph without entry point".into()),
            Some(_) if n == 0 => Err("empty graph with an entry point".into()),
            Some(ep) if ep.node as usize >= n => Err(format!("entry point {} out of range", ep.node)),
            Some(ep) if self.links[ep.node as usize].len() != ep.level + 1 => Err(format!(
                "entry point {} does not reach level {}",
                ep.node, ep.level
            )),
            _ => Ok(()),
        }
    }

    fn into_index(self) -> Result<HnswIndex> {
        let mut id_to_node = HashMap::with_capacity(self.ids.len());
        for (node, &id) in self.ids.iter().enumerate() {
            if id_to_node.insert(id, node as u32).is_some() {
                return Err(HnswError::Corrupt(format!("duplicate vector id {id}")));
            }
        }
        Ok(HnswIndex {
            config: self.config,
            vectors: self.vectors,
            ids: self.ids,
            id_to_node,
            graph: Some(Graph::from_links(self.links, self.entry_point)),
        })
    }
}

/// Save a built index with an atomic write and a CRC32 footer.
pub fn save_index(index: &HnswIndex, path: &Path) -> Result<()> {
    let snapshot = IndexSnapshot::capture(index)?;
    let bytes = bincode::serialize(&snapshot)?;
    let crc = crc32fast::hash(&bytes);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);

    // Write: [bincode payload][magic 4 bytes][CRC32 4 bytes BE]
    let mut output = Vec::with_capacity(bytes.len() + MODEL_FOOTER_LEN);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(MODEL_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        "Saved index to {:?} ({} vectors, {} bytes, CRC32={:#010x})",
        path,
        snapshot.ids.len(),
        bytes.len(),
        crc
    );
    Ok(())
}

/// Load an index written by [`save_index`], verifying its CRC32 footer and
/// graph structure.
pub fn load_index(path: &Path) -> Result<HnswIndex> {
    let raw = fs::read(path)?;

    if raw.len() < MODEL_FOOTER_LEN || &raw[raw.len() - 8..raw.len() - 4] != MODEL_CRC_MAGIC {
        return Err(HnswError::Corrupt(format!("{path:?} has no model footer")));
    }
    let payload = &raw[..raw.len() - MODEL_FOOTER_LEN];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(HnswError::Corrupt(format!(
            "CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x} in {path:?}"
        )));
    }
    tracing::debug!("Model CRC32 verified: {:#010x}", stored_crc);

    let snapshot: IndexSnapshot = bincode::deserialize(payload)?;
    snapshot
        .validate()
        .map_err(|e| HnswError::Corrupt(format!("model validation failed: {e}")))?;

    let index = snapshot.into_index()?;
    tracing::info!("Loaded index from {:?} ({} vectors)", path, index.len());
    Ok(index)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
