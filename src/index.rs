//! Persistent nearest-neighbor store over embedded text chunks.
//!
//! The index is shared across all rooms: similarity queries run while new
//! reference documents are being ingested, so all access goes through an
//! interior `tokio::sync::RwLock`. Readers see a consistent snapshot;
//! writers take the lock exclusively. There is no ambient global — the
//! index is constructed once and handed to the retriever and the ingestion
//! path behind an `Arc`.
//!
//! Distance is squared Euclidean over L2-normalized vectors, so it lives in
//! `[0, 4]` and relates to cosine similarity `s` as `distance = 2 - 2s`.
//! Normalization happens in the ingestion path before chunks reach `add`.
//!
//! Persistence is a JSON snapshot written atomically (temp file + rename).
//! Loading a missing snapshot is not an error: callers build from empty.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::models::{DocumentChunk, SimilarityHit};

pub struct VectorIndex {
    path: PathBuf,
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl VectorIndex {
    /// Load the snapshot at `path`, or start empty if none exists.
    pub fn load(path: &Path) -> Result<Self> {
        let chunks = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt index snapshot: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read index: {}", path.display()))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            chunks: RwLock::new(chunks),
        })
    }

    /// Append chunks under the write lock.
    pub async fn add(&self, new_chunks: Vec<DocumentChunk>) {
        let mut chunks = self.chunks.write().await;
        chunks.extend(new_chunks);
    }

    /// The `k` nearest chunks to `query_embedding`, ascending by distance.
    pub async fn query(&self, query_embedding: &[f32], k: usize) -> Vec<SimilarityHit> {
        let chunks = self.chunks.read().await;

        let mut hits: Vec<SimilarityHit> = chunks
            .iter()
            .filter(|c| c.embedding.len() == query_embedding.len())
            .map(|c| SimilarityHit {
                chunk: c.clone(),
                distance: squared_euclidean(query_embedding, &c.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Write the snapshot to disk. Readers holding the lock block the
    /// serialization briefly; the file swap itself is atomic.
    pub async fn persist(&self) -> Result<()> {
        let chunks = self.chunks.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(&*chunks)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write index: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

/// Squared Euclidean distance between two equal-length vectors.
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
