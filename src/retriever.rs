//! Similarity retrieval with threshold filtering and deduplication.
//!
//! Wraps a [`VectorIndex`] query in the policy the pipeline needs: drop
//! hits past the distance threshold (everything less similar is noise),
//! dedup by content hash preserving closest-first order, cap at `k`.
//!
//! Retrieval is best-effort. An embedding or query failure degrades to an
//! empty result with a `warn` — the pipeline never fails because the
//! reference material was unreachable.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use crate::embedding::{embed_query, Embedder};
use crate::index::VectorIndex;
use crate::models::{DocumentChunk, SimilarityHit};

pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        Self {
            index,
            embedder,
            threshold,
        }
    }

    /// Up to `k` relevant, deduplicated chunks for `query`, closest first.
    /// Returns an empty list on any failure.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<DocumentChunk> {
        let query_vec = match embed_query(self.embedder.as_ref(), query).await {
            Ok(mut v) => {
                crate::embedding::l2_normalize(&mut v);
                v
            }
            Err(e) => {
                tracing::warn!("similarity query skipped, embedding failed: {:#}", e);
                return Vec::new();
            }
        };

        let hits = self.index.query(&query_vec, k).await;
        filter_hits(hits, self.threshold, k)
    }
}

/// Apply the threshold / dedup / cap policy to raw hits.
///
/// Hits arrive in ascending-distance order and leave in the same order.
/// Deduplication keys on the SHA-256 of the chunk text, keeping the
/// first (closest) occurrence.
pub fn filter_hits(hits: Vec<SimilarityHit>, threshold: f32, k: usize) -> Vec<DocumentChunk> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for hit in hits {
        if hit.distance >= threshold {
            tracing::debug!("filtered out chunk at distance {:.4}", hit.distance);
            continue;
        }

        let digest: [u8; 32] = Sha256::digest(hit.chunk.text.as_bytes()).into();
        if !seen.insert(digest) {
            continue;
        }

        kept.push(hit.chunk);
        if kept.len() == k {
            break;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    fn hit(text: &str, distance: f32) -> SimilarityHit {
        SimilarityHit {
            chunk: DocumentChunk {
                text: text.to_string(),
                embedding: vec![1.0, 0.0],
                source: "test".to_string(),
            },
            distance,
        }
    }

    #[test]
    fn test_filter_drops_hits_past_threshold() {
        let hits = vec![hit("a", 0.2), hit("b", 1.2), hit("c", 3.0)];
        let kept = filter_hits(hits, 1.2, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "a");
    }

    #[test]
    fn test_filter_preserves_ascending_order() {
        let hits = vec![hit("close", 0.1), hit("mid", 0.5), hit("far", 1.0)];
        let kept = filter_hits(hits, 1.2, 5);
        let texts: Vec<&str> = kept.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["close", "mid", "far"]);
    }

    #[test]
    fn test_filter_dedups_by_content() {
        let hits = vec![hit("same", 0.1), hit("same", 0.3), hit("other", 0.5)];
        let kept = filter_hits(hits, 1.2, 5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].text, "same");
        assert_eq!(kept[1].text, "other");
    }

    #[test]
    fn test_filter_caps_at_k() {
        let hits = (0..10).map(|i| hit(&format!("c{}", i), 0.1)).collect();
        let kept = filter_hits(hits, 1.2, 3);
        assert_eq!(kept.len(), 3);
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("embedding service down")
        }
    }

    #[tokio::test]
    async fn test_retrieve_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(VectorIndex::load(&dir.path().join("index.json")).unwrap());
        let retriever = Retriever::new(index, Arc::new(FailingEmbedder), 1.2);

        let chunks = retriever.retrieve("anything", 5).await;
        assert!(chunks.is_empty());
    }
}
