//! Reference-document ingestion into the vector index.
//!
//! Text extraction and chunking happen upstream (the PDF surface lives
//! with the document service); this path takes already-extracted text
//! pieces, cleans them, embeds them, L2-normalizes the vectors, and adds
//! them to the shared index before persisting a fresh snapshot.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::embedding::{l2_normalize, Embedder};
use crate::index::VectorIndex;
use crate::models::DocumentChunk;

/// Embed and index a batch of text pieces under one source tag.
///
/// Returns the number of chunks actually indexed. Blank pieces are
/// skipped; an empty batch is a no-op.
pub async fn ingest_texts(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    source: &str,
    texts: &[String],
) -> Result<usize> {
    let cleaned: Vec<String> = texts
        .iter()
        .map(|t| clean_text(t))
        .filter(|t| !t.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Ok(0);
    }

    let embeddings = embedder
        .embed(&cleaned)
        .await
        .context("Failed to embed document texts")?;

    if embeddings.len() != cleaned.len() {
        anyhow::bail!(
            "Embedding count mismatch: {} texts, {} vectors",
            cleaned.len(),
            embeddings.len()
        );
    }

    let chunks: Vec<DocumentChunk> = cleaned
        .into_iter()
        .zip(embeddings)
        .map(|(text, mut embedding)| {
            l2_normalize(&mut embedding);
            DocumentChunk {
                text,
                embedding,
                source: source.to_string(),
            }
        })
        .collect();

    let count = chunks.len();
    index.add(chunks).await;
    index.persist().await?;

    tracing::info!(source, count, "indexed document chunks");
    Ok(count)
}

/// Normalize whitespace: CRLF to LF, collapse 3+ newlines to two, collapse
/// runs of spaces and tabs.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    let mut spaces = 0;

    for c in text.chars() {
        match c {
            '\n' => {
                spaces = 0;
                newlines += 1;
                if newlines <= 2 {
                    out.push('\n');
                }
            }
            ' ' | '\t' => {
                spaces += 1;
                if spaces == 1 {
                    out.push(' ');
                }
            }
            _ => {
                newlines = 0;
                spaces = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Split file content into ingestible pieces on blank lines.
pub fn split_paragraphs(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ingest a plain-text file, one piece per paragraph, tagged with the
/// file name. CLI entry point.
pub async fn ingest_file(
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    path: &std::path::Path,
) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    ingest_texts(
        index.as_ref(),
        embedder.as_ref(),
        &source,
        &split_paragraphs(&content),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    #[test]
    fn test_clean_text_collapses_blank_lines() {
        assert_eq!(clean_text("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_text_collapses_spaces() {
        assert_eq!(clean_text("a   b\t\tc"), "a b c");
    }

    #[test]
    fn test_clean_text_normalizes_crlf() {
        assert_eq!(clean_text("a\r\nb"), "a\nb");
    }

    #[test]
    fn test_split_paragraphs() {
        let pieces = split_paragraphs("first\n\nsecond\n\n\n\nthird");
        assert_eq!(pieces, vec!["first", "second", "third"]);
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_ingest_normalizes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = VectorIndex::load(&path).unwrap();

        let count = ingest_texts(
            &index,
            &UnitEmbedder,
            "notes.txt",
            &["some text".to_string(), "   ".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(count, 1);
        let hits = index.query(&[0.6, 0.8], 1).await;
        assert!((hits[0].distance - 0.0).abs() < 1e-6);

        // Snapshot landed on disk
        let reloaded = VectorIndex::load(&path).unwrap();
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::load(&dir.path().join("index.json")).unwrap();
        let count = ingest_texts(&index, &UnitEmbedder, "empty", &[]).await.unwrap();
        assert_eq!(count, 0);
    }
}
