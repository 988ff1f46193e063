//! Offline construction of one source's store.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use backstory_core::config::SourceSettings;
use backstory_core::types::Document;
use backstory_embed::EmbeddingPipeline;

use crate::store::VectorStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub source: String,
    pub chunks: usize,
    pub dim: usize,
    pub dir: PathBuf,
}

/// Documents whose loader name equals `file` exactly.
pub fn documents_for_file<'a>(documents: &'a [Document], file: &str) -> Vec<&'a Document> {
    documents.iter().filter(|d| d.source == file).collect()
}

/// Chunks, encodes and persists the document configured for `source` into `dir`.
///
/// A missing document is an error. Whatever was in `dir` before is discarded.
pub fn build_source_store(
    pipeline: &EmbeddingPipeline,
    documents: &[Document],
    source: &SourceSettings,
    dir: &Path,
) -> Result<BuildReport> {
    let selected: Vec<Document> = documents_for_file(documents, &source.file).into_iter().cloned().collect();
    if selected.is_empty() {
        bail!("source '{}' expects '{}', which was not found among the loaded documents", source.id, source.file);
    }
    build_store(pipeline, &selected, dir).with_context(|| format!("building store for '{}'", source.id))
}

/// Chunks `documents`, encodes every chunk and writes a fresh store to `dir`.
pub fn build_store(pipeline: &EmbeddingPipeline, documents: &[Document], dir: &Path) -> Result<BuildReport> {
    let started = Instant::now();
    let chunks = pipeline.chunk_documents(documents);
    if chunks.is_empty() {
        bail!("no chunks produced for {}", dir.display());
    }
    let vectors = pipeline.embed_chunks(&chunks)?;

    VectorStore::discard(dir)?;
    let mut store = VectorStore::new(dir);
    store.append(&vectors, &chunks)?;
    store.persist()?;

    let source = documents.first().map(|d| d.source.clone()).unwrap_or_default();
    info!(
        source = %source,
        chunks = chunks.len(),
        dir = %dir.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built vector store"
    );
    Ok(BuildReport { source, chunks: chunks.len(), dim: pipeline.dim(), dir: dir.to_path_buf() })
}
