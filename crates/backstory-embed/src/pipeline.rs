//! Chunk production plus vector generation around one loaded encoder.

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::info;

use backstory_core::chunker::RecursiveChunker;
use backstory_core::config::{ChunkingSettings, EmbeddingSettings};
use backstory_core::traits::Embedder;
use backstory_core::types::{Chunk, Document};

use crate::get_default_embedder;

pub struct EmbeddingPipeline {
    embedder: Box<dyn Embedder>,
    chunker: RecursiveChunker,
    batch_size: usize,
}

impl EmbeddingPipeline {
    pub fn new(embedder: Box<dyn Embedder>, chunker: RecursiveChunker, batch_size: usize) -> Self {
        Self { embedder, chunker, batch_size: batch_size.max(1) }
    }

    /// Loads the encoder once; failing to load it is fatal for the caller.
    pub fn from_settings(chunking: ChunkingSettings, embedding: &EmbeddingSettings) -> Result<Self> {
        let chunker = RecursiveChunker::new(chunking)?;
        let embedder = get_default_embedder(embedding)?;
        Ok(Self::new(embedder, chunker, embedding.batch_size))
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        self.chunker.chunk_documents(documents)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let v = self.embedder.embed_text(text)?;
        ensure!(v.len() == self.dim(), "encoder returned {}-d vector, expected {}", v.len(), self.dim());
        Ok(v)
    }

    /// Order-preserving batch form of [`EmbeddingPipeline::encode`].
    pub fn encode_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts)?;
        ensure!(vectors.len() == texts.len(), "encoder returned {} vectors for {} texts", vectors.len(), texts.len());
        for v in &vectors {
            ensure!(v.len() == self.dim(), "encoder returned {}-d vector, expected {}", v.len(), self.dim());
        }
        Ok(vectors)
    }

    /// Encodes chunk texts in batches, reporting progress.
    pub fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let pb = ProgressBar::new(chunks.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            vectors.extend(self.encode_many(&texts)?);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        info!(
            chunks = chunks.len(),
            dim = self.dim(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated embeddings"
        );
        Ok(vectors)
    }
}
