//! A [`FlatIndex`] bound to a directory holding its two artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use backstory_core::error::{Error, Result};
use backstory_core::traits::VectorSearch;
use backstory_core::types::{Chunk, EvidenceItem};

use crate::artifacts::{self, METADATA_FILE, VECTORS_FILE};
use crate::index::FlatIndex;

#[derive(Debug, Clone)]
pub struct VectorStore {
    dir: PathBuf,
    index: FlatIndex,
}

impl VectorStore {
    /// Empty store; nothing is read or written until [`persist`](Self::persist) or [`restore`](Self::restore).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), index: FlatIndex::new() }
    }

    /// Opens a previously persisted store.
    ///
    /// Returns [`Error::NotFound`] when the artifacts are absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(dir);
        if !store.restore()? {
            return Err(Error::NotFound(format!("no vector store in {}", store.dir.display())));
        }
        Ok(store)
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn append(&mut self, vectors: &[Vec<f32>], metadatas: &[Chunk]) -> Result<()> {
        self.index.append(vectors, metadatas)
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<EvidenceItem>> {
        self.index.search(query, top_k)
    }

    /// Writes both artifacts, replacing any previous ones.
    pub fn persist(&self) -> Result<()> {
        let Some(dim) = self.index.dim().filter(|_| !self.index.is_empty()) else {
            return Err(Error::EmptyIndex);
        };
        fs::create_dir_all(&self.dir)?;
        artifacts::write_vectors(&self.vectors_path(), dim, self.index.raw_vectors())?;
        artifacts::write_metadata(&self.metadata_path(), self.index.records())?;
        info!(dir = %self.dir.display(), vectors = self.index.len(), dim, "persisted vector store");
        Ok(())
    }

    /// Replaces the in-memory state with the persisted one.
    ///
    /// `Ok(false)` means the store was never built (either artifact missing)
    /// and leaves the current state untouched. Artifacts that disagree on the
    /// record count are reported as [`Error::Corrupt`].
    pub fn restore(&mut self) -> Result<bool> {
        let vectors_path = self.vectors_path();
        let metadata_path = self.metadata_path();
        if !vectors_path.is_file() || !metadata_path.is_file() {
            warn!(dir = %self.dir.display(), "vector store artifacts not found");
            return Ok(false);
        }
        let artifact = artifacts::read_vectors(&vectors_path)?;
        let records = artifacts::read_metadata(&metadata_path)?;
        if artifact.count != records.len() {
            return Err(Error::Corrupt {
                path: self.dir.display().to_string(),
                reason: format!("{} vectors but {} metadata records", artifact.count, records.len()),
            });
        }
        self.index = FlatIndex::from_parts(artifact.dim, artifact.data, records)?;
        info!(dir = %self.dir.display(), vectors = self.index.len(), dim = artifact.dim, "restored vector store");
        Ok(true)
    }

    /// Deletes the store directory and everything in it, if present.
    pub fn discard(dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
            info!(dir = %dir.display(), "discarded previous vector store");
        }
        Ok(())
    }
}

impl VectorSearch for VectorStore {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<EvidenceItem>> {
        self.index.search(query, top_k)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
