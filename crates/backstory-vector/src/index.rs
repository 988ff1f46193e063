//! Append-only flat index: a contiguous vector buffer plus co-indexed chunk records.

use tracing::debug;

use backstory_core::error::{Error, Result};
use backstory_core::traits::VectorSearch;
use backstory_core::types::{Chunk, EvidenceItem};

use crate::search::nearest;

/// Row `i` of `vectors` belongs to `records[i]`; both grow together or not at all.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dim: Option<usize>,
    vectors: Vec<f32>,
    records: Vec<Chunk>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from persisted parts, checking they agree.
    pub fn from_parts(dim: usize, vectors: Vec<f32>, records: Vec<Chunk>) -> Result<Self> {
        if records.is_empty() {
            return Ok(Self::new());
        }
        if dim == 0 || vectors.len() != dim * records.len() {
            return Err(Error::LengthMismatch { vectors: if dim == 0 { 0 } else { vectors.len() / dim }, metadatas: records.len() });
        }
        Ok(Self { dim: Some(dim), vectors, records })
    }

    /// Fixed by the first non-empty append.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Chunk] {
        &self.records
    }

    pub fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dim = self.dim?;
        self.vectors.get(position * dim..(position + 1) * dim)
    }

    /// Appends `vectors[i]` with `metadatas[i]` in order.
    ///
    /// Every row is validated before anything is written, so a failed call
    /// leaves the index unchanged. Duplicates are stored as distinct records.
    pub fn append(&mut self, vectors: &[Vec<f32>], metadatas: &[Chunk]) -> Result<()> {
        if vectors.len() != metadatas.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), metadatas: metadatas.len() });
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dim = self.dim.unwrap_or(first.len());
        if dim == 0 {
            return Err(Error::Operation("cannot index zero-length vectors".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, got: bad.len() });
        }

        self.dim = Some(dim);
        self.vectors.reserve(vectors.len() * dim);
        for v in vectors {
            self.vectors.extend_from_slice(v);
        }
        self.records.extend_from_slice(metadatas);
        debug!(added = vectors.len(), total = self.records.len(), dim, "appended vectors");
        Ok(())
    }

    /// Up to `top_k` records by ascending squared-Euclidean distance.
    ///
    /// An empty index yields no results. Equal distances come back in
    /// insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<EvidenceItem>> {
        let Some(dim) = self.dim else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, got: query.len() });
        }
        let hits = nearest(&self.vectors, dim, query, top_k)
            .into_iter()
            .filter_map(|(pos, distance)| self.records.get(pos).map(|chunk| EvidenceItem { chunk: chunk.clone(), distance }))
            .collect();
        Ok(hits)
    }
}

impl VectorSearch for FlatIndex {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<EvidenceItem>> {
        FlatIndex::search(self, query, top_k)
    }

    fn len(&self) -> usize {
        FlatIndex::len(self)
    }
}
