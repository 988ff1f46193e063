//! Multi-query evidence retrieval.
//!
//! Every query is encoded and searched separately; the hits are merged by
//! `chunk_id` (first hit wins), capped to the closest `max_evidence` and
//! finally put back into narrative order.

use std::collections::HashSet;

use anyhow::{ensure, Result};
use tracing::debug;

use backstory_core::config::RetrievalSettings;
use backstory_core::traits::{Embedder, VectorSearch};
use backstory_core::types::{ChunkId, EvidenceItem};

/// Query text sent to the encoder for one fact.
pub fn compose_query(character: &str, caption: &str, fact: &str) -> String {
    format!("{character} ({caption}): {fact}")
}

/// Merges per-query hit lists into at most `max_evidence` items ordered by `chunk_id`.
///
/// A chunk seen by several queries keeps the item from the first query that
/// returned it. Relevance decides which items survive the cap; equal
/// distances keep first-seen order.
pub fn aggregate<I>(per_query: I, max_evidence: usize) -> Vec<EvidenceItem>
where
    I: IntoIterator<Item = Vec<EvidenceItem>>,
{
    let mut seen: HashSet<ChunkId> = HashSet::new();
    let mut merged: Vec<EvidenceItem> = per_query
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.chunk_id()))
        .collect();

    merged.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    merged.truncate(max_evidence);
    merged.sort_by_key(EvidenceItem::chunk_id);
    merged
}

/// Owns the query encoder; the store to search is chosen per request.
pub struct EvidenceRetriever {
    embedder: Box<dyn Embedder>,
    top_k: usize,
    max_evidence: usize,
}

impl EvidenceRetriever {
    pub fn new(embedder: Box<dyn Embedder>, settings: RetrievalSettings) -> Self {
        Self { embedder, top_k: settings.top_k_per_query, max_evidence: settings.max_evidence }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Evidence for `queries` from `store`; no queries or no hits gives an empty set.
    pub fn retrieve(&self, store: &dyn VectorSearch, queries: &[String]) -> Result<Vec<EvidenceItem>> {
        if queries.is_empty() || store.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed_batch(queries)?;
        ensure!(vectors.len() == queries.len(), "encoder returned {} vectors for {} queries", vectors.len(), queries.len());

        let mut per_query = Vec::with_capacity(vectors.len());
        for vector in &vectors {
            per_query.push(store.search(vector, self.top_k)?);
        }
        let evidence = aggregate(per_query, self.max_evidence);
        debug!(queries = queries.len(), evidence = evidence.len(), "aggregated evidence");
        Ok(evidence)
    }
}
