use crate::types::EvidenceItem;

/// Text encoder producing fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Encodes `texts` in order; output has one vector per input.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Read-only nearest-neighbour lookup over stored chunks.
pub trait VectorSearch: Send + Sync {
    /// Up to `top_k` records by ascending distance.
    fn search(&self, query: &[f32], top_k: usize) -> crate::Result<Vec<EvidenceItem>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
