//! Domain types shared by the chunker, the vector store and the verifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a chunk inside its source, counted from 0 in reading order.
pub type ChunkId = usize;

/// Stable identifier of a reference source (one per vector store).
///
/// Resolved once from user input (see the source catalog in `backstory-verify`)
/// and carried as a typed value afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full source text plus the name it was loaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into() }
    }
}

/// A contiguous window of a [`Document`].
///
/// - `text`: the window content
/// - `source`: copied from the parent document
/// - `chunk_id`: per-source counter; ordering by it follows the narrative
///
/// Identity across sources requires the pair `(source, chunk_id)`.
/// This is also the metadata record persisted next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub chunk_id: ChunkId,
    pub source: String,
}

/// A chunk returned by a nearest-neighbour search.
///
/// `distance` is squared Euclidean; smaller is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub distance: f32,
}

impl EvidenceItem {
    pub fn chunk_id(&self) -> ChunkId {
        self.chunk.chunk_id
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

/// One claim to verify against one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub id: String,
    pub source: SourceId,
    pub character: String,
    pub caption: String,
    pub claim: String,
}

/// Binary judgement on a claim plus the reason for it.
///
/// `prediction` is 1 when the claim is consistent with the source (or nothing
/// contradicts it) and 0 when the source contradicts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub prediction: u8,
    pub rationale: String,
}

impl Verdict {
    pub const CONSISTENT: u8 = 1;
    pub const CONTRADICTION: u8 = 0;

    pub fn consistent(rationale: impl Into<String>) -> Self {
        Self { prediction: Self::CONSISTENT, rationale: rationale.into() }
    }

    pub fn contradiction(rationale: impl Into<String>) -> Self {
        Self { prediction: Self::CONTRADICTION, rationale: rationale.into() }
    }
}

/// Output row of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "Story ID")]
    pub id: String,
    #[serde(rename = "Prediction")]
    pub prediction: u8,
    #[serde(rename = "Rationale")]
    pub rationale: String,
}

impl PredictionRecord {
    pub fn new(id: impl Into<String>, verdict: Verdict) -> Self {
        Self { id: id.into(), prediction: verdict.prediction, rationale: verdict.rationale }
    }
}
