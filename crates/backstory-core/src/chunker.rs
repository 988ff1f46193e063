//! Recursive character splitter and per-source chunk numbering.
//!
//! Text is cut on the largest separator present (`"\n\n"`, `"\n"`, `"."`,
//! `" "`, then single characters). Pieces below the size budget are merged
//! greedily into windows, carrying up to `chunk_overlap` characters of the
//! previous window forward. Pieces still over budget are split again with the
//! next separators. Lengths are counted in characters.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::config::ChunkingSettings;
use crate::error::Result;
use crate::types::{Chunk, ChunkId, Document};

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Splits every document and numbers the windows per source in reading order.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        if documents.is_empty() {
            warn!("no documents provided to chunk");
            return Vec::new();
        }
        let mut ids = ChunkIdAssigner::default();
        let mut chunks = Vec::new();
        for doc in documents {
            for text in self.split_text(&doc.text) {
                let chunk_id = ids.next_id(&doc.source);
                chunks.push(Chunk { text, chunk_id, source: doc.source.clone() });
            }
        }
        info!(documents = documents.len(), chunks = chunks.len(), "split documents");
        for (source, count) in ids.counts() {
            debug!(source = %source, chunks = count, "chunks per source");
        }
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = "";
                break;
            }
            if text.contains(s.as_str()) {
                separator = s;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }
        final_chunks
    }

    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;
        for piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(len = total, limit = self.chunk_size, "created a window longer than the chunk size");
                }
                if !current.is_empty() {
                    if let Some(window) = join_trimmed(&current) {
                        windows.push(window);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match current.pop_front() {
                            Some((_, front_len)) => total -= front_len,
                            None => break,
                        }
                    }
                }
            }
            current.push_back((piece.as_str(), len));
            total += len;
        }
        if let Some(window) = join_trimmed(&current) {
            windows.push(window);
        }
        windows
    }
}

/// Hands out `0, 1, 2, ...` independently for every source name.
#[derive(Debug, Default)]
pub struct ChunkIdAssigner {
    counters: HashMap<String, ChunkId>,
}

impl ChunkIdAssigner {
    pub fn next_id(&mut self, source: &str) -> ChunkId {
        let counter = self.counters.entry(source.to_string()).or_insert(0);
        let id = *counter;
        *counter += 1;
        id
    }

    /// Chunks issued so far, per source.
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }
}

/// Splits on `separator`, re-attaching it to the start of each following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        out.push(first.to_string());
    }
    out.extend(parts.map(|p| format!("{separator}{p}")));
    out.retain(|s| !s.is_empty());
    out
}

fn join_trimmed(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
