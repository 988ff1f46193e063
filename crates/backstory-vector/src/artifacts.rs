//! On-disk layout of a store: a binary vector file and a JSON metadata file.
//!
//! Vector file layout (little-endian):
//!
//! | bytes | field                 |
//! |-------|-----------------------|
//! | 4     | magic `"BSVX"`        |
//! | 4     | format version (`1`)  |
//! | 4     | dimension             |
//! | 8     | vector count          |
//! | 4·d·n | `f32` rows            |

use std::fs;
use std::path::Path;

use backstory_core::error::{Error, Result};
use backstory_core::types::Chunk;

pub const VECTORS_FILE: &str = "index.vec";
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC: u32 = 0x5856_5342; // "BSVX"
const VERSION: u32 = 1;
const HEADER_LEN: usize = 20;

/// Decoded vector artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorArtifact {
    pub dim: usize,
    pub count: usize,
    pub data: Vec<f32>,
}

pub fn encode_vectors(dim: usize, data: &[f32]) -> Vec<u8> {
    let count = if dim == 0 { 0 } else { data.len() / dim };
    let mut buffer = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    buffer.extend_from_slice(&MAGIC.to_le_bytes());
    buffer.extend_from_slice(&VERSION.to_le_bytes());
    buffer.extend_from_slice(&(dim as u32).to_le_bytes());
    buffer.extend_from_slice(&(count as u64).to_le_bytes());
    for value in data {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
    buffer
}

pub fn decode_vectors(bytes: &[u8], path: &Path) -> Result<VectorArtifact> {
    let corrupt = |reason: &str| Error::Corrupt { path: path.display().to_string(), reason: reason.to_string() };
    if bytes.len() < HEADER_LEN {
        return Err(corrupt("file too short"));
    }
    let mut header = bytes[..HEADER_LEN].chunks_exact(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
    let mut next = || header.next().ok_or_else(|| corrupt("truncated header"));

    if next()? != MAGIC {
        return Err(corrupt("invalid magic"));
    }
    let version = next()?;
    if version != VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }
    let dim = next()? as usize;
    let count = u64::from(next()?) | (u64::from(next()?) << 32);
    let count = usize::try_from(count).map_err(|_| corrupt("vector count overflows"))?;

    let body = &bytes[HEADER_LEN..];
    let expected = dim.checked_mul(count).and_then(|n| n.checked_mul(4)).ok_or_else(|| corrupt("size overflows"))?;
    if body.len() != expected {
        return Err(corrupt(&format!("expected {expected} bytes of vectors for {count}x{dim}, found {}", body.len())));
    }
    if count > 0 && dim == 0 {
        return Err(corrupt("zero dimension"));
    }
    let data = body.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
    Ok(VectorArtifact { dim, count, data })
}

pub fn write_vectors(path: &Path, dim: usize, data: &[f32]) -> Result<()> {
    fs::write(path, encode_vectors(dim, data))?;
    Ok(())
}

pub fn read_vectors(path: &Path) -> Result<VectorArtifact> {
    let bytes = fs::read(path)?;
    decode_vectors(&bytes, path)
}

pub fn write_metadata(path: &Path, records: &[Chunk]) -> Result<()> {
    fs::write(path, serde_json::to_vec(records)?)?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<Vec<Chunk>> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Corrupt { path: path.display().to_string(), reason: e.to_string() })
}
