use std::fs;
use tempfile::TempDir;

use backstory_core::chunker::RecursiveChunker;
use backstory_core::config::{ChunkingSettings, SourceSettings};
use backstory_core::error::Error;
use backstory_core::traits::VectorSearch;
use backstory_core::types::{Chunk, Document, SourceId};
use backstory_embed::{EmbeddingPipeline, FakeEmbedder};
use backstory_vector::artifacts::{decode_vectors, encode_vectors, METADATA_FILE, VECTORS_FILE};
use backstory_vector::{build_source_store, squared_l2, FlatIndex, VectorStore};

fn chunk(id: usize) -> Chunk {
    Chunk { text: format!("chunk {id}"), chunk_id: id, source: "book.txt".to_string() }
}

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot % dim] = 1.0;
    v
}

fn filled_index(n: usize, dim: usize) -> FlatIndex {
    let vectors: Vec<Vec<f32>> = (0..n).map(|i| unit(dim, i)).collect();
    let records: Vec<Chunk> = (0..n).map(chunk).collect();
    let mut index = FlatIndex::new();
    index.append(&vectors, &records).expect("append");
    index
}

#[test]
fn squared_l2_is_not_rooted() {
    assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
}

#[test]
fn search_returns_everything_sorted_when_k_exceeds_size() {
    let index = filled_index(5, 8);
    let hits = index.search(&unit(8, 2), 50).expect("search");

    assert_eq!(hits.len(), 5);
    assert_eq!(hits[0].chunk_id(), 2);
    assert_eq!(hits[0].distance, 0.0);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    assert!(hits.iter().all(|h| h.distance >= 0.0));
}

#[test]
fn equal_distances_keep_insertion_order() {
    let index = filled_index(6, 8);
    let hits = index.search(&unit(8, 0), 3).expect("search");
    let ids: Vec<usize> = hits.iter().map(|h| h.chunk_id()).collect();
    // chunk 0 is exact; the rest are all at distance 2.0
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn empty_index_and_zero_k_return_nothing() {
    let index = FlatIndex::new();
    assert!(index.search(&[1.0, 2.0], 3).expect("search").is_empty());

    let index = filled_index(3, 4);
    assert!(index.search(&unit(4, 0), 0).expect("search").is_empty());
}

#[test]
fn dimension_mismatch_leaves_index_unchanged() {
    let mut index = filled_index(10, 384);

    let err = index.append(&[vec![0.5; 128]], &[chunk(99)]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 384, got: 128 }));
    assert_eq!(index.len(), 10);
    assert_eq!(index.dim(), Some(384));

    let err = index.search(&[0.0; 128], 3).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
    assert_eq!(index.search(&unit(384, 4), 1).expect("search")[0].chunk_id(), 4);
}

#[test]
fn mixed_batch_is_rejected_as_a_whole() {
    let mut index = FlatIndex::new();
    let err = index.append(&[vec![1.0, 0.0], vec![1.0]], &[chunk(0), chunk(1)]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 1 }));
    assert!(index.is_empty());
    assert_eq!(index.dim(), None, "a rejected batch does not fix the dimension");
}

#[test]
fn length_mismatch_and_empty_append() {
    let mut index = FlatIndex::new();
    let err = index.append(&[vec![1.0]], &[]).unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { vectors: 1, metadatas: 0 }));

    index.append(&[], &[]).expect("no-op");
    assert!(index.is_empty());
    assert_eq!(index.dim(), None);
}

#[test]
fn duplicates_are_stored_separately() {
    let mut index = FlatIndex::new();
    index.append(&[vec![1.0, 0.0], vec![1.0, 0.0]], &[chunk(0), chunk(0)]).expect("append");
    assert_eq!(index.len(), 2);
    assert_eq!(index.search(&[1.0, 0.0], 5).expect("search").len(), 2);
}

#[test]
fn persist_then_restore_round_trips() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("store");

    let mut store = VectorStore::new(&dir);
    let vectors: Vec<Vec<f32>> = (0..4).map(|i| unit(6, i)).collect();
    let records: Vec<Chunk> = (0..4).map(chunk).collect();
    store.append(&vectors, &records).expect("append");
    store.persist().expect("persist");
    assert!(dir.join(VECTORS_FILE).is_file());
    assert!(dir.join(METADATA_FILE).is_file());

    let restored = VectorStore::open(&dir).expect("open");
    assert_eq!(restored.len(), 4);
    assert_eq!(restored.index().records(), records.as_slice());
    assert_eq!(restored.index().vector(3), Some(unit(6, 3).as_slice()));
    let before = store.search(&unit(6, 1), 2).expect("search");
    let after = restored.search(&unit(6, 1), 2).expect("search");
    assert_eq!(before, after);
}

#[test]
fn persist_overwrites_previous_artifacts() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::new(tmp.path());
    store.append(&[unit(3, 0)], &[chunk(0)]).expect("append");
    store.persist().expect("persist");
    store.append(&[unit(3, 1)], &[chunk(1)]).expect("append");
    store.persist().expect("persist again");

    assert_eq!(VectorStore::open(tmp.path()).expect("open").len(), 2);
}

#[test]
fn persisting_an_empty_index_fails() {
    let tmp = TempDir::new().unwrap();
    let store = VectorStore::new(tmp.path().join("never"));
    assert!(matches!(store.persist(), Err(Error::EmptyIndex)));
    assert!(!tmp.path().join("never").exists());
}

#[test]
fn restore_reports_missing_artifacts() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::new(tmp.path());
    assert!(!store.restore().expect("restore"));
    assert!(VectorStore::open(tmp.path()).unwrap_err().is_not_found());

    // only one of the pair present still counts as not built
    fs::write(tmp.path().join(METADATA_FILE), "[]").unwrap();
    assert!(!store.restore().expect("restore"));
    assert!(store.is_empty());
}

#[test]
fn restore_rejects_inconsistent_pair() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::new(tmp.path());
    store.append(&[unit(3, 0), unit(3, 1)], &[chunk(0), chunk(1)]).expect("append");
    store.persist().expect("persist");

    fs::write(tmp.path().join(METADATA_FILE), serde_json::to_vec(&vec![chunk(0)]).unwrap()).unwrap();
    let err = VectorStore::open(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }));
}

#[test]
fn truncated_vector_file_is_corrupt() {
    let path = std::path::Path::new("index.vec");
    let mut bytes = encode_vectors(2, &[1.0, 2.0, 3.0, 4.0]);
    let decoded = decode_vectors(&bytes, path).expect("decode");
    assert_eq!((decoded.dim, decoded.count), (2, 2));

    bytes.pop();
    assert!(matches!(decode_vectors(&bytes, path), Err(Error::Corrupt { .. })));
    assert!(matches!(decode_vectors(b"nope", path), Err(Error::Corrupt { .. })));
}

#[test]
fn vector_file_layout_is_stable() {
    let data = [1.0f32, -2.0, 0.5, 3.0];
    let bytes = encode_vectors(2, &data);

    let mut expected = b"BSVX".to_vec();
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.extend_from_slice(&2u64.to_le_bytes());
    for value in data {
        expected.extend_from_slice(&value.to_le_bytes());
    }
    assert_eq!(bytes, expected);

    let decoded = decode_vectors(&bytes, std::path::Path::new("index.vec")).expect("decode");
    assert_eq!((decoded.dim, decoded.count), (2, 2));
    assert_eq!(decoded.data, data.to_vec());
}

#[test]
fn store_implements_vector_search() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::new(tmp.path());
    store.append(&[unit(4, 0), unit(4, 1)], &[chunk(0), chunk(1)]).expect("append");
    let searcher: &dyn VectorSearch = &store;
    assert_eq!(searcher.len(), 2);
    assert_eq!(searcher.search(&unit(4, 1), 1).expect("search")[0].chunk_id(), 1);
}

fn fake_pipeline() -> EmbeddingPipeline {
    let chunker = RecursiveChunker::new(ChunkingSettings { chunk_size: 60, chunk_overlap: 10 }).expect("chunker");
    EmbeddingPipeline::new(Box::new(FakeEmbedder::new(32)), chunker, 4)
}

fn source(file: &str) -> SourceSettings {
    SourceSettings {
        id: SourceId::new("mc"),
        title: "The Count of Monte Cristo".to_string(),
        file: file.to_string(),
        store_dir: "mc".to_string(),
        aliases: Vec::new(),
    }
}

#[test]
fn build_selects_exact_file_and_replaces_old_store() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("mc");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("stale.bin"), "old").unwrap();

    let text = "Edmond Dantes was a young sailor. He was arrested on his wedding day. ".repeat(5);
    let docs = vec![
        Document::new(text, "mc.txt"),
        Document::new("A different book entirely.", "mc.txt.bak"),
    ];
    let report = build_source_store(&fake_pipeline(), &docs, &source("mc.txt"), &dir).expect("build");

    assert_eq!(report.source, "mc.txt");
    assert_eq!(report.dim, 32);
    assert!(report.chunks > 1);
    assert!(!dir.join("stale.bin").exists());

    let store = VectorStore::open(&dir).expect("open");
    assert_eq!(store.len(), report.chunks);
    assert!(store.index().records().iter().all(|c| c.source == "mc.txt"));
    let ids: Vec<usize> = store.index().records().iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, (0..report.chunks).collect::<Vec<_>>());
}

#[test]
fn build_fails_when_source_file_is_missing() {
    let tmp = TempDir::new().unwrap();
    let docs = vec![Document::new("text", "other.txt")];
    let err = build_source_store(&fake_pipeline(), &docs, &source("mc.txt"), tmp.path()).unwrap_err();
    assert!(err.to_string().contains("mc.txt"));
}
