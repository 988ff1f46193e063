use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use backstory_core::config::{RetrievalSettings, RetrievalStrategy, Settings, SourceSettings};
use backstory_core::traits::Embedder;
use backstory_core::types::{Chunk, EvidenceItem, SourceId, VerificationRequest};
use backstory_embed::FakeEmbedder;
use backstory_judge::error::JudgeError;
use backstory_judge::{ChatBackend, ChatRequest, FallbackPolicy, LlmJudge};
use backstory_vector::VectorStore;
use backstory_verify::batch_io::{read_rows_from, write_predictions_to, InputRow};
use backstory_verify::eval::evaluate_readers;
use backstory_verify::{aggregate, compose_query, EvidenceRetriever, StoreCatalog, Verifier, NO_EVIDENCE};

fn hit(id: usize, distance: f32) -> EvidenceItem {
    EvidenceItem { chunk: Chunk { text: format!("text {id}"), chunk_id: id, source: "mc.txt".into() }, distance }
}

fn ids(items: &[EvidenceItem]) -> Vec<usize> {
    items.iter().map(EvidenceItem::chunk_id).collect()
}

#[test]
fn aggregation_dedupes_caps_and_restores_narrative_order() {
    let first = vec![hit(2, 0.1), hit(0, 0.3)];
    let second = vec![hit(1, 0.2), hit(0, 0.3)];
    let evidence = aggregate(vec![first, second], 10);
    assert_eq!(ids(&evidence), vec![0, 1, 2]);
    assert_eq!(evidence[0].distance, 0.3);
}

#[test]
fn aggregation_keeps_first_seen_item() {
    let evidence = aggregate(vec![vec![hit(4, 0.9)], vec![hit(4, 0.1)]], 10);
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].distance, 0.9);
}

#[test]
fn aggregation_caps_by_relevance() {
    let many: Vec<EvidenceItem> = (0..15).map(|i| hit(i, 15.0 - i as f32)).collect();
    let evidence = aggregate(vec![many], 10);
    // the ten closest are chunks 5..15
    assert_eq!(ids(&evidence), (5..15).collect::<Vec<_>>());

    let evidence = aggregate(vec![vec![hit(1, 0.1), hit(2, 0.2)]], 10);
    assert!(evidence.len() <= 2);
    assert!(aggregate(Vec::<Vec<EvidenceItem>>::new(), 10).is_empty());
}

#[test]
fn aggregation_is_idempotent_under_duplicate_queries() {
    let q = vec![hit(7, 0.4), hit(3, 0.2), hit(9, 0.5)];
    let once = aggregate(vec![q.clone()], 10);
    let twice = aggregate(vec![q.clone(), q], 10);
    assert_eq!(once, twice);
    assert!(once.windows(2).all(|w| w[0].chunk_id() < w[1].chunk_id()));
}

#[test]
fn query_format() {
    assert_eq!(compose_query("Dantes", "Chapter 1", "was a sailor"), "Dantes (Chapter 1): was a sailor");
    assert_eq!(compose_query("", "", "x"), " (): x");
}

const PASSAGES: [&str; 4] = [
    "Edmond Dantes is a young sailor returning to Marseille",
    "Dantes is arrested and imprisoned in the Chateau d'If",
    "The Abbe Faria teaches Dantes in prison",
    "Dantes escapes and finds the treasure of Monte Cristo",
];

fn built_store(dim: usize) -> VectorStore {
    let embedder = FakeEmbedder::new(dim);
    let texts: Vec<String> = PASSAGES.iter().map(|s| s.to_string()).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");
    let chunks: Vec<Chunk> = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk { text, chunk_id: i, source: "mc.txt".into() })
        .collect();
    let mut store = VectorStore::new("unused");
    store.append(&vectors, &chunks).expect("append");
    store
}

fn retriever(dim: usize) -> EvidenceRetriever {
    EvidenceRetriever::new(Box::new(FakeEmbedder::new(dim)), RetrievalSettings::default())
}

#[test]
fn retriever_returns_ordered_bounded_evidence() {
    let store = built_store(64);
    let queries = vec![
        compose_query("Dantes", "", "was imprisoned"),
        compose_query("Dantes", "", "found a treasure"),
    ];
    let evidence = retriever(64).retrieve(&store, &queries).expect("retrieve");

    assert!(!evidence.is_empty());
    assert!(evidence.len() <= 4);
    assert!(evidence.windows(2).all(|w| w[0].chunk_id() < w[1].chunk_id()));

    let once = retriever(64).retrieve(&store, &queries[..1]).expect("retrieve");
    let duplicated = retriever(64).retrieve(&store, &[queries[0].clone(), queries[0].clone()]).expect("retrieve");
    assert_eq!(once, duplicated);
}

#[test]
fn retriever_handles_empty_inputs() {
    let store = built_store(16);
    assert!(retriever(16).retrieve(&store, &[]).expect("retrieve").is_empty());
    assert!(retriever(16).retrieve(&VectorStore::new("x"), &["q".to_string()]).expect("retrieve").is_empty());
}

#[test]
fn retriever_reports_dimension_mismatch() {
    let store = built_store(16);
    assert!(retriever(8).retrieve(&store, &["q".to_string()]).is_err());
}

struct Canned(Mutex<VecDeque<Result<String, JudgeError>>>);

impl ChatBackend for Canned {
    fn name(&self) -> &str {
        "canned"
    }

    fn complete<'a>(&'a self, _request: &'a ChatRequest) -> BoxFuture<'a, Result<String, JudgeError>> {
        let next = self.0.lock().unwrap().pop_front().unwrap_or(Err(JudgeError::EmptyChoices));
        Box::pin(async move { next })
    }
}

fn judge(replies: Vec<Result<String, JudgeError>>) -> LlmJudge {
    let backend: Box<dyn ChatBackend> = Box::new(Canned(Mutex::new(replies.into())));
    LlmJudge::new(FallbackPolicy::new(vec![backend], 1, Duration::ZERO, Duration::ZERO), 100, 0.0)
}

fn source(id: &str, title: &str, aliases: &[&str]) -> SourceSettings {
    SourceSettings {
        id: SourceId::new(id),
        title: title.to_string(),
        file: format!("{id}.txt"),
        store_dir: id.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

fn catalog() -> StoreCatalog {
    let mut catalog = StoreCatalog::new(vec![
        source("monte_cristo", "The Count of Monte Cristo", &["Monte Cristo"]),
        source("castaways", "In Search of the Castaways", &[]),
        source("empty", "An Empty Book", &[]),
    ]);
    catalog.insert(SourceId::new("monte_cristo"), built_store(32));
    catalog.insert(SourceId::new("empty"), VectorStore::new("empty"));
    catalog
}

fn verifier(replies: Vec<Result<String, JudgeError>>) -> Verifier {
    Verifier::new(catalog(), retriever(32), judge(replies), RetrievalStrategy::Story).expect("verifier")
}

fn request(source: &str, claim: &str) -> VerificationRequest {
    VerificationRequest {
        id: "1".into(),
        source: SourceId::new(source),
        character: "Dantes".into(),
        caption: String::new(),
        claim: claim.into(),
    }
}

#[test]
fn catalog_resolves_exact_names_only() {
    let catalog = catalog();
    assert_eq!(catalog.resolve("The Count of Monte Cristo"), Some(SourceId::new("monte_cristo")));
    assert_eq!(catalog.resolve("  the count  of monte cristo "), Some(SourceId::new("monte_cristo")));
    assert_eq!(catalog.resolve("monte cristo"), Some(SourceId::new("monte_cristo")));
    assert_eq!(catalog.resolve("CASTAWAYS"), Some(SourceId::new("castaways")));
    assert_eq!(catalog.resolve("Monte"), None, "no substring routing");
    assert_eq!(catalog.resolve(""), None);
    assert_eq!(catalog.loaded(), 2);
}

#[test]
fn catalog_load_skips_unbuilt_stores() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.data.store_root = tmp.path().display().to_string();

    let dir = settings.store_dir(&settings.sources[0]);
    let mut persisted = VectorStore::new(&dir);
    let chunk = Chunk { text: "Marseille harbour".into(), chunk_id: 0, source: "mc.txt".into() };
    persisted.append(&[vec![1.0; 8]], &[chunk]).expect("append");
    persisted.persist().expect("persist");

    let catalog = StoreCatalog::load(&settings).expect("load");
    assert_eq!(catalog.loaded(), 1);
    assert!(catalog.store(&settings.sources[0].id).is_some());
    assert!(catalog.store(&settings.sources[1].id).is_none());
}

#[tokio::test]
async fn verify_passes_judge_verdict_through() {
    let v = verifier(vec![Ok(r#"{"prediction": 0, "rationale": "He never left prison."}"#.into())]);
    let verdict = v.verify(&request("monte_cristo", "Dantes was a free man in Paris")).await.expect("routed");
    assert_eq!(verdict.prediction, 0);
    assert_eq!(verdict.rationale, "He never left prison.");
}

#[tokio::test]
async fn empty_evidence_gives_benefit_of_doubt() {
    let v = verifier(vec![Ok(r#"{"prediction": 0, "rationale": "unused"}"#.into())]);
    let verdict = v.verify(&request("empty", "anything")).await.expect("routed");
    assert_eq!(verdict.prediction, 1);
    assert!(verdict.rationale.contains("No evidence"));
    assert_eq!(verdict.rationale, NO_EVIDENCE);
}

#[tokio::test]
async fn judge_failure_defaults_to_consistent() {
    let v = verifier(vec![Err(JudgeError::HttpStatus { status: 429, url: String::new(), snippet: String::new() })]);
    let verdict = v.verify(&request("monte_cristo", "Dantes was a sailor")).await.expect("routed");
    assert_eq!(verdict.prediction, 1);
    assert_eq!(verdict.rationale, "API Error");
}

#[tokio::test]
async fn verify_without_store_is_none() {
    let v = verifier(Vec::new());
    assert!(v.verify(&request("castaways", "x")).await.is_none());
}

#[tokio::test]
async fn facts_strategy_uses_extracted_facts() {
    let replies = vec![
        Ok(r#"{"facts": ["Dantes was imprisoned", "Dantes escaped"]}"#.into()),
        Ok(r#"{"prediction": 1, "rationale": "fits"}"#.into()),
    ];
    let v = Verifier::new(catalog(), retriever(32), judge(replies), RetrievalStrategy::Facts).expect("verifier");
    let verdict = v.verify(&request("monte_cristo", "Dantes was imprisoned and escaped")).await.expect("routed");
    assert_eq!(verdict.rationale, "fits");
}

#[tokio::test]
async fn batch_skips_unroutable_rows() {
    let csv = "\
id,book_name,char,caption,content
1,The Count of Monte Cristo,Dantes,,Dantes was a sailor
2,Unknown Book,Someone,,claim
3,In Search of the Castaways,Glenarvan,,claim
4,monte cristo,Faria,Prison,Faria taught Dantes
";
    let rows = read_rows_from(csv.as_bytes()).expect("rows");
    assert_eq!(rows.len(), 4);

    let replies = vec![
        Ok(r#"{"prediction": 1, "rationale": "ok"}"#.into()),
        Ok(r#"{"prediction": "0", "rationale": "no"}"#.into()),
    ];
    let outcome = verifier(replies).run_batch(rows).await;

    let got: Vec<(&str, u8)> = outcome.records.iter().map(|r| (r.id.as_str(), r.prediction)).collect();
    assert_eq!(got, vec![("1", 1), ("4", 0)]);
    assert_eq!(outcome.skipped, vec!["2".to_string(), "3".to_string()]);

    let mut out = Vec::new();
    write_predictions_to(&mut out, &outcome.records).expect("write");
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Story ID,Prediction,Rationale\n"));
    assert!(text.contains("4,0,no"));
}

#[test]
fn rows_fall_back_to_backstory_column() {
    let csv = "id,book_name,char,backstory\n9,Castaways,Ayrton,He was a quartermaster\n";
    let rows = read_rows_from(csv.as_bytes()).expect("rows");
    let row: InputRow = rows.into_iter().next().expect("row");
    assert_eq!(row.claim(), "He was a quartermaster");
    assert_eq!(row.caption, "");
    let request = row.into_request(SourceId::new("castaways"));
    assert_eq!(request.character, "Ayrton");
    assert_eq!(request.id, "9");
}

#[test]
fn empty_output_still_has_headers() {
    let mut out = Vec::new();
    write_predictions_to(&mut out, &[]).expect("write");
    assert_eq!(String::from_utf8(out).unwrap(), "Story ID,Prediction,Rationale\n");
}

#[test]
fn eval_counts_confusion_matrix() {
    let results = "\
Story ID,Prediction,Rationale
1,1,fine
2,0,conflict
3,1,missed it
4,0,wrong call
5,x,garbled
99,1,no label
";
    let labels = "\
id,label
1,consistent
2,contradict
3,contradict
4,consistent
5,consistent
";
    let report = evaluate_readers(results.as_bytes(), labels.as_bytes()).expect("eval");
    assert_eq!(report.matched, 4);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.correct, 2);
    assert_eq!((report.true_positives, report.true_negatives, report.false_positives, report.false_negatives), (1, 1, 1, 1));
    assert_eq!(report.accuracy(), 0.5);
    assert_eq!(report.mismatches.len(), 2);
    assert_eq!(report.mismatches[0].id, "3");
    assert_eq!(report.mismatches[0].rationale, "missed it");
    assert!(report.to_string().contains("Accuracy: 0.5000 (50.00%)"));
}

#[test]
fn eval_requires_id_columns() {
    let err = evaluate_readers("name,Prediction\na,1\n".as_bytes(), "id,label\n1,consistent\n".as_bytes()).unwrap_err();
    assert!(err.to_string().contains("No ID column"));
}

#[test]
fn store_built_with_another_encoder_is_rejected_at_startup() {
    let catalog = catalog();
    assert!(catalog.ensure_dim(32).is_ok());
    let err = catalog.ensure_dim(8).expect_err("32-d store vs 8-d encoder");
    assert!(err.to_string().contains("monte_cristo"), "{err}");

    let result = Verifier::new(catalog, retriever(8), judge(vec![]), RetrievalStrategy::Story);
    assert!(result.is_err());
}
