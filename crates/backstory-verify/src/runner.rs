//! Per-request verification and batch processing.

use std::time::Instant;

use tracing::{info, warn};

use backstory_core::config::RetrievalStrategy;
use backstory_core::traits::VectorSearch;
use backstory_core::types::{PredictionRecord, Verdict, VerificationRequest};
use backstory_judge::LlmJudge;

use crate::batch_io::InputRow;
use crate::catalog::StoreCatalog;
use crate::evidence::{compose_query, EvidenceRetriever};

pub const NO_EVIDENCE: &str = "No evidence found (Benefit of Doubt)";

pub struct Verifier {
    catalog: StoreCatalog,
    retriever: EvidenceRetriever,
    judge: LlmJudge,
    strategy: RetrievalStrategy,
}

/// Records produced by a batch plus the rows that had nowhere to go.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<PredictionRecord>,
    pub skipped: Vec<String>,
}

impl Verifier {
    /// Rejects stores whose vector size differs from the query encoder's.
    pub fn new(
        catalog: StoreCatalog,
        retriever: EvidenceRetriever,
        judge: LlmJudge,
        strategy: RetrievalStrategy,
    ) -> backstory_core::Result<Self> {
        catalog.ensure_dim(retriever.embedder().dim())?;
        Ok(Self { catalog, retriever, judge, strategy })
    }

    /// `None` when the request's source has no loaded store.
    pub async fn verify(&self, request: &VerificationRequest) -> Option<Verdict> {
        let store = self.catalog.store(&request.source)?;
        Some(self.verify_against(store, request).await)
    }

    /// Never fails: missing evidence and retrieval errors give a consistent verdict.
    pub async fn verify_against(&self, store: &dyn VectorSearch, request: &VerificationRequest) -> Verdict {
        let facts = match self.strategy {
            RetrievalStrategy::Story => vec![request.claim.clone()],
            RetrievalStrategy::Facts => self.judge.extract_facts(&request.character, &request.caption, &request.claim).await,
        };
        let queries: Vec<String> = facts.iter().map(|f| compose_query(&request.character, &request.caption, f)).collect();

        let evidence = match self.retriever.retrieve(store, &queries) {
            Ok(evidence) => evidence,
            Err(e) => {
                warn!(id = %request.id, error = %e, "retrieval failed");
                return Verdict::consistent(format!("Retrieval Error (Benefit of Doubt): {e}"));
            }
        };
        if evidence.is_empty() {
            return Verdict::consistent(NO_EVIDENCE);
        }
        self.judge.judge(&request.character, &request.caption, &request.claim, &evidence).await
    }

    /// Processes rows in order, one output record per routable row.
    pub async fn run_batch(&self, rows: Vec<InputRow>) -> BatchOutcome {
        let started = Instant::now();
        let total = rows.len();
        let mut outcome = BatchOutcome::default();
        for (i, row) in rows.into_iter().enumerate() {
            let Some(source) = self.catalog.resolve(&row.book_name) else {
                warn!(id = %row.id, book = %row.book_name, "unknown source, skipping row");
                outcome.skipped.push(row.id);
                continue;
            };
            let request = row.into_request(source);
            match self.verify(&request).await {
                Some(verdict) => {
                    info!(row = i + 1, total, id = %request.id, prediction = verdict.prediction, "verified");
                    outcome.records.push(PredictionRecord::new(request.id, verdict));
                }
                None => {
                    warn!(id = %request.id, source = %request.source, "no store loaded for source, skipping row");
                    outcome.skipped.push(request.id);
                }
            }
        }
        info!(
            rows = total,
            records = outcome.records.len(),
            skipped = outcome.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        outcome
    }
}
