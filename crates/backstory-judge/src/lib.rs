//! Language-model judge deciding whether a claim contradicts retrieved evidence.
//!
//! The judge never fails: an unreachable backend yields a consistent verdict
//! with the `API Error` rationale, an unreadable answer one with
//! `JSON Parse Error`.

use std::time::Instant;

use tracing::{debug, info};

use backstory_core::config::JudgeSettings;
use backstory_core::types::{EvidenceItem, Verdict};

pub mod backend;
pub mod error;
pub mod parse;
pub mod policy;
pub mod prompt;

pub use backend::{BackendOutcome, ChatBackend, ChatRequest, OpenAiCompatBackend};
pub use error::JudgeError;
pub use policy::FallbackPolicy;

pub struct LlmJudge {
    policy: FallbackPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl LlmJudge {
    pub fn new(policy: FallbackPolicy, max_tokens: u32, temperature: f32) -> Self {
        Self { policy, max_tokens, temperature }
    }

    /// OpenAI-compatible backends for every configured model.
    pub fn from_settings(settings: &JudgeSettings) -> error::Result<Self> {
        let backends = OpenAiCompatBackend::from_settings(settings)?;
        Ok(Self::new(FallbackPolicy::from_settings(backends, settings), settings.max_tokens, settings.temperature))
    }

    fn request(&self, prompt: String) -> ChatRequest {
        ChatRequest { prompt, json_mode: true, max_tokens: self.max_tokens, temperature: self.temperature }
    }

    /// Verdict on `claim` given evidence already in narrative order.
    pub async fn judge(&self, character: &str, caption: &str, claim: &str, evidence: &[EvidenceItem]) -> Verdict {
        let started = Instant::now();
        let block = prompt::format_evidence_block(evidence);
        let request = self.request(prompt::render_judge_prompt(character, caption, claim, &block));
        let verdict = match self.policy.call(&request).await {
            Some(raw) => parse::parse_verdict(&raw),
            None => Verdict::consistent(parse::API_ERROR),
        };
        info!(
            evidence = evidence.len(),
            prediction = verdict.prediction,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "judged claim"
        );
        verdict
    }

    /// Atomic facts in `claim`; falls back to the claim itself.
    pub async fn extract_facts(&self, character: &str, caption: &str, claim: &str) -> Vec<String> {
        let request = self.request(prompt::render_fact_prompt(character, caption, claim));
        let facts = self.policy.call(&request).await.and_then(|raw| parse::parse_facts(&raw));
        match facts {
            Some(facts) => {
                debug!(facts = facts.len(), "extracted facts");
                facts
            }
            None => vec![claim.to_string()],
        }
    }
}
