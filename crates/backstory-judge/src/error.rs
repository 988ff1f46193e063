//! Errors raised while talking to a chat-completion backend.
//!
//! None of these escape [`LlmJudge`](crate::LlmJudge); they drive the retry
//! and fallback decisions of [`FallbackPolicy`](crate::FallbackPolicy).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, JudgeError>;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("[judge] missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("[judge] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("[judge] no chat models configured")]
    NoModels,

    #[error("[judge] transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("[judge] HTTP {status} from {url}: {snippet}")]
    HttpStatus { status: u16, url: String, snippet: String },

    #[error("[judge] decode error: {0}")]
    Decode(String),

    #[error("[judge] response had no choices")]
    EmptyChoices,
}

impl JudgeError {
    /// Quota exhausted on this model; the next model should be tried.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, JudgeError::HttpStatus { status: 429, .. })
    }

    /// Worth retrying against the same model after a pause.
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            JudgeError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Trims a response body to a short single-line snippet for logs.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let cut: String = flat.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
