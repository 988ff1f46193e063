//! Ordered model fallback with pacing and bounded retries.

use std::time::Duration;

use tracing::{error, warn};

use backstory_core::config::JudgeSettings;

use crate::backend::{BackendOutcome, ChatBackend, ChatRequest};

pub struct FallbackPolicy {
    backends: Vec<Box<dyn ChatBackend>>,
    max_attempts: usize,
    pacing: Duration,
    retry_backoff: Duration,
}

impl FallbackPolicy {
    pub fn new(backends: Vec<Box<dyn ChatBackend>>, max_attempts: usize, pacing: Duration, retry_backoff: Duration) -> Self {
        Self { backends, max_attempts: max_attempts.max(1), pacing, retry_backoff }
    }

    pub fn from_settings(backends: Vec<Box<dyn ChatBackend>>, settings: &JudgeSettings) -> Self {
        Self::new(
            backends,
            settings.max_attempts,
            Duration::from_millis(settings.pacing_ms),
            Duration::from_millis(settings.retry_backoff_ms),
        )
    }

    /// First successful completion, or `None` once every backend gave up.
    ///
    /// Each call is preceded by the pacing delay. Rate limits and permanent
    /// errors move on to the next backend; transient errors retry the same
    /// backend after the backoff, up to `max_attempts` calls.
    pub async fn call(&self, request: &ChatRequest) -> Option<String> {
        for backend in &self.backends {
            for attempt in 1..=self.max_attempts {
                pause(self.pacing).await;
                match BackendOutcome::from(backend.complete(request).await) {
                    BackendOutcome::Response(content) => return Some(content),
                    BackendOutcome::TransientFailure(e) => {
                        warn!(model = backend.name(), attempt, error = %e, "transient backend error");
                        if attempt < self.max_attempts {
                            pause(self.retry_backoff).await;
                        }
                    }
                    BackendOutcome::PermanentFailure(e) if e.is_rate_limited() => {
                        warn!(model = backend.name(), "rate limited, switching model");
                        break;
                    }
                    BackendOutcome::PermanentFailure(e) => {
                        warn!(model = backend.name(), error = %e, "backend failed, switching model");
                        break;
                    }
                }
            }
        }
        error!(backends = self.backends.len(), "all judge backends failed");
        None
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
