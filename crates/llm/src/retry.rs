use std::time::Duration;

use async_trait::async_trait;
use boardroom_common::{BoardroomError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::stream::StreamEvent;

/// Backoff policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retries rate-limit and 5xx failures with exponential backoff.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Rate limits, 5xx responses and timeouts are worth another try.
    fn is_retryable(error: &BoardroomError) -> bool {
        match error {
            BoardroomError::Provider { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            BoardroomError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Delay requested by the provider's `Retry-After` header, in ms.
    fn retry_after_ms(error: &BoardroomError) -> Option<u64> {
        match error {
            BoardroomError::Provider {
                retry_after_secs: Some(secs),
                ..
            } => Some(secs.saturating_mul(1000)),
            _ => None,
        }
    }

    fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let jitter = (base * 0.1 * jitter_fraction(attempt)) as u64;
        (base as u64)
            .saturating_add(jitter)
            .min(self.config.max_delay_ms)
    }

    /// Decide whether `error` on `attempt` deserves another try, sleeping first.
    async fn backoff(&self, attempt: u32, error: &BoardroomError) -> bool {
        if attempt >= self.config.max_retries || !Self::is_retryable(error) {
            return false;
        }

        let delay = Self::retry_after_ms(error)
            .unwrap_or_else(|| self.compute_delay(attempt))
            .min(self.config.max_delay_ms);

        warn!(
            attempt = attempt + 1,
            max_retries = self.config.max_retries,
            delay_ms = delay,
            error = %error,
            "Retrying LLM request"
        );

        tokio::time::sleep(Duration::from_millis(delay)).await;
        true
    }
}

/// Deterministic jitter in `[0, 1)` derived from the attempt number.
fn jitter_fraction(attempt: u32) -> f64 {
    let x = attempt.wrapping_add(1).wrapping_mul(2_654_435_761);
    (x % 100) as f64 / 100.0
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !self.backoff(attempt, &e).await {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        sink: mpsc::Sender<StreamEvent>,
    ) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            let (tx, mut rx) = mpsc::channel(sink.max_capacity());
            let call = self.inner.complete_stream(request.clone(), tx);
            let forward = async {
                let mut forwarded = false;
                while let Some(event) = rx.recv().await {
                    forwarded = true;
                    let _ = sink.send(event).await;
                }
                forwarded
            };

            match tokio::join!(call, forward) {
                (Ok(response), _) => return Ok(response),
                // A retry would replay text the caller has already shown.
                (Err(e), true) => {
                    warn!(error = %e, "Stream failed after partial output, not retrying");
                    return Err(e);
                }
                (Err(e), false) => {
                    if !self.backoff(attempt, &e).await {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
