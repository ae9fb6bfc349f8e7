//! Client for the recommendation service
//!
//! Wraps the two remote operations. Connection-level failures (refused,
//! reset, timed out) are retried with exponential backoff and jitter; a
//! response with an error status is returned to the caller as-is.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;

use crate::{
    error::{AppError, AppResult},
    models::{HyperparameterOverrides, RecalculationReport, ScoredItem, UserId},
};

/// Backoff settings for transport failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// `min(base * 2^attempt, max)` plus up to 30% random jitter
    fn delay(&self, attempt: u32) -> Duration {
        let capped = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_delay_ms);

        let jitter = if self.jitter {
            let range = (capped as f64 * 0.3) as u64;
            rand::thread_rng().gen_range(0..=range)
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Whether a request error is worth retrying
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

async fn with_backoff<F, Fut>(policy: &RetryPolicy, mut send: F) -> AppResult<Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < policy.max_retries && is_transient(&e) => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Recommendation service unreachable, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(AppError::Transport(e)),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AppError::Remote {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Remote handle on a running recommendation service
#[derive(Debug, Clone)]
pub struct RecommendationClient {
    http_client: HttpClient,
    base_url: String,
    retry: RetryPolicy,
}

impl RecommendationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry(base_url, RetryPolicy::default())
    }

    pub fn with_retry(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client: HttpClient::new(),
            base_url,
            retry,
        }
    }

    /// Stored recommendations for `user_id`, best first
    pub async fn get_recommendations(&self, user_id: UserId) -> AppResult<Vec<ScoredItem>> {
        let url = format!("{}/api/v1/users/{}/recommendations", self.base_url, user_id);
        let response = with_backoff(&self.retry, || self.http_client.get(&url).send()).await?;
        decode(response).await
    }

    /// Blocks until the service has recomputed and stored all recommendations
    pub async fn trigger_recalculation(&self) -> AppResult<RecalculationReport> {
        self.trigger_recalculation_with(&HyperparameterOverrides::default())
            .await
    }

    pub async fn trigger_recalculation_with(
        &self,
        overrides: &HyperparameterOverrides,
    ) -> AppResult<RecalculationReport> {
        let url = format!("{}/api/v1/recalculate", self.base_url);
        let response = with_backoff(&self.retry, || {
            self.http_client.post(&url).json(overrides).send()
        })
        .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(20), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_thirty_percent() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay(1).as_millis();
            assert!((200..=260).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = RecommendationClient::new("http://localhost:18861/");
        assert_eq!(client.base_url, "http://localhost:18861");
    }
}
