use std::time::Duration;

use metrics::counter;
use rand::Rng;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;

/// HTTP statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const USER_AGENT: &str = "walletsnap/0.1";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request failed after {attempts} attempts: {url}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<RequestError>,
    },
}

impl RequestError {
    /// Connection failures, timeouts, truncated bodies and the statuses in
    /// [`RETRYABLE_STATUSES`] are worth another attempt. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Transport { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_body() || source.is_request()
            }
            RequestError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// HTTP status of the final failure, looking through retry exhaustion.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Exhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Bounded retry with exponential backoff and uniform jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(800),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after `attempt` (numbered from 1):
    /// `base * 2^(attempt-1)`.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    /// Full delay: exponential part plus `uniform(0, jitter)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.exponential_delay(attempt) + jitter
    }
}

/// Outbound HTTP shared by every reader and price source.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    policy: RetryPolicy,
    timeout: Duration,
    /// Credentials embedded in request URLs, masked wherever a URL is shown.
    secrets: Vec<String>,
}

impl RetryingClient {
    pub fn new(http: Client, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            http,
            policy,
            timeout,
            secrets: Vec::new(),
        }
    }

    /// Mask `secret` in every URL this client puts into errors or logs.
    pub fn with_redacted(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() && !self.secrets.contains(&secret) {
            self.secrets.push(secret);
        }
        self
    }

    /// Build a client with the crate's user agent.
    pub fn with_policy(policy: RetryPolicy, timeout: Duration) -> Result<Self, RequestError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Transport {
                url: String::new(),
                source: e,
            })?;
        Ok(Self::new(http, policy, timeout))
    }

    /// Send a request, retrying transient failures. Returns the response body.
    ///
    /// The body is read inside the retry loop so a truncated transfer counts as
    /// a transient failure of that attempt.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, RequestError> {
        let target = if query.is_empty() {
            Url::parse(url)
        } else {
            Url::parse_with_params(url, query)
        }
        .map_err(|e| RequestError::InvalidUrl {
            url: redact(url, &self.secrets),
            reason: e.to_string(),
        })?;

        let shown = redact(target.as_str(), &self.secrets);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            counter!("http_requests_total").increment(1);

            let err = match self.send_once(method.clone(), target.clone(), &shown, body).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        tracing::debug!(url = %shown, attempt, "Request succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    url = %shown,
                    attempts = max_attempts,
                    error = %err,
                    "Request failed, retries exhausted"
                );
                return Err(RequestError::Exhausted {
                    url: shown,
                    attempts: max_attempts,
                    source: Box::new(err),
                });
            }

            let delay = self.policy.backoff_for(attempt);
            tracing::warn!(
                url = %shown,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient request failure, backing off"
            );
            counter!("http_retries_total").increment(1);
            sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let bytes = self.execute(Method::GET, url, query, None).await?;
        decode(&redact(url, &self.secrets), &bytes)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, RequestError> {
        let bytes = self.execute(Method::POST, url, &[], Some(body)).await?;
        decode(&redact(url, &self.secrets), &bytes)
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        shown: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, RequestError> {
        let mut req = self.http.request(method, url).timeout(self.timeout);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| RequestError::Transport {
            url: shown.to_string(),
            source: e.without_url(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RequestError::Status {
                url: shown.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RequestError::Transport {
                url: shown.to_string(),
                source: e.without_url(),
            })?;
        Ok(bytes.to_vec())
    }
}

fn decode<T: DeserializeOwned>(shown: &str, bytes: &[u8]) -> Result<T, RequestError> {
    serde_json::from_slice(bytes).map_err(|e| RequestError::Decode {
        url: shown.to_string(),
        source: e,
    })
}

/// URL as it may appear in errors and logs: the query string (which may carry
/// API keys) is dropped and every secret is masked.
fn redact(url: &str, secrets: &[String]) -> String {
    let mut shown = url.split('?').next().unwrap_or(url).to_string();
    for secret in secrets {
        shown = shown.replace(secret.as_str(), "***");
    }
    shown
}
