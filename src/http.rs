use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the retry loop waits between attempts. Tests swap in a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded exponential backoff: `base * 2^(n-1)` before retry `n`, capped.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::config(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn post_json_raw(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<String> {
        self.request_with_retry(|| {
            let mut req = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
            for (k, v) in headers {
                req = req.header(*k, *v);
            }
            req
        })
        .await
    }

    async fn request_with_retry<F>(&self, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (err, hint) = match build().send().await {
                Ok(resp) => match handle_response(resp).await {
                    Ok(body) => return Ok(body),
                    Err(failure) => failure,
                },
                Err(e) => (classify_send_error(&e), None),
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempt, "retries exhausted");
                return Err(Error::ProviderUnavailable {
                    attempts: attempt,
                    message: err.to_string(),
                });
            }

            let mut delay = self.policy.delay_after(attempt);
            if let Some(retry_after) = hint {
                delay = delay.max(retry_after).min(self.policy.max_delay);
            }
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "transient failure, will retry: {err}"
            );
            self.sleeper.sleep(delay).await;
            debug!(attempt = attempt + 1, "retrying request");
        }
    }
}

fn classify_send_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::transient(format!("request timed out: {e}"))
    } else if e.is_connect() || e.is_request() {
        Error::transient(format!("network error: {e}"))
    } else if e.is_builder() {
        Error::config(format!("invalid request: {e}"))
    } else {
        Error::transient(e.to_string())
    }
}

/// Success yields the body; failure yields the classified error plus an
/// optional server-requested wait.
async fn handle_response(
    resp: reqwest::Response,
) -> std::result::Result<String, (Error, Option<Duration>)> {
    let status = resp.status();
    let host = extract_domain(resp.url().as_str());

    if status.is_success() {
        return resp
            .text()
            .await
            .map_err(|e| (Error::transient(format!("read body: {e}")), None));
    }

    let retry_after = resp
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => (
            Error::config(format!(
                "{host} rejected credentials ({}): {body}",
                status.as_u16()
            )),
            None,
        ),
        StatusCode::TOO_MANY_REQUESTS => (
            Error::transient(format!("rate limited by {host}")),
            retry_after,
        ),
        StatusCode::REQUEST_TIMEOUT => (Error::transient(format!("{host} timed out (408)")), None),
        s if s.is_server_error() => (
            Error::transient(format!("{host} returned {}: {body}", s.as_u16())),
            None,
        ),
        s => (Error::rejected(host, s.as_u16(), body), None),
    })
}

fn extract_domain(url: &str) -> String {
    url.split("//")
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or("unknown")
        .to_string()
}
