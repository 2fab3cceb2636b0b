use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{Config, StatementType};

use super::{ApiRateLimiter, RetryPolicy, StatementProvider};

/// Classified upstream failure shapes
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(StatusCode),

    /// Explicit error payload; permanent for this call
    #[error("API error: {0}")]
    Api(String),

    /// Rate-limit notice payload; transient for this call
    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(status) => status.is_server_error(),
            FetchError::Api(_) | FetchError::RateLimited(_) => false,
        }
    }
}

/// Alpha Vantage statement API client
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
    rate_limiter: ApiRateLimiter,
    rate_limit_backoff: Duration,
}

impl AlphaVantageClient {
    /// Create a new client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("fundamentals-etl/1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: config.alpha_vantage_api_key.clone(),
            base_url: config.alpha_vantage_base_url.clone(),
            retry: RetryPolicy::default(),
            rate_limiter: ApiRateLimiter::new(Duration::from_secs(config.api_call_delay_secs)),
            rate_limit_backoff: Duration::from_secs(60),
        })
    }

    /// Override the retry policy and sleep durations (used by tests to run
    /// without real waits)
    pub fn with_timing(
        mut self,
        retry: RetryPolicy,
        call_delay: Duration,
        rate_limit_backoff: Duration,
    ) -> Self {
        self.retry = retry;
        self.rate_limiter = ApiRateLimiter::new(call_delay);
        self.rate_limit_backoff = rate_limit_backoff;
        self
    }

    /// Issue a single statement request and classify the response
    async fn request_statement(
        &self,
        symbol: &str,
        statement_type: StatementType,
    ) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", statement_type.query_function()),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let payload: Value = response.json().await?;

        if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
            return Err(FetchError::Api(message.to_string()));
        }

        if let Some(note) = payload.get("Note").and_then(Value::as_str) {
            return Err(FetchError::RateLimited(note.to_string()));
        }

        Ok(payload)
    }
}

#[async_trait::async_trait]
impl StatementProvider for AlphaVantageClient {
    /// Fetch one raw statement payload, retrying transient failures under the
    /// configured policy; failures surface as `None`
    async fn fetch_statement(&self, symbol: &str, statement_type: StatementType) -> Option<Value> {
        info!("Fetching {} for {}...", statement_type, symbol);

        let mut payload = None;
        let mut rate_limited = false;

        for attempt in 1..=self.retry.max_attempts {
            match self.request_statement(symbol, statement_type).await {
                Ok(data) => {
                    info!("✓ Fetched {} for {}", statement_type, symbol);
                    payload = Some(data);
                    break;
                }
                Err(FetchError::Api(message)) => {
                    error!("API error for {} {}: {}", symbol, statement_type, message);
                    break;
                }
                Err(FetchError::RateLimited(note)) => {
                    warn!("API rate limit for {} {}: {}", symbol, statement_type, note);
                    // Back off for the full quota window; the call is recorded
                    // as a failure and not re-attempted within this run
                    tokio::time::sleep(self.rate_limit_backoff).await;
                    rate_limited = true;
                    break;
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        "Attempt {}/{} failed for {} {}: {}",
                        attempt, self.retry.max_attempts, symbol, statement_type, err
                    );
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(err) => {
                    error!("Request failed for {} {}: {}", symbol, statement_type, err);
                    break;
                }
            }
        }

        // Fixed inter-call delay keeps the cadence under the per-minute
        // quota; the rate-limit branch has already slept a full window
        if !rate_limited {
            self.rate_limiter.wait().await;
        }

        payload
    }
}
