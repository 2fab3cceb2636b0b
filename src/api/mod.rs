use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::models::StatementType;

pub mod alpha_vantage;
pub use alpha_vantage::AlphaVantageClient;

/// Fixed-delay pacer that keeps the call cadence under the upstream
/// per-minute quota
pub struct ApiRateLimiter {
    delay: Duration,
}

impl ApiRateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Retry policy for transient upstream failures, applied around the single
/// network call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(15),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff clamped to [min_wait, max_wait]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        Duration::from_secs(1u64 << exp).clamp(self.min_wait, self.max_wait)
    }
}

/// Common trait for statement data providers
#[async_trait::async_trait]
pub trait StatementProvider {
    /// Fetch one raw statement payload; `None` when the call failed
    async fn fetch_statement(&self, symbol: &str, statement_type: StatementType) -> Option<Value>;

    /// Fetch all statement types for a company, keeping only the ones that
    /// succeeded
    async fn fetch_all_statements(&self, symbol: &str) -> HashMap<StatementType, Value> {
        let mut results = HashMap::new();

        for statement_type in StatementType::ALL {
            if let Some(payload) = self.fetch_statement(symbol, statement_type).await {
                results.insert(statement_type, payload);
            }
        }

        results
    }
}
