use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Financial statement categories supported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementType {
    Income,
    Balance,
    Cashflow,
}

impl StatementType {
    pub const ALL: [StatementType; 3] = [
        StatementType::Income,
        StatementType::Balance,
        StatementType::Cashflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Income => "INCOME",
            StatementType::Balance => "BALANCE",
            StatementType::Cashflow => "CASHFLOW",
        }
    }

    /// Upstream query function name for this statement type
    pub fn query_function(&self) -> &'static str {
        match self {
            StatementType::Income => "INCOME_STATEMENT",
            StatementType::Balance => "BALANCE_SHEET",
            StatementType::Cashflow => "CASH_FLOW",
        }
    }
}

impl std::fmt::Display for StatementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Company tracked by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<i64>,
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One normalized statement fact, keyed by
/// (company, statement type, fiscal year, fiscal period, metric name)
#[derive(Debug, Clone)]
pub struct StatementRecord {
    pub company_id: i64,
    pub statement_type: StatementType,
    pub fiscal_year: i32,
    pub fiscal_period: String,
    pub metric_name: String,
    pub metric_value: Option<f64>,
    pub reported_currency: String,
    pub raw_data: String,
}

/// Category tag carried by every derived metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricCategory {
    Profitability,
    Liquidity,
    Efficiency,
    Growth,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Profitability => "PROFITABILITY",
            MetricCategory::Liquidity => "LIQUIDITY",
            MetricCategory::Efficiency => "EFFICIENCY",
            MetricCategory::Growth => "GROWTH",
        }
    }
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived ratio for one company and fiscal year
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatedMetric {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_category: MetricCategory,
}

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality issue tagged with the company and statement it was found in
#[derive(Debug, Clone, Serialize)]
pub struct CompanyQualityIssue {
    pub company: String,
    pub statement: StatementType,
    #[serde(flatten)]
    pub issue: crate::transform::QualityIssue,
}

/// Statistics accumulated across one pipeline invocation
#[derive(Debug, Clone)]
pub struct RunStats {
    pub workflow_name: String,
    pub companies_processed: u32,
    pub api_calls_made: u32,
    pub api_failures: u32,
    pub data_quality_errors: Vec<CompanyQualityIssue>,
    pub execution_time_seconds: u64,
    pub status: RunStatus,
    pub error_details: Option<String>,
}

impl RunStats {
    pub fn new(workflow_name: &str) -> Self {
        Self {
            workflow_name: workflow_name.to_string(),
            companies_processed: 0,
            api_calls_made: 0,
            api_failures: 0,
            data_quality_errors: Vec::new(),
            execution_time_seconds: 0,
            status: RunStatus::Success,
            error_details: None,
        }
    }
}

/// Most recent audit row, as read back for status reporting
#[derive(Debug, Clone)]
pub struct EtlRunSummary {
    pub run_date: chrono::NaiveDateTime,
    pub workflow_name: String,
    pub companies_processed: i64,
    pub api_calls_made: i64,
    pub api_failures: i64,
    pub execution_time_seconds: i64,
    pub status: String,
    pub error_details: Option<String>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_base_url: String,
    pub api_call_delay_secs: u64,
    pub target_companies: String,
    pub years_to_fetch: i32,
    pub database_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            alpha_vantage_api_key: std::env::var("ALPHA_VANTAGE_API_KEY")
                .map_err(|_| anyhow::anyhow!("ALPHA_VANTAGE_API_KEY environment variable required"))?,
            alpha_vantage_base_url: std::env::var("ALPHA_VANTAGE_BASE_URL")
                .unwrap_or_else(|_| "https://www.alphavantage.co/query".to_string()),
            api_call_delay_secs: std::env::var("ALPHA_VANTAGE_DELAY")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .unwrap_or(12),
            target_companies: std::env::var("TARGET_COMPANIES")
                .unwrap_or_else(|_| "TEL,ST,DD".to_string()),
            years_to_fetch: std::env::var("YEARS_TO_FETCH")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "fundamentals.db".to_string()),
        })
    }

    /// Target company symbols, trimmed
    pub fn companies(&self) -> Vec<String> {
        self.target_companies
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
