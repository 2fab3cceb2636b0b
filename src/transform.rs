use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{StatementRecord, StatementType};

/// Mapping from an upstream field name to its canonical metric name
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub api_field: &'static str,
    pub metric_name: &'static str,
}

const fn mapping(api_field: &'static str, metric_name: &'static str) -> FieldMapping {
    FieldMapping { api_field, metric_name }
}

const INCOME_FIELDS: &[FieldMapping] = &[
    mapping("totalRevenue", "total_revenue"),
    mapping("costOfRevenue", "cost_of_revenue"),
    mapping("grossProfit", "gross_profit"),
    mapping("operatingIncome", "operating_income"),
    mapping("netIncome", "net_income"),
    mapping("ebitda", "ebitda"),
    mapping("researchAndDevelopment", "research_and_development"),
    mapping("operatingExpenses", "operating_expenses"),
];

const BALANCE_FIELDS: &[FieldMapping] = &[
    mapping("totalAssets", "total_assets"),
    mapping("totalCurrentAssets", "current_assets"),
    mapping("cashAndCashEquivalentsAtCarryingValue", "cash_and_equivalents"),
    mapping("inventory", "inventory"),
    mapping("totalLiabilities", "total_liabilities"),
    mapping("totalCurrentLiabilities", "current_liabilities"),
    mapping("totalShareholderEquity", "total_equity"),
    mapping("longTermDebt", "long_term_debt"),
    mapping("currentDebt", "current_debt"),
];

const CASHFLOW_FIELDS: &[FieldMapping] = &[
    mapping("operatingCashflow", "operating_cashflow"),
    mapping("cashflowFromInvestment", "investing_cashflow"),
    mapping("cashflowFromFinancing", "financing_cashflow"),
    mapping("capitalExpenditures", "capital_expenditures"),
];

/// Field map for a statement type, resolved at compile time
pub fn field_map(statement_type: StatementType) -> &'static [FieldMapping] {
    match statement_type {
        StatementType::Income => INCOME_FIELDS,
        StatementType::Balance => BALANCE_FIELDS,
        StatementType::Cashflow => CASHFLOW_FIELDS,
    }
}

/// Parse an upstream metric value into an optional numeric. Empty strings,
/// the literal "None", and unparseable values are null, never zero.
pub fn parse_metric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "None" {
                None
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

fn fiscal_year_of(fiscal_date: &str) -> Option<i32> {
    fiscal_date.get(..4)?.parse().ok()
}

/// Data quality issue found in one fiscal year's records. Advisory only:
/// issues are collected into the run's audit record but never block loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum QualityIssue {
    NegativeRevenue {
        year: i32,
        value: f64,
    },
    BalanceSheetMismatch {
        year: i32,
        difference: f64,
        assets: f64,
        liabilities_equity: f64,
    },
    MissingFields {
        year: i32,
        fields: Vec<String>,
    },
}

/// Transform upstream statement payloads to canonical records
pub struct Transformer {
    years_to_fetch: i32,
}

impl Transformer {
    pub fn new(years_to_fetch: i32) -> Self {
        Self { years_to_fetch }
    }

    /// Transform an API payload into one record per mapped field per report
    pub fn transform_to_records(
        &self,
        company_id: i64,
        statement_type: StatementType,
        payload: &Value,
    ) -> Vec<StatementRecord> {
        self.transform_as_of(company_id, statement_type, payload, Utc::now().year())
    }

    /// Transform with an explicit current year, so the cutoff is testable
    pub fn transform_as_of(
        &self,
        company_id: i64,
        statement_type: StatementType,
        payload: &Value,
        current_year: i32,
    ) -> Vec<StatementRecord> {
        let mut records = Vec::new();

        let all_reports = match payload.get("annualReports").and_then(Value::as_array) {
            Some(reports) if !reports.is_empty() => reports,
            _ => {
                warn!("No annual reports found for {}", statement_type);
                return records;
            }
        };

        // Hard calendar cutoff, not a last-N-reports count
        let min_year = current_year - self.years_to_fetch;

        let reports: Vec<(i32, &Value)> = all_reports
            .iter()
            .filter_map(|report| {
                let fiscal_year = report
                    .get("fiscalDateEnding")
                    .and_then(Value::as_str)
                    .and_then(fiscal_year_of)?;
                (fiscal_year >= min_year).then_some((fiscal_year, report))
            })
            .collect();

        info!(
            "{}: filtered {} reports to {} (years {}-{})",
            statement_type,
            all_reports.len(),
            reports.len(),
            min_year,
            current_year
        );

        for (fiscal_year, report) in reports {
            let raw_data = report.to_string();

            for field in field_map(statement_type) {
                let metric_value = report.get(field.api_field).and_then(parse_metric_value);

                records.push(StatementRecord {
                    company_id,
                    statement_type,
                    fiscal_year,
                    fiscal_period: "FY".to_string(),
                    metric_name: field.metric_name.to_string(),
                    metric_value,
                    reported_currency: "USD".to_string(),
                    raw_data: raw_data.clone(),
                });
            }
        }

        info!("Transformed {} records for {}", records.len(), statement_type);
        records
    }

    /// Validate data quality per fiscal year and return the issues found
    pub fn validate_data_quality(&self, records: &[StatementRecord]) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        let mut by_year: BTreeMap<i32, HashMap<&str, f64>> = BTreeMap::new();
        for record in records {
            let metrics = by_year.entry(record.fiscal_year).or_default();
            if let Some(value) = record.metric_value {
                metrics.insert(record.metric_name.as_str(), value);
            }
        }

        for (&year, metrics) in &by_year {
            if let Some(&revenue) = metrics.get("total_revenue") {
                if revenue < 0.0 {
                    issues.push(QualityIssue::NegativeRevenue { year, value: revenue });
                }
            }

            if let (Some(&assets), Some(&liabilities), Some(&equity)) = (
                metrics.get("total_assets"),
                metrics.get("total_liabilities"),
                metrics.get("total_equity"),
            ) {
                let difference = (assets - (liabilities + equity)).abs();
                // 1% tolerance for rounding; absolute fallback when assets
                // carry no magnitude to scale against
                let tolerance = if assets > 0.0 { assets * 0.01 } else { 1000.0 };

                if difference >= tolerance {
                    issues.push(QualityIssue::BalanceSheetMismatch {
                        year,
                        difference,
                        assets,
                        liabilities_equity: liabilities + equity,
                    });
                }
            }

            let required = ["total_revenue", "net_income", "total_assets"];
            let missing: Vec<String> = required
                .iter()
                .filter(|field| !metrics.contains_key(**field))
                .map(|field| field.to_string())
                .collect();
            if !missing.is_empty() {
                issues.push(QualityIssue::MissingFields { year, fields: missing });
            }
        }

        if !issues.is_empty() {
            warn!("Found {} data quality issues", issues.len());
        }

        issues
    }
}
