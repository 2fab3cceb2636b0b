//! Persistence layer tests against throwaway SQLite databases

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use fundamentals_etl::database::DatabaseManager;
use fundamentals_etl::models::{
    CalculatedMetric, Company, MetricCategory, RunStats, RunStatus, StatementRecord, StatementType,
};

async fn test_database() -> (TempDir, DatabaseManager) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let db = DatabaseManager::new(path.to_str().unwrap())
        .await
        .expect("failed to open database");
    (dir, db)
}

fn company(symbol: &str) -> Company {
    Company {
        id: None,
        symbol: symbol.to_string(),
        name: format!("{} Incorporated", symbol),
        sector: Some("Industrials".to_string()),
        industry: None,
        updated_at: None,
    }
}

fn record(
    company_id: i64,
    fiscal_year: i32,
    metric_name: &str,
    metric_value: Option<f64>,
) -> StatementRecord {
    StatementRecord {
        company_id,
        statement_type: StatementType::Income,
        fiscal_year,
        fiscal_period: "FY".to_string(),
        metric_name: metric_name.to_string(),
        metric_value,
        reported_currency: "USD".to_string(),
        raw_data: "{\"fiscalDateEnding\":\"2025-12-31\"}".to_string(),
    }
}

#[test_log::test(tokio::test)]
async fn test_company_lookup_miss_is_none_not_error() {
    let (_dir, db) = test_database().await;

    assert_eq!(db.get_company_id("XYZ").await.unwrap(), None);

    let id = db.upsert_company(&company("TEL")).await.unwrap();
    assert_eq!(db.get_company_id("TEL").await.unwrap(), Some(id));
}

#[test_log::test(tokio::test)]
async fn test_company_upsert_is_keyed_on_symbol() {
    let (_dir, db) = test_database().await;

    let first = db.upsert_company(&company("TEL")).await.unwrap();
    let mut renamed = company("TEL");
    renamed.name = "TE Connectivity".to_string();
    let second = db.upsert_company(&renamed).await.unwrap();

    assert_eq!(first, second);
    let companies = db.get_companies().await.unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "TE Connectivity");
}

#[test_log::test(tokio::test)]
async fn test_bulk_insert_is_idempotent() {
    let (_dir, db) = test_database().await;
    let company_id = db.upsert_company(&company("TEL")).await.unwrap();

    let records = vec![
        record(company_id, 2025, "total_revenue", Some(16000.0)),
        record(company_id, 2025, "net_income", Some(1900.0)),
        record(company_id, 2025, "ebitda", None),
        record(company_id, 2024, "total_revenue", Some(15000.0)),
    ];

    assert_eq!(db.bulk_insert_statements(&records).await.unwrap(), 4);
    let count_after_first = db.get_stats().await.unwrap()["statement_records"];

    // Second identical load: same natural keys, same values, no duplicates
    assert_eq!(db.bulk_insert_statements(&records).await.unwrap(), 4);
    let count_after_second = db.get_stats().await.unwrap()["statement_records"];
    assert_eq!(count_after_first, count_after_second);
    assert_eq!(count_after_second, 4);

    let data = db.get_statement_data(company_id, 2025).await.unwrap();
    assert_eq!(data.get("total_revenue"), Some(&16000.0));
    assert_eq!(data.get("net_income"), Some(&1900.0));
    // Null values are omitted from the flat map
    assert_eq!(data.get("ebitda"), None);
}

#[test_log::test(tokio::test)]
async fn test_reingestion_overwrites_value_and_raw_payload() {
    let (_dir, db) = test_database().await;
    let company_id = db.upsert_company(&company("TEL")).await.unwrap();

    db.bulk_insert_statements(&[record(company_id, 2025, "total_revenue", Some(16000.0))])
        .await
        .unwrap();

    // Restated revenue arrives on a later run
    db.bulk_insert_statements(&[record(company_id, 2025, "total_revenue", Some(16100.0))])
        .await
        .unwrap();

    let data = db.get_statement_data(company_id, 2025).await.unwrap();
    assert_eq!(data.get("total_revenue"), Some(&16100.0));
    assert_eq!(db.get_stats().await.unwrap()["statement_records"], 1);
}

#[test_log::test(tokio::test)]
async fn test_statement_years_are_distinct_and_descending() {
    let (_dir, db) = test_database().await;
    let company_id = db.upsert_company(&company("TEL")).await.unwrap();

    let records = vec![
        record(company_id, 2019, "total_revenue", Some(800.0)),
        record(company_id, 2022, "total_revenue", Some(1200.0)),
        record(company_id, 2021, "total_revenue", Some(1000.0)),
        record(company_id, 2021, "net_income", Some(50.0)),
    ];
    db.bulk_insert_statements(&records).await.unwrap();

    assert_eq!(
        db.get_statement_years(company_id).await.unwrap(),
        vec![2022, 2021, 2019]
    );
}

#[test_log::test(tokio::test)]
async fn test_metric_upsert_overwrites_on_recomputation() {
    let (_dir, db) = test_database().await;
    let company_id = db.upsert_company(&company("TEL")).await.unwrap();

    let first = vec![CalculatedMetric {
        metric_name: "gross_margin_pct".to_string(),
        metric_value: 40.0,
        metric_category: MetricCategory::Profitability,
    }];
    db.upsert_metrics(company_id, 2025, &first).await.unwrap();

    let second = vec![CalculatedMetric {
        metric_name: "gross_margin_pct".to_string(),
        metric_value: 41.5,
        metric_category: MetricCategory::Profitability,
    }];
    db.upsert_metrics(company_id, 2025, &second).await.unwrap();

    let stored = db.get_calculated_metrics(company_id, 2025).await.unwrap();
    assert_eq!(stored, second);
}

#[test_log::test(tokio::test)]
async fn test_etl_run_logging_round_trip() {
    let (_dir, db) = test_database().await;

    assert!(db.get_last_run().await.unwrap().is_none());

    let mut stats = RunStats::new("fundamentals_etl");
    stats.companies_processed = 2;
    stats.api_calls_made = 6;
    stats.api_failures = 1;
    stats.execution_time_seconds = 73;
    db.log_etl_run(&stats).await.unwrap();

    let mut failed = RunStats::new("fundamentals_etl");
    failed.status = RunStatus::Failed;
    failed.error_details = Some("database is locked".to_string());
    db.log_etl_run(&failed).await.unwrap();

    // Audit log is append-only; the latest row wins for status reporting
    assert_eq!(db.get_stats().await.unwrap()["etl_runs"], 2);
    let last = db.get_last_run().await.unwrap().unwrap();
    assert_eq!(last.status, "FAILED");
    assert_eq!(last.error_details, Some("database is locked".to_string()));
    assert_eq!(last.workflow_name, "fundamentals_etl");
}
