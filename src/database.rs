use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::models::{
    CalculatedMetric, Company, EtlRunSummary, MetricCategory, RunStats, StatementRecord,
};

// SQLite caps bound parameters per statement; 8 binds per record
const STATEMENT_BATCH_SIZE: usize = 100;

/// SQLX-based database manager for the ETL pipeline
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open the database and create the schema if missing
    pub async fn new(database_path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true)
                    .foreign_keys(true),
            )
            .await?;

        // WAL keeps readers (the dashboard) unblocked during loads
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

        let db = Self { pool };
        db.create_schema().await?;
        info!("Database initialized at {}", database_path);

        Ok(db)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                sector TEXT,
                industry TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS financial_statements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                statement_type TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                fiscal_period TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                metric_value REAL,
                reported_currency TEXT NOT NULL DEFAULT 'USD',
                raw_data TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (company_id) REFERENCES companies(id),
                UNIQUE(company_id, statement_type, fiscal_year, fiscal_period, metric_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calculated_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                fiscal_year INTEGER NOT NULL,
                metric_name TEXT NOT NULL,
                metric_value REAL,
                metric_category TEXT NOT NULL,
                calculated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (company_id) REFERENCES companies(id),
                UNIQUE(company_id, fiscal_year, metric_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS etl_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_date DATETIME DEFAULT CURRENT_TIMESTAMP,
                workflow_name TEXT NOT NULL,
                companies_processed INTEGER NOT NULL DEFAULT 0,
                api_calls_made INTEGER NOT NULL DEFAULT 0,
                api_failures INTEGER NOT NULL DEFAULT 0,
                data_quality_errors TEXT,
                execution_time_seconds INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error_details TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_statements_company_year
             ON financial_statements(company_id, fiscal_year)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_company_year
             ON calculated_metrics(company_id, fiscal_year)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_etl_runs_run_date ON etl_runs(run_date)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upsert a company keyed on symbol, returning its id
    pub async fn upsert_company(&self, company: &Company) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO companies (symbol, name, sector, industry, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                name = excluded.name,
                sector = excluded.sector,
                industry = excluded.industry,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&company.symbol)
        .bind(&company.name)
        .bind(&company.sector)
        .bind(&company.industry)
        .bind(Utc::now().naive_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(result.get::<i64, _>("id"))
    }

    /// Look up a company id by symbol; absence is a valid outcome
    pub async fn get_company_id(&self, symbol: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM companies WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    /// All companies, ordered by symbol
    pub async fn get_companies(&self) -> Result<Vec<Company>> {
        let rows = sqlx::query(
            "SELECT id, symbol, name, sector, industry, updated_at FROM companies ORDER BY symbol",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Company {
                id: Some(r.get::<i64, _>("id")),
                symbol: r.get::<String, _>("symbol"),
                name: r.get::<String, _>("name"),
                sector: r.get::<Option<String>, _>("sector"),
                industry: r.get::<Option<String>, _>("industry"),
                updated_at: r.get::<Option<DateTime<Utc>>, _>("updated_at"),
            })
            .collect())
    }

    /// Bulk upsert statement records keyed on the natural key. Returns the
    /// count attempted, not the rows actually changed.
    pub async fn bulk_insert_statements(&self, records: &[StatementRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        for chunk in records.chunks(STATEMENT_BATCH_SIZE) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "INSERT INTO financial_statements (company_id, statement_type, fiscal_year, \
                 fiscal_period, metric_name, metric_value, reported_currency, raw_data) ",
            );

            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.company_id)
                    .push_bind(record.statement_type.as_str())
                    .push_bind(record.fiscal_year)
                    .push_bind(record.fiscal_period.as_str())
                    .push_bind(record.metric_name.as_str())
                    .push_bind(record.metric_value)
                    .push_bind(record.reported_currency.as_str())
                    .push_bind(record.raw_data.as_str());
            });

            builder.push(
                " ON CONFLICT(company_id, statement_type, fiscal_year, fiscal_period, metric_name) \
                 DO UPDATE SET \
                 metric_value = excluded.metric_value, \
                 raw_data = excluded.raw_data, \
                 created_at = CURRENT_TIMESTAMP",
            );

            builder.build().execute(&self.pool).await?;
        }

        info!("✓ Upserted {} statement records", records.len());
        Ok(records.len())
    }

    /// Touch a company's updated_at marker after its statements are loaded
    pub async fn update_company_timestamp(&self, company_id: i64) -> Result<()> {
        sqlx::query("UPDATE companies SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(company_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Distinct fiscal years with statement data, newest first
    pub async fn get_statement_years(&self, company_id: i64) -> Result<Vec<i32>> {
        let rows = sqlx::query(
            "SELECT DISTINCT fiscal_year FROM financial_statements \
             WHERE company_id = ? ORDER BY fiscal_year DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get::<i32, _>("fiscal_year")).collect())
    }

    /// Flat name -> value map of one year's persisted statement fields;
    /// null values are omitted
    pub async fn get_statement_data(
        &self,
        company_id: i64,
        fiscal_year: i32,
    ) -> Result<HashMap<String, f64>> {
        let rows = sqlx::query(
            "SELECT metric_name, metric_value FROM financial_statements \
             WHERE company_id = ? AND fiscal_year = ?",
        )
        .bind(company_id)
        .bind(fiscal_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let value = r.get::<Option<f64>, _>("metric_value")?;
                Some((r.get::<String, _>("metric_name"), value))
            })
            .collect())
    }

    /// Upsert derived metrics for one company and fiscal year
    pub async fn upsert_metrics(
        &self,
        company_id: i64,
        fiscal_year: i32,
        metrics: &[CalculatedMetric],
    ) -> Result<()> {
        for metric in metrics {
            sqlx::query(
                r#"
                INSERT INTO calculated_metrics (
                    company_id, fiscal_year, metric_name, metric_value, metric_category
                ) VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(company_id, fiscal_year, metric_name) DO UPDATE SET
                    metric_value = excluded.metric_value,
                    metric_category = excluded.metric_category,
                    calculated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(company_id)
            .bind(fiscal_year)
            .bind(metric.metric_name.as_str())
            .bind(metric.metric_value)
            .bind(metric.metric_category.as_str())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Derived metrics stored for one company and fiscal year
    pub async fn get_calculated_metrics(
        &self,
        company_id: i64,
        fiscal_year: i32,
    ) -> Result<Vec<CalculatedMetric>> {
        let rows = sqlx::query(
            "SELECT metric_name, metric_value, metric_category FROM calculated_metrics \
             WHERE company_id = ? AND fiscal_year = ? ORDER BY metric_name",
        )
        .bind(company_id)
        .bind(fiscal_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let metric_value = r.get::<Option<f64>, _>("metric_value")?;
                let metric_category = match r.get::<String, _>("metric_category").as_str() {
                    "PROFITABILITY" => MetricCategory::Profitability,
                    "LIQUIDITY" => MetricCategory::Liquidity,
                    "EFFICIENCY" => MetricCategory::Efficiency,
                    _ => MetricCategory::Growth,
                };

                Some(CalculatedMetric {
                    metric_name: r.get::<String, _>("metric_name"),
                    metric_value,
                    metric_category,
                })
            })
            .collect())
    }

    /// Append one audit row for a pipeline invocation
    pub async fn log_etl_run(&self, stats: &RunStats) -> Result<()> {
        let quality_errors = serde_json::to_string(&stats.data_quality_errors)?;

        sqlx::query(
            r#"
            INSERT INTO etl_runs (
                workflow_name, companies_processed, api_calls_made, api_failures,
                data_quality_errors, execution_time_seconds, status, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stats.workflow_name.as_str())
        .bind(stats.companies_processed as i64)
        .bind(stats.api_calls_made as i64)
        .bind(stats.api_failures as i64)
        .bind(quality_errors)
        .bind(stats.execution_time_seconds as i64)
        .bind(stats.status.as_str())
        .bind(&stats.error_details)
        .execute(&self.pool)
        .await?;

        info!("✓ Logged ETL run to database");
        Ok(())
    }

    /// Most recent audit row, if any
    pub async fn get_last_run(&self) -> Result<Option<EtlRunSummary>> {
        let row = sqlx::query(
            r#"
            SELECT run_date, workflow_name, companies_processed, api_calls_made,
                   api_failures, execution_time_seconds, status, error_details
            FROM etl_runs
            ORDER BY run_date DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EtlRunSummary {
            run_date: r.get::<NaiveDateTime, _>("run_date"),
            workflow_name: r.get::<String, _>("workflow_name"),
            companies_processed: r.get::<i64, _>("companies_processed"),
            api_calls_made: r.get::<i64, _>("api_calls_made"),
            api_failures: r.get::<i64, _>("api_failures"),
            execution_time_seconds: r.get::<i64, _>("execution_time_seconds"),
            status: r.get::<String, _>("status"),
            error_details: r.get::<Option<String>, _>("error_details"),
        }))
    }

    /// Row counts per table, for status reporting and tests
    pub async fn get_stats(&self) -> Result<HashMap<String, i64>> {
        let mut stats = HashMap::new();

        for (key, table) in [
            ("companies", "companies"),
            ("statement_records", "financial_statements"),
            ("calculated_metrics", "calculated_metrics"),
            ("etl_runs", "etl_runs"),
        ] {
            let row = sqlx::query(&format!("SELECT COUNT(*) as count FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            stats.insert(key.to_string(), row.get::<i64, _>("count"));
        }

        Ok(stats)
    }
}
