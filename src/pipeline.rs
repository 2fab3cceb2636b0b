use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::api::StatementProvider;
use crate::database::DatabaseManager;
use crate::metrics::MetricsCalculator;
use crate::models::{CompanyQualityIssue, RunStats, RunStatus, StatementType};
use crate::transform::Transformer;

pub const WORKFLOW_NAME: &str = "fundamentals_etl";

/// Extract-transform-load-calculate pipeline over the configured company list
pub struct EtlPipeline<P> {
    provider: P,
    transformer: Transformer,
    database: DatabaseManager,
    calculator: MetricsCalculator,
    companies: Vec<String>,
}

impl<P: StatementProvider + Sync> EtlPipeline<P> {
    pub fn new(
        provider: P,
        transformer: Transformer,
        database: DatabaseManager,
        companies: Vec<String>,
    ) -> Self {
        let calculator = MetricsCalculator::new(database.clone());

        Self {
            provider,
            transformer,
            database,
            calculator,
            companies,
        }
    }

    /// Run the full pipeline. The audit row is written regardless of outcome,
    /// with execution time measured end-to-end including failure paths.
    pub async fn run(&self) -> RunStats {
        let started = Instant::now();
        let mut stats = RunStats::new(WORKFLOW_NAME);

        info!("Starting {} pipeline", WORKFLOW_NAME);

        if let Err(err) = self.process_companies(&mut stats).await {
            error!("ETL failed: {:#}", err);
            stats.status = RunStatus::Failed;
            stats.error_details = Some(format!("{:#}", err));
        }

        stats.execution_time_seconds = started.elapsed().as_secs();

        // A logging failure is reported on its own; it never overrides the
        // pipeline outcome
        if let Err(err) = self.database.log_etl_run(&stats).await {
            error!("Failed to log ETL run: {:#}", err);
        }

        self.log_summary(&stats);
        stats
    }

    async fn process_companies(&self, stats: &mut RunStats) -> Result<()> {
        info!("Processing {} companies: {:?}", self.companies.len(), self.companies);

        for symbol in &self.companies {
            info!("Processing {}", symbol);

            let Some(company_id) = self.database.get_company_id(symbol).await? else {
                error!("Company {} not found in database", symbol);
                stats.api_failures += 1;
                continue;
            };

            let statements = self.provider.fetch_all_statements(symbol).await;
            // Counts calls attempted, one per statement type, including the
            // ones that failed
            stats.api_calls_made += StatementType::ALL.len() as u32;

            if statements.is_empty() {
                warn!("No data fetched for {}", symbol);
                stats.api_failures += StatementType::ALL.len() as u32;
                continue;
            }

            let mut total_records = 0;

            for statement_type in StatementType::ALL {
                let Some(payload) = statements.get(&statement_type) else {
                    continue;
                };

                let records =
                    self.transformer
                        .transform_to_records(company_id, statement_type, payload);

                let issues = self.transformer.validate_data_quality(&records);
                if !issues.is_empty() {
                    warn!(
                        "{} {}: {} data quality issues found",
                        symbol,
                        statement_type,
                        issues.len()
                    );
                    stats
                        .data_quality_errors
                        .extend(issues.into_iter().map(|issue| CompanyQualityIssue {
                            company: symbol.clone(),
                            statement: statement_type,
                            issue,
                        }));
                }

                total_records += self.database.bulk_insert_statements(&records).await?;
            }

            self.database.update_company_timestamp(company_id).await?;
            info!("✓ Loaded {} records for {}", total_records, symbol);

            info!("Calculating metrics for {}...", symbol);
            self.calculator.calculate_all_metrics(company_id).await?;

            stats.companies_processed += 1;
        }

        info!("✓ ETL completed successfully");
        Ok(())
    }

    fn log_summary(&self, stats: &RunStats) {
        info!("Execution Summary:");
        info!("  Companies processed: {}", stats.companies_processed);
        info!("  API calls made: {}", stats.api_calls_made);
        info!("  API failures: {}", stats.api_failures);
        info!("  Data quality errors: {}", stats.data_quality_errors.len());
        info!("  Execution time: {}s", stats.execution_time_seconds);
        info!("  Status: {}", stats.status);
    }
}
