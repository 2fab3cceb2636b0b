//! Recompute derived metrics for every company, outside a full ingest run.
//!
//! A failure for one company is logged and the batch continues.

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fundamentals_etl::database::DatabaseManager;
use fundamentals_etl::metrics::MetricsCalculator;
use fundamentals_etl::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_path).await?;
    let calculator = MetricsCalculator::new(database.clone());

    let companies = database.get_companies().await?;
    info!("Calculating metrics for {} companies...", companies.len());

    let mut failures = 0;
    for company in &companies {
        let Some(company_id) = company.id else { continue };
        info!("Processing {}...", company.symbol);

        match calculator.calculate_all_metrics(company_id).await {
            Ok(()) => info!("✓ Completed {}", company.symbol),
            Err(e) => {
                error!("Failed to calculate metrics for {}: {:#}", company.symbol, e);
                failures += 1;
            }
        }
    }

    info!("✓ All metrics calculated ({} failures)", failures);
    Ok(())
}
