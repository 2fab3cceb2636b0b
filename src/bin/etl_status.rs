//! Print the most recent pipeline audit row and table counts.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use fundamentals_etl::database::DatabaseManager;
use fundamentals_etl::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_path).await?;

    match database.get_last_run().await? {
        Some(run) => {
            println!("Last ETL run:");
            println!("  Date: {}", run.run_date);
            println!("  Workflow: {}", run.workflow_name);
            println!("  Status: {}", run.status);
            println!("  Companies processed: {}", run.companies_processed);
            println!("  API calls made: {}", run.api_calls_made);
            println!("  API failures: {}", run.api_failures);
            println!("  Execution time: {}s", run.execution_time_seconds);
            if let Some(details) = &run.error_details {
                println!("  Error details: {}", details);
            }
        }
        None => println!("No ETL runs found"),
    }

    let stats = database.get_stats().await?;
    println!("\nTable counts:");
    for key in ["companies", "statement_records", "calculated_metrics", "etl_runs"] {
        println!("  {}: {}", key, stats.get(key).copied().unwrap_or(0));
    }

    Ok(())
}
