mod api;
mod database;
mod metrics;
mod models;
mod pipeline;
mod transform;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::api::AlphaVantageClient;
use crate::database::DatabaseManager;
use crate::models::{Config, RunStatus, StatementType};
use crate::pipeline::EtlPipeline;
use crate::transform::Transformer;

#[derive(Parser)]
#[command(about = "Financial statement ETL pipeline")]
struct Args {
    /// Print the planned work without calling the API or touching the database
    #[arg(long)]
    dry_run: bool,
}

fn dry_run(config: &Config) {
    let companies = config.companies();
    println!("Companies configured: {:?}", companies);

    for symbol in &companies {
        println!(
            "Processing {}: would fetch {} statement types",
            symbol,
            StatementType::ALL.len()
        );
    }

    println!("\nSummary:");
    println!("  Companies to process: {}", companies.len());
    println!(
        "  Total API calls (simulated): {}",
        companies.len() * StatementType::ALL.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            eprintln!("Make sure you have a .env file with ALPHA_VANTAGE_API_KEY set.");
            std::process::exit(1);
        }
    };

    if args.dry_run {
        dry_run(&config);
        return Ok(());
    }

    let database = match DatabaseManager::new(&config.database_path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            eprintln!("❌ Database Error: {}", e);
            std::process::exit(1);
        }
    };

    let client = AlphaVantageClient::new(&config)?;
    let transformer = Transformer::new(config.years_to_fetch);
    let pipeline = EtlPipeline::new(client, transformer, database, config.companies());

    let stats = pipeline.run().await;

    // Exit status signals success or failure to the invoking scheduler
    std::process::exit(match stats.status {
        RunStatus::Success => 0,
        RunStatus::Failed => 1,
    });
}
