//! Seed the companies table from the configured symbol list.
//!
//! The pipeline never creates companies on its own; run this once before the
//! first ingest. Symbols may carry a display name as `SYMBOL=Name`.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fundamentals_etl::database::DatabaseManager;
use fundamentals_etl::models::{Company, Config};

#[derive(Parser)]
#[command(about = "Bootstrap the companies table")]
struct Args {
    /// Symbols to seed, e.g. TEL "ST=Sensata Technologies"; defaults to
    /// TARGET_COMPANIES from the environment
    symbols: Vec<String>,
}

fn parse_entry(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((symbol, name)) => (symbol.trim().to_string(), name.trim().to_string()),
        None => (entry.trim().to_string(), entry.trim().to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_path).await?;

    let entries = if args.symbols.is_empty() {
        config.companies()
    } else {
        args.symbols
    };

    for entry in &entries {
        let (symbol, name) = parse_entry(entry);
        let company = Company {
            id: None,
            symbol: symbol.clone(),
            name,
            sector: None,
            industry: None,
            updated_at: None,
        };

        let company_id = database.upsert_company(&company).await?;
        info!("✓ Seeded {} (id {})", symbol, company_id);
    }

    info!("Seeded {} companies", entries.len());
    Ok(())
}
