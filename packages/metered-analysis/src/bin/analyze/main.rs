//! CLI for running metered document analyses against PostgreSQL.
//!
//! Prints status events and query results as JSON lines.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use metered_analysis::{
    AnalysisOrchestrator, Artifact, CostCatalog, CreditLedger, ExtractionChain, HttpAnalyzer,
    PipelineConfig, PostgresStore, Quote,
};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "analyze")]
#[command(about = "Credit-metered document analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a document, charging the organization's wallet
    Run {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        user: Uuid,
        file: PathBuf,
        /// Override the content type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Show the current balance
    Balance {
        #[arg(long)]
        org: Uuid,
    },

    /// Add credits to a wallet
    TopUp {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        user: Uuid,
        amount: i64,
        #[arg(long, default_value = "Top-up")]
        description: String,
    },

    /// Show the price of an analysis and whether the balance covers it
    Quote {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        action: Option<String>,
    },

    /// List ledger transactions, oldest first
    History {
        #[arg(long)]
        org: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,metered_analysis=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store = Arc::new(
        PostgresStore::new(&config.database_url)
            .await
            .context("Failed to connect to database")?,
    );

    let pipeline = config.pipeline();
    let ledger = CreditLedger::new(store.clone());

    match cli.command {
        Commands::Run {
            org,
            user,
            file,
            content_type,
        } => {
            let (endpoint, api_key) = config.analysis_service()?;
            let analyzer = HttpAnalyzer::new(endpoint, api_key, pipeline.remote_timeout)
                .context("Failed to create analysis client")?;
            let orchestrator = Arc::new(AnalysisOrchestrator::from_store(
                store,
                extraction_chain(&pipeline),
                Arc::new(analyzer),
                pipeline,
            ));

            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&file));
            let artifact = Artifact::new(file_name, content_type, bytes);

            let mut events = orchestrator.run_analysis(org, artifact, user);
            let mut failed = None;
            while let Some(event) = events.next().await {
                println!("{}", serde_json::to_string(&event)?);
                if event.is_error {
                    failed = Some(event.message.clone());
                }
            }
            if let Some(message) = failed {
                bail!("Analysis failed: {message}");
            }
        }
        Commands::Balance { org } => {
            let balance = ledger.get_balance(org).await?;
            println!("{}", json!({ "organizationId": org, "balance": balance }));
        }
        Commands::TopUp {
            org,
            user,
            amount,
            description,
        } => {
            let transaction = ledger.add(org, amount, &description, user).await?;
            println!("{}", serde_json::to_string(&transaction)?);
        }
        Commands::Quote { org, action } => {
            let action = action.unwrap_or_else(|| pipeline.action_key.clone());
            let catalog = CostCatalog::new(store, pipeline.price_ttl);
            let quote =
                Quote::resolve(&catalog, &ledger, org, &action, pipeline.fallback_price).await?;
            println!(
                "{}",
                json!({
                    "actionKey": action,
                    "price": quote.price,
                    "balance": quote.balance,
                    "sufficient": quote.sufficient,
                })
            );
        }
        Commands::History { org } => {
            for transaction in ledger.transactions(org).await? {
                println!("{}", serde_json::to_string(&transaction)?);
            }
        }
    }

    Ok(())
}

#[cfg(feature = "pdf")]
fn extraction_chain(pipeline: &PipelineConfig) -> ExtractionChain {
    use metered_analysis::{LopdfParser, StaticAssets};

    ExtractionChain::standard(Arc::new(LopdfParser::new()), Arc::new(StaticAssets::default()))
        .with_config(pipeline)
}

#[cfg(not(feature = "pdf"))]
fn extraction_chain(pipeline: &PipelineConfig) -> ExtractionChain {
    use metered_analysis::RawScanExtractor;

    ExtractionChain::new(vec![Box::new(RawScanExtractor::new())]).with_config(pipeline)
}

fn guess_content_type(path: &std::path::Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf".to_string(),
        Some("txt") => "text/plain".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}
