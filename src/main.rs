/// Standard Reader CLI
///
/// Reads site.standard publications and documents for the DID configured in
/// the environment and prints them as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use standard_reader::{ReaderConfig, RecordRepository};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "standard-reader", version, about = "Read site.standard records from an ATProto repository")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Override the configured DID
    #[arg(long, global = true, env = "PUBLIC_ATPROTO_DID")]
    did: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every publication
    Publications,
    /// List documents, newest first
    Documents {
        /// Only documents belonging to this publication AT URI
        #[arg(long)]
        publication: Option<String>,
    },
    /// Fetch a single record by AT URI
    Get { uri: String },
    /// Print the resolved home endpoint
    Pds,
    /// Publications, documents and home endpoint in one document
    Overview,
}

#[derive(Serialize)]
struct Overview<T, U> {
    did: String,
    pds: String,
    publications: T,
    documents: U,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = ReaderConfig::from_env_with_did(cli.did.as_deref())
        .context("Failed to load configuration")?;

    let repo = RecordRepository::new(config)?;

    if let Err(e) = run(&repo, cli.command).await {
        error!("Request failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(repo: &RecordRepository, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Publications => print_json(&*repo.fetch_all_publications().await?),
        Command::Documents { publication: Some(uri) } => {
            print_json(&repo.fetch_documents_by_publication(&uri).await?)
        }
        Command::Documents { publication: None } => {
            print_json(&*repo.fetch_all_documents().await?)
        }
        Command::Get { uri } => {
            let record = repo
                .fetch_by_uri(&uri)
                .await?
                .with_context(|| format!("Record not found: {}", uri))?;
            print_json(&record)
        }
        Command::Pds => {
            println!("{}", repo.get_home_endpoint().await?);
            Ok(())
        }
        Command::Overview => {
            let (publications, documents) =
                tokio::try_join!(repo.fetch_all_publications(), repo.fetch_all_documents())?;
            let pds = repo.get_home_endpoint().await?;
            print_json(&Overview {
                did: repo.did().to_string(),
                pds,
                publications: &*publications,
                documents: &*documents,
            })
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "standard_reader=info".into());

    // Logs go to stderr so stdout stays valid JSON
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
