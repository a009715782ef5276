mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cli::Backing;
use mnemofill::config::{default_config_path, MnemoConfig};

#[derive(Parser)]
#[command(name = "mnemofill", version, about = "Semantic fact memory for automatic form filling")]
struct Cli {
    /// Config file (default: ~/.mnemofill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a single fact, merging it into a near-duplicate if the oracle agrees
    Add {
        content: String,
        /// Where the fact came from
        #[arg(long, default_value = "")]
        overview: String,
        /// Use a throwaway in-memory index instead of the database
        #[arg(long)]
        ephemeral: bool,
    },
    /// Add extractor output: one fact per line, last line is the document overview
    Ingest {
        /// Text file, or `-` for stdin
        file: PathBuf,
        /// Use a throwaway in-memory index instead of the database
        #[arg(long)]
        ephemeral: bool,
    },
    /// Similarity search over stored facts
    Search {
        query: String,
        #[arg(short = 'k', long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show one fact with its metadata
    Show { id: String },
    /// Delete one fact by id
    Delete { id: String },
    /// List every stored fact
    List {
        #[arg(long)]
        json: bool,
    },
    /// Export all facts as JSON to stdout
    Export,
    /// Delete all facts
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Database diagnostics
    Doctor,
    /// Split a form submission JSON into classification chunks
    Chunk {
        file: PathBuf,
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Attach memories to questions (or raw fields) and print filler batches
    Plan {
        file: PathBuf,
        /// Input is raw form fields rather than generated questions
        #[arg(long)]
        fields: bool,
        #[arg(long)]
        budget: Option<usize>,
        /// Memories retrieved per item
        #[arg(short = 'k', long)]
        per_item: Option<usize>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.mnemofill/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = MnemoConfig::load_from(&config_path)?;

    // stderr keeps stdout clean for JSON output.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !config_path.exists() {
        tracing::info!(path = %config_path.display(), "no config file, using defaults");
    }

    match cli.command {
        Command::Add {
            content,
            overview,
            ephemeral,
        } => cli::facts::add(&config, Backing::from_flag(ephemeral), content, overview).await?,
        Command::Ingest { file, ephemeral } => {
            cli::ingest::ingest(&config, Backing::from_flag(ephemeral), file).await?
        }
        Command::Search { query, limit, json } => cli::search::search(&config, query, limit, json).await?,
        Command::Show { id } => cli::facts::show(&config, id).await?,
        Command::Delete { id } => cli::facts::delete(&config, id).await?,
        Command::List { json } => cli::facts::list(&config, json).await?,
        Command::Export => cli::export::export(&config).await?,
        Command::Reset { yes } => cli::reset::reset(&config, yes).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Chunk { file, budget } => cli::chunk::chunk(&config, &file, budget)?,
        Command::Plan {
            file,
            fields,
            budget,
            per_item,
        } => {
            let args = cli::plan::PlanArgs {
                path: &file,
                fields,
                budget,
                per_item,
            };
            cli::plan::plan(&config, args).await?
        }
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
