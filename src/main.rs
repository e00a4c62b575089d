use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minion_comms::{config::Config, mcp};
use minion_core::Database;

#[derive(Parser)]
#[command(name = "minion-comms")]
#[command(about = "Coordination server for a party of AI agents")]
struct Cli {
    /// Database file. Overrides MINION_COMMS_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server via stdio (one process per agent)
    Mcp,
    /// Create the database and schema, then print its path
    Init,
    /// Print the party status as JSON
    Status,
}

fn open(config: &Config) -> anyhow::Result<Database> {
    config.ensure_runtime_dir()?;
    let db = Database::open(&config.db_path)?;
    db.migrate()?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP frames, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "minion_comms=info,minion_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match cli.db {
        Some(path) => Config::with_db_path(path),
        None => Config::from_env()?,
    };

    match cli.command.unwrap_or(Commands::Mcp) {
        Commands::Mcp => {
            let db = open(&config)?;
            mcp::run_stdio_server(db, config).await?;
        }
        Commands::Init => {
            open(&config)?;
            println!("{}", config.db_path.display());
        }
        Commands::Status => {
            let db = open(&config)?;
            let status = db.party_status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
