mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "Declarative serverless containers", long_about = None)]
struct Cli {
    /// Container file (defaults to container.kdl discovery)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan,
    /// Converge every declared container
    Apply {
        /// Execute without stopping at the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Show tracked containers
    Show {
        /// Only this container
        key: Option<String>,
    },
    /// Re-read every tracked container
    Refresh,
    /// Track an existing container under a key
    Import {
        key: String,
        /// Remote container id
        id: String,
    },
    /// Delete a tracked container
    Destroy {
        key: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Validate the container file
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("containerflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let project = context::Project::load(cli.file.as_deref())?;

    match cli.command {
        Commands::Plan => commands::plan::handle(&project).await,
        Commands::Apply { yes } => commands::apply::handle(&project, yes).await,
        Commands::Show { key } => commands::show::handle(&project, key.as_deref()).await,
        Commands::Refresh => commands::refresh::handle(&project).await,
        Commands::Import { key, id } => commands::import::handle(&project, &key, &id).await,
        Commands::Destroy { key, yes } => commands::destroy::handle(&project, &key, yes).await,
        Commands::Validate => commands::validate::handle(&project),
        Commands::Version => Ok(()),
    }
}
