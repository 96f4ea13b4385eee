#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use clap::{Parser, Subcommand};
use command::{CommandStrategy, InitStrategy, RunInput, RunStrategy, VersionStrategy};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "lmao")]
#[command(about = "Governed tool-using agent loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a conversation interactively, or once with --prompt
    Run {
        /// Single prompt to process
        #[arg(short = 'p', long)]
        prompt: Option<String>,

        /// No human is available to answer questions
        #[arg(long)]
        headless: bool,

        /// Model calls allowed per user input
        #[arg(long)]
        max_turns: Option<usize>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,
    },
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            prompt,
            headless,
            max_turns,
            model,
        } => {
            RunStrategy
                .execute(RunInput {
                    prompt,
                    headless,
                    max_turns,
                    model,
                })
                .await?;
        }
        Commands::Init => InitStrategy.execute(()).await?,
        Commands::Version => VersionStrategy.execute(()).await?,
    }

    Ok(())
}
