//! `pagepilot` binary entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pagepilot_cli::config::AppConfig;
use pagepilot_cli::{demo, runner};

#[derive(Parser)]
#[command(name = "pagepilot", version, about = "Page automation agent")]
struct Cli {
    /// Path to a configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one instruction against a simulated page and print the report.
    Run {
        /// The instruction to carry out.
        #[arg(long)]
        instruction: String,

        /// JSON page description; the built-in demo page when absent.
        #[arg(long)]
        page: Option<PathBuf>,

        /// Override the configured step budget.
        #[arg(long)]
        max_steps: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            instruction,
            page,
            max_steps,
        } => {
            if let Some(steps) = max_steps {
                config.max_steps = steps;
            }
            let description = match page {
                Some(path) => demo::load_page(&path)?,
                None => demo::demo_page(),
            };
            let report = runner::run_instruction(&config, description, &instruction).await?;
            let rendered =
                serde_json::to_string_pretty(&report).context("serializing run report")?;
            println!("{rendered}");
        }
    }
    Ok(())
}
