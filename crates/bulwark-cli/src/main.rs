//! Bulwark CLI - run simulated workloads through a resilient orchestrator

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli))
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = commands::load_settings(cli.config.as_deref(), cli.env_prefix.as_deref())?;

    match cli.command {
        Commands::Run {
            failures,
            latency_ms,
            value,
            fallback,
            calls,
        } => {
            let args = commands::run::RunArgs {
                failures,
                latency_ms,
                value,
                fallback,
                calls,
            };
            commands::run::run(&settings, args, cli.output).await?;
        }
        Commands::Check => {
            commands::check::run(&settings, cli.output)?;
        }
    }

    Ok(())
}
