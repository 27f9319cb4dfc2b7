//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bulwark CLI - exercise retry, circuit breaking, timeouts and throttling
#[derive(Parser)]
#[command(name = "bulwark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Resilience settings file (yaml, toml, json, ini, ron, json5)
    #[arg(short = 'c', long, global = true, env = "BULWARK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Apply PREFIX__FIELD environment overrides to the settings file
    #[arg(long, global = true, env = "BULWARK_ENV_PREFIX", requires = "config")]
    pub env_prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulated operation through the configured orchestrator
    Run {
        /// Number of leading invocations that fail
        #[arg(short, long, default_value_t = 0)]
        failures: u32,

        /// Latency of every invocation in milliseconds
        #[arg(short, long, default_value_t = 0)]
        latency_ms: u64,

        /// Value returned by a successful invocation
        #[arg(long, default_value = "ok")]
        value: String,

        /// Value returned by the fallback, if any
        #[arg(long)]
        fallback: Option<String>,

        /// Number of consecutive executions
        #[arg(short = 'n', long, default_value_t = 1)]
        calls: u32,
    },

    /// Validate a settings file and print the resolved configuration
    Check,
}
