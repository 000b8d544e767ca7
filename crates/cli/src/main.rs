// Path: crates/cli/src/main.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Equivocation Watch CLI
//!
//! Polls consumer chains for double-sign evidence and reports each new record
//! together with the root-chain validator that signed it.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use eqwatch_telemetry::init::{init_tracing, LogFormat};

mod commands;
mod util;

use commands::*;

#[derive(Parser, Debug)]
#[clap(
    name = "eqwatch",
    version,
    about = "Watches ICS consumer chains for double-sign evidence.",
    long_about = "Reconciles the evidence reported by each consumer chain against a local state file and resolves every offending consensus address to its validator on the root chain."
)]
struct Cli {
    /// Log output format.
    #[clap(long, value_enum, global = true, default_value = "json")]
    log_format: LogFormatArg,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll every configured chain until interrupted.
    Run(run::RunArgs),

    /// Run a single poll cycle and print what was found.
    Check(check::CheckArgs),

    /// Resolve one consensus address to its root-chain validator.
    Resolve(resolve::ResolveArgs),

    /// Generate configuration files.
    Config(config::ConfigCmdArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format.into())?;

    match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Check(args) => check::run(args).await,
        Commands::Resolve(args) => resolve::run(args).await,
        Commands::Config(args) => config::run(args),
    }
}
