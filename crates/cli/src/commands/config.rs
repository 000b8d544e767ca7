// Path: crates/cli/src/commands/config.rs

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use eqwatch_types::config::WatcherConfig;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
pub struct ConfigCmdArgs {
    #[clap(subcommand)]
    pub command: ConfigSubCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubCommands {
    /// Write a sample watcher configuration.
    New {
        #[clap(long, default_value = "eqwatch.toml")]
        out: PathBuf,
        /// Overwrite an existing file.
        #[clap(long)]
        force: bool,
    },
}

pub fn run(args: ConfigCmdArgs) -> Result<()> {
    match args.command {
        ConfigSubCommands::New { out, force } => {
            write_sample(&out, force)?;
            println!("Generated {}", out.display());
            println!("Edit [root] and [chains.*] to point at your nodes.");
        }
    }
    Ok(())
}

fn write_sample(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(out, toml::to_string_pretty(&WatcherConfig::sample())?)?;
    Ok(())
}
