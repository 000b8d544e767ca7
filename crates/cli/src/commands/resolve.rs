// Path: crates/cli/src/commands/resolve.rs

use crate::util;
use anyhow::{anyhow, Result};
use clap::Parser;
use eqwatch_types::config::{ChainConfig, WatcherConfig};
use eqwatch_types::error::ErrorCode;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Path to the watcher configuration file.
    #[clap(long)]
    pub config: PathBuf,
    /// The chain the address was reported on.
    #[clap(long)]
    pub chain: String,
    /// The consensus address as it appears in the evidence.
    #[clap(long)]
    pub address: String,
    /// Resolve against the root validator set at this height instead of the latest.
    #[clap(long)]
    pub height: Option<u64>,
}

fn find_chain<'a>(cfg: &'a WatcherConfig, chain_id: &str) -> Option<&'a ChainConfig> {
    if cfg.root.chain_id == chain_id {
        return Some(&cfg.root);
    }
    cfg.chains.values().find(|c| c.chain_id == chain_id)
}

pub async fn run(args: ResolveArgs) -> Result<()> {
    let cfg = util::load_config(&args.config)?;
    let chain = find_chain(&cfg, &args.chain)
        .ok_or_else(|| anyhow!("Chain '{}' is not in the configuration", args.chain))?;

    let resolver = util::build_resolver(&cfg, util::build_port(&cfg))?.at_height(args.height);
    let resolution = resolver.session().resolve(chain, &args.address).await;

    let out = json!({
        "chain_id": chain.chain_id,
        "consensus_address": args.address,
        "identity": resolution.identity,
        "error": resolution.error.as_ref().map(|e| json!({
            "code": e.code(),
            "message": e.to_string(),
        })),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    match resolution.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
