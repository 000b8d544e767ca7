// Path: crates/types/src/config/mod.rs

//! Configuration structures for the watcher process.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Connection details for one monitored chain (or the root chain).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The chain identifier, e.g. `neutron-1`.
    pub chain_id: String,
    /// The CometBFT RPC endpoint of a node on this chain.
    #[serde(rename = "rpc")]
    pub rpc_url: String,
    /// The Cosmos SDK REST endpoint of a node on this chain.
    #[serde(rename = "api")]
    pub api_url: String,
    /// The chain binary used for key parsing (`<binary> keys parse`).
    pub binary: String,
}

/// Top-level configuration of the watcher.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Seconds between two poll cycles.
    pub check_interval_secs: u64,
    /// Path of the persisted chain state collection.
    pub evidence_filename: PathBuf,
    /// The binary used for `q evidence` against every monitored chain.
    pub evidence_binary: String,
    /// Upper bound for a single external command invocation.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Upper bound for a single HTTP request to a validator endpoint.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// `per_page` sent to the RPC `/validators` endpoint.
    #[serde(default = "default_rpc_page_size")]
    pub rpc_page_size: u32,
    /// Move a malformed state file aside and start from empty state instead of failing.
    #[serde(default)]
    pub reset_corrupt_state: bool,
    /// Optional listen address for the `/metrics` endpoint.
    #[serde(default)]
    pub metrics_listen_address: Option<String>,
    /// The root (provider) chain that owns validator identities.
    pub root: ChainConfig,
    /// The monitored chains, keyed by a free-form label.
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
}

fn default_command_timeout_secs() -> u64 {
    30
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_rpc_page_size() -> u32 {
    100
}

/// The largest page the CometBFT `/validators` endpoint serves.
pub const MAX_RPC_PAGE_SIZE: u32 = 100;

impl WatcherConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates a TOML configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: WatcherConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks invariants that `serde` cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                key: key.to_string(),
                reason: reason.to_string(),
            }
        }
        if self.check_interval_secs == 0 {
            return Err(invalid("check_interval_secs", "must be greater than zero"));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs", "must be greater than zero"));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs", "must be greater than zero"));
        }
        if self.rpc_page_size == 0 || self.rpc_page_size > MAX_RPC_PAGE_SIZE {
            return Err(invalid("rpc_page_size", "must be between 1 and 100"));
        }
        if self.evidence_binary.trim().is_empty() {
            return Err(invalid("evidence_binary", "must not be empty"));
        }
        if self.evidence_filename.as_os_str().is_empty() {
            return Err(invalid("evidence_filename", "must not be empty"));
        }
        check_chain("root", &self.root)?;
        let mut seen = std::collections::BTreeSet::new();
        for (label, chain) in &self.chains {
            check_chain(&format!("chains.{label}"), chain)?;
            if !seen.insert(chain.chain_id.as_str()) {
                return Err(invalid(
                    &format!("chains.{label}.chain_id"),
                    "duplicate chain_id",
                ));
            }
        }
        Ok(())
    }

    /// The configured chains that are actually monitored for evidence.
    ///
    /// The root chain never reports evidence against itself, so it is excluded even
    /// when it also appears in `[chains]`.
    pub fn monitored_chains(&self) -> Vec<ChainConfig> {
        self.chains
            .values()
            .filter(|c| c.chain_id != self.root.chain_id)
            .cloned()
            .collect()
    }

    /// A sample configuration, used by `eqwatch config new`.
    pub fn sample() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            "neutron".to_string(),
            ChainConfig {
                chain_id: "neutron-1".into(),
                rpc_url: "https://rpc-kralum.neutron-1.neutron.org:443".into(),
                api_url: "https://rest-kralum.neutron-1.neutron.org".into(),
                binary: "neutrond".into(),
            },
        );
        chains.insert(
            "stride".to_string(),
            ChainConfig {
                chain_id: "stride-1".into(),
                rpc_url: "https://stride-rpc.polkachu.com:443".into(),
                api_url: "https://stride-api.polkachu.com".into(),
                binary: "strided".into(),
            },
        );
        Self {
            check_interval_secs: 60,
            evidence_filename: PathBuf::from("evidence.json"),
            evidence_binary: "gaiad".into(),
            command_timeout_secs: default_command_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            rpc_page_size: default_rpc_page_size(),
            reset_corrupt_state: false,
            metrics_listen_address: None,
            root: ChainConfig {
                chain_id: "cosmoshub-4".into(),
                rpc_url: "https://cosmos-rpc.polkachu.com:443".into(),
                api_url: "https://cosmos-api.polkachu.com".into(),
                binary: "gaiad".into(),
            },
            chains,
        }
    }
}

fn check_chain(key: &str, chain: &ChainConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("chain_id", &chain.chain_id),
        ("rpc", &chain.rpc_url),
        ("api", &chain.api_url),
        ("binary", &chain.binary),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: format!("{key}.{field}"),
                reason: "must not be empty".into(),
            });
        }
    }
    Ok(())
}
