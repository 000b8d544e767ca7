// Path: crates/reconciler/src/resolver.rs
//! Resolution of a consumer-chain consensus address into a root-chain validator
//! identity.
//!
//! The chain of lookups is:
//!
//! 1. consumer bech32 address → raw hex, using the consumer chain's binary;
//! 2. raw hex → root-chain `valcons` encoding, using the root binary;
//! 3. root-format address → assigned provider address (or itself if unassigned);
//! 4. provider address → raw hex, using the root binary;
//! 5. hex → consensus pubkey (RPC validators) → moniker (staking validators).
//!
//! The consumer chain's own encoding is never the displayed identity.

use crate::assignment::KeyAssignmentResolver;
use crate::codec::{AddressCodec, VALCONS_FORMAT_INDEX};
use crate::directory::{ValidatorDirectory, ValidatorDirectoryCollector};
use eqwatch_types::config::ChainConfig;
use eqwatch_types::error::{DirectoryFetchError, ResolutionError};
use eqwatch_types::evidence::{EnrichedEvidenceRecord, EvidenceRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// What is known about the validator behind one consensus address.
///
/// Fields stay empty past the step where resolution stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub consumer_hex: String,
    pub root_address: String,
    pub provider_address: String,
    pub provider_hex: String,
    pub pubkey: String,
    pub moniker: String,
}

/// The outcome of resolving one address: a possibly partial identity and the error
/// that stopped it, if any. A directory miss is not an error.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub identity: ResolvedIdentity,
    pub error: Option<ResolutionError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.identity.moniker.is_empty()
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    codec: AddressCodec,
    assignment: KeyAssignmentResolver,
    collector: ValidatorDirectoryCollector,
    root: ChainConfig,
    height: Option<u64>,
}

impl IdentityResolver {
    pub fn new(
        codec: AddressCodec,
        assignment: KeyAssignmentResolver,
        collector: ValidatorDirectoryCollector,
        root: ChainConfig,
    ) -> Self {
        Self {
            codec,
            assignment,
            collector,
            root,
            height: None,
        }
    }

    /// Resolves against the root validator set at `height` instead of the latest block.
    pub fn at_height(mut self, height: Option<u64>) -> Self {
        self.height = height.filter(|h| *h > 0);
        self
    }

    pub fn root(&self) -> &ChainConfig {
        &self.root
    }

    /// Starts a resolution session. The root directory is collected at most once per
    /// session and results are memoized per chain and address.
    pub fn session(&self) -> ResolutionSession {
        ResolutionSession {
            resolver: self.clone(),
            directory: None,
            memo: HashMap::new(),
        }
    }
}

pub struct ResolutionSession {
    resolver: IdentityResolver,
    directory: Option<Result<Arc<ValidatorDirectory>, DirectoryFetchError>>,
    memo: HashMap<(String, String), Resolution>,
}

impl ResolutionSession {
    /// Resolves `consensus_address` as reported on `chain`.
    pub async fn resolve(&mut self, chain: &ChainConfig, consensus_address: &str) -> Resolution {
        let key = (chain.chain_id.clone(), consensus_address.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let mut identity = ResolvedIdentity::default();
        let error = self
            .resolve_into(chain, consensus_address, &mut identity)
            .await
            .err();
        let resolution = Resolution { identity, error };
        self.memo.insert(key, resolution.clone());
        resolution
    }

    /// Attaches the resolved identity to `record`. The raw record is copied untouched.
    pub async fn enrich(
        &mut self,
        chain: &ChainConfig,
        record: &EvidenceRecord,
    ) -> (EnrichedEvidenceRecord, Option<ResolutionError>) {
        let Some(address) = record.consensus_address() else {
            return (
                EnrichedEvidenceRecord::unresolved(record.clone()),
                Some(ResolutionError::MissingConsensusAddress),
            );
        };
        let resolution = self.resolve(chain, address).await;
        let enriched = EnrichedEvidenceRecord {
            record: record.clone(),
            provider_address: resolution.identity.provider_address,
            pubkey: resolution.identity.pubkey,
            moniker: resolution.identity.moniker,
        };
        (enriched, resolution.error)
    }

    async fn resolve_into(
        &mut self,
        chain: &ChainConfig,
        consensus_address: &str,
        out: &mut ResolvedIdentity,
    ) -> Result<(), ResolutionError> {
        let r = &self.resolver;
        let root_binary = r.root.binary.clone();

        out.consumer_hex = r.codec.to_hex(&chain.binary, consensus_address).await?;
        out.root_address = r
            .codec
            .parse_address(&root_binary, &out.consumer_hex, VALCONS_FORMAT_INDEX)
            .await?;
        out.provider_address = r
            .assignment
            .resolve(&chain.chain_id, &out.root_address)
            .await?;
        out.provider_hex = r.codec.to_hex(&root_binary, &out.provider_address).await?;

        let directory = self.directory().await?;
        if let Some(pubkey) = directory.pubkey_for_address(&out.provider_hex) {
            out.pubkey = pubkey.to_string();
            if let Some(moniker) = directory.moniker_for_pubkey(pubkey) {
                out.moniker = moniker.to_string();
            }
        }
        if out.moniker.is_empty() {
            tracing::debug!(
                target: "resolver",
                chain_id = %chain.chain_id,
                provider_hex = %out.provider_hex,
                found_pubkey = !out.pubkey.is_empty(),
                "validator not found in root directory"
            );
        }
        Ok(())
    }

    async fn directory(&mut self) -> Result<Arc<ValidatorDirectory>, ResolutionError> {
        if self.directory.is_none() {
            let r = &self.resolver;
            let fetched = r
                .collector
                .collect_directory(&r.root.rpc_url, &r.root.api_url, r.height)
                .await
                .map(Arc::new);
            match &fetched {
                Ok(dir) => tracing::debug!(
                    target: "resolver",
                    rpc_entries = dir.rpc_len(),
                    api_entries = dir.api_len(),
                    "root validator directory collected"
                ),
                Err(e) => tracing::warn!(target: "resolver", error = %e, "root validator directory unavailable"),
            }
            self.directory = Some(fetched);
        }
        match &self.directory {
            Some(Ok(dir)) => Ok(dir.clone()),
            Some(Err(e)) => Err(ResolutionError::Directory(e.clone())),
            None => Err(ResolutionError::Directory(DirectoryFetchError::Client(
                "directory not collected".into(),
            ))),
        }
    }
}
