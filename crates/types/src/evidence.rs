// Path: crates/types/src/evidence.rs
//! Evidence records as reported by a chain, their enriched form, and the per-chain
//! state that is persisted between poll cycles.

use crate::config::ChainConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The field every evidence record is expected to carry.
pub const CONSENSUS_ADDRESS_FIELD: &str = "consensus_address";

/// A raw evidence record, kept exactly as the evidence query returned it.
///
/// Records carry no stable identifier; two records are the same evidence iff all of
/// their fields compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EvidenceRecord(pub Map<String, Value>);

impl EvidenceRecord {
    /// The record's consensus address, if present and a string.
    pub fn consensus_address(&self) -> Option<&str> {
        self.0.get(CONSENSUS_ADDRESS_FIELD).and_then(Value::as_str)
    }

    /// A canonical rendering used as a hash/ordering key for set operations.
    ///
    /// `serde_json::Map` keeps keys sorted, so equal records render identically.
    pub fn canonical_key(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<Map<String, Value>> for EvidenceRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// An evidence record with the identity it was resolved to.
///
/// The raw fields are flattened so the persisted form reads as the original record
/// with three extra keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedEvidenceRecord {
    /// The raw record, unmodified.
    #[serde(flatten)]
    pub record: EvidenceRecord,
    /// The root-chain consensus address the identity was looked up by.
    #[serde(default)]
    pub provider_address: String,
    /// The validator's consensus public key (base64), empty if unresolved.
    #[serde(default)]
    pub pubkey: String,
    /// The validator's moniker, empty if unresolved.
    #[serde(default)]
    pub moniker: String,
}

impl EnrichedEvidenceRecord {
    /// Wraps a record with an empty identity.
    pub fn unresolved(record: EvidenceRecord) -> Self {
        Self {
            record,
            provider_address: String::new(),
            pubkey: String::new(),
            moniker: String::new(),
        }
    }
}

/// The persisted state of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// The chain identifier.
    pub chain_id: String,
    /// The REST endpoint at the time of the last write.
    #[serde(default)]
    pub api: String,
    /// The RPC endpoint at the time of the last write.
    #[serde(default)]
    pub rpc: String,
    /// The chain binary at the time of the last write.
    #[serde(default)]
    pub binary: String,
    /// The raw evidence as last reconciled.
    #[serde(default)]
    pub evidence: Vec<EvidenceRecord>,
    /// `evidence` with identities attached, same length and order.
    #[serde(default, alias = "evidence_id")]
    pub evidence_resolved: Vec<EnrichedEvidenceRecord>,
}

impl ChainState {
    /// An empty state for a configured chain.
    pub fn skeleton(chain: &ChainConfig) -> Self {
        Self {
            chain_id: chain.chain_id.clone(),
            api: chain.api_url.clone(),
            rpc: chain.rpc_url.clone(),
            binary: chain.binary.clone(),
            evidence: Vec::new(),
            evidence_resolved: Vec::new(),
        }
    }

    /// Refreshes the connection fields from the current configuration.
    pub fn refresh_from(&mut self, chain: &ChainConfig) {
        self.api = chain.api_url.clone();
        self.rpc = chain.rpc_url.clone();
        self.binary = chain.binary.clone();
    }
}

/// The newly observed evidence of one chain, handed to the delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceUpdate {
    /// The chain the evidence was recorded on.
    pub chain_id: String,
    /// The new records, enriched.
    pub updates: Vec<EnrichedEvidenceRecord>,
}

/// Counts records by canonical key.
pub fn multiset(records: &[EvidenceRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.canonical_key()).or_insert(0) += 1;
    }
    counts
}

/// Order-insensitive, count-preserving equality of two record sequences.
pub fn same_multiset(a: &[EvidenceRecord], b: &[EvidenceRecord]) -> bool {
    a.len() == b.len() && multiset(a) == multiset(b)
}
