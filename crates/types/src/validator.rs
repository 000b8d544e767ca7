// Path: crates/types/src/validator.rs
//! Validator entries as served by the CometBFT RPC `/validators` endpoint and the
//! Cosmos SDK staking REST endpoint, plus the page envelopes that carry them.

use serde::{Deserialize, Serialize};

/// A public key as rendered by CometBFT RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RpcPubKey {
    /// Amino type name, e.g. `tendermint/PubKeyEd25519`.
    #[serde(rename = "type", default)]
    pub key_type: String,
    /// Base64 key bytes.
    pub value: String,
}

/// One entry of the RPC `/validators` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRpcEntry {
    /// Upper-case hex consensus address.
    pub address: String,
    /// The consensus public key.
    pub pub_key: RpcPubKey,
    /// Voting power, as a decimal string.
    #[serde(default)]
    pub voting_power: String,
    /// Proposer priority, as a decimal string.
    #[serde(default)]
    pub proposer_priority: String,
}

/// The `result` object of an RPC `/validators` page.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcValidatorsPage {
    /// Height the page was served at.
    #[serde(default)]
    pub block_height: String,
    /// Entries on this page.
    #[serde(default)]
    pub validators: Vec<ValidatorRpcEntry>,
    /// Number of entries on this page, as a decimal string.
    pub count: String,
    /// Total number of entries across all pages, as a decimal string.
    pub total: String,
}

/// The JSON-RPC envelope around [`RpcValidatorsPage`].
#[derive(Debug, Clone, Deserialize)]
pub struct RpcValidatorsResponse {
    /// The page.
    pub result: RpcValidatorsPage,
}

/// A public key as rendered by the staking REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiPubKey {
    /// Protobuf type URL.
    #[serde(rename = "@type", default)]
    pub type_url: String,
    /// Base64 key bytes.
    #[serde(default)]
    pub key: String,
}

/// Descriptive staking metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidatorDescription {
    /// Display name.
    #[serde(default)]
    pub moniker: String,
    /// Keybase-style identity.
    #[serde(default)]
    pub identity: String,
    /// Website URL.
    #[serde(default)]
    pub website: String,
    /// Security contact.
    #[serde(default)]
    pub security_contact: String,
    /// Free-form details.
    #[serde(default)]
    pub details: String,
}

/// One entry of the staking `/cosmos/staking/v1beta1/validators` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorApiEntry {
    /// Bech32 operator address.
    #[serde(default)]
    pub operator_address: String,
    /// The consensus public key.
    #[serde(default)]
    pub consensus_pubkey: ApiPubKey,
    /// Whether the validator is jailed.
    #[serde(default)]
    pub jailed: bool,
    /// Bonding status, e.g. `BOND_STATUS_BONDED`.
    #[serde(default)]
    pub status: String,
    /// Bonded tokens, as a decimal string.
    #[serde(default)]
    pub tokens: String,
    /// Delegator shares, as a decimal string.
    #[serde(default)]
    pub delegator_shares: String,
    /// Descriptive metadata.
    #[serde(default)]
    pub description: ValidatorDescription,
}

impl ValidatorApiEntry {
    /// The validator's display name.
    pub fn moniker(&self) -> &str {
        &self.description.moniker
    }
}

/// Cursor pagination block of a Cosmos SDK REST response.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageResponse {
    /// Opaque cursor for the next page; absent or empty on the last page.
    #[serde(default)]
    pub next_key: Option<String>,
    /// Total count, only populated when requested.
    #[serde(default)]
    pub total: Option<String>,
}

/// A page of the staking validators endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiValidatorsPage {
    /// Entries on this page.
    #[serde(default)]
    pub validators: Vec<ValidatorApiEntry>,
    /// The pagination cursor.
    #[serde(default)]
    pub pagination: PageResponse,
}
