// Path: crates/reconciler/src/fetcher.rs
//! Retrieval of the complete current evidence list of one chain.

use crate::port::ExternalQueryPort;
use eqwatch_types::config::ChainConfig;
use eqwatch_types::error::EvidenceFetchError;
use eqwatch_types::evidence::EvidenceRecord;
use serde_json::Value as JsonValue;
use std::sync::Arc;

#[derive(Clone)]
pub struct EvidenceFetcher {
    port: Arc<dyn ExternalQueryPort>,
}

impl EvidenceFetcher {
    pub fn new(port: Arc<dyn ExternalQueryPort>) -> Self {
        Self { port }
    }

    /// Returns every evidence record the chain currently reports, in reported order.
    ///
    /// A `null` `evidence` field, or a missing one next to `pagination`, is an empty
    /// list. Anything else that is not an array of objects is rejected so a garbled
    /// reply never reads as "no evidence".
    pub async fn fetch(&self, chain: &ChainConfig) -> Result<Vec<EvidenceRecord>, EvidenceFetchError> {
        let reply = self
            .port
            .query_evidence(&chain.rpc_url)
            .await
            .map_err(|source| EvidenceFetchError::Query {
                chain_id: chain.chain_id.clone(),
                source,
            })?;

        let malformed = |reason: String| EvidenceFetchError::Malformed {
            chain_id: chain.chain_id.clone(),
            reason,
        };

        let obj = reply
            .as_object()
            .ok_or_else(|| malformed("reply is not a JSON object".into()))?;
        let items = match obj.get("evidence") {
            // Empty lists are omitted from the reply; the pagination block is still there.
            None if obj.contains_key("pagination") => return Ok(Vec::new()),
            None => {
                return Err(malformed(format!(
                    "reply carries neither 'evidence' nor 'pagination': {reply}"
                )))
            }
            Some(JsonValue::Null) => return Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items,
            Some(other) => return Err(malformed(format!("'evidence' is not an array: {other}"))),
        };

        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                JsonValue::Object(map) => records.push(EvidenceRecord::from(map.clone())),
                other => return Err(malformed(format!("evidence[{i}] is not an object: {other}"))),
            }
        }
        Ok(records)
    }
}
