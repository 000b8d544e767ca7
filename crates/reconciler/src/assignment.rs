// Path: crates/reconciler/src/assignment.rs
//! Consumer-chain key assignment lookups against the root chain.

use crate::port::ExternalQueryPort;
use eqwatch_types::error::ResolutionError;
use serde_json::Value as JsonValue;
use std::sync::Arc;

#[derive(Clone)]
pub struct KeyAssignmentResolver {
    port: Arc<dyn ExternalQueryPort>,
}

impl KeyAssignmentResolver {
    pub fn new(port: Arc<dyn ExternalQueryPort>) -> Self {
        Self { port }
    }

    /// Returns the provider consensus address that signs for `root_format_address` on
    /// `chain_id`.
    ///
    /// `root_format_address` must already be in the root chain's encoding. When no key
    /// is assigned the validator signs with its root key, so the input is returned.
    pub async fn resolve(
        &self,
        chain_id: &str,
        root_format_address: &str,
    ) -> Result<String, ResolutionError> {
        let reply = self.port.provider_key(chain_id, root_format_address).await?;
        let assigned = reply
            .get("provider_address")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        if assigned.is_empty() {
            tracing::debug!(
                target: "resolver",
                chain_id,
                address = root_format_address,
                "no assigned key, using root identity"
            );
            Ok(root_format_address.to_string())
        } else {
            Ok(assigned.to_string())
        }
    }
}
