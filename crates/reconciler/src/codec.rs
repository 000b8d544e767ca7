// Path: crates/reconciler/src/codec.rs
//! Consensus address translation between bech32 prefixes and raw hex.

use crate::port::ExternalQueryPort;
use eqwatch_types::error::ResolutionError;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The field of a parsed prefixed address that holds the raw bytes as hex.
pub const BYTES_FIELD: &str = "bytes";

/// Index into `formats` of the `<prefix>valcons` encoding when parsing raw hex.
///
/// `keys parse <hex>` lists one encoding per address kind in a fixed order
/// (acc, accpub, valoper, valoperpub, valcons, valconspub).
pub const VALCONS_FORMAT_INDEX: usize = 4;

#[derive(Clone)]
pub struct AddressCodec {
    port: Arc<dyn ExternalQueryPort>,
}

impl AddressCodec {
    pub fn new(port: Arc<dyn ExternalQueryPort>) -> Self {
        Self { port }
    }

    /// Parses a prefixed address with `binary` and returns the string at `field`.
    pub async fn parse_key(
        &self,
        binary: &str,
        address: &str,
        field: &str,
    ) -> Result<String, ResolutionError> {
        let parsed = self.port.parse_key(binary, address).await?;
        parsed
            .get(field)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolutionError::MissingField {
                input: address.to_string(),
                field: field.to_string(),
            })
    }

    /// Parses raw hex with `binary` and returns the alternate encoding at `format_index`.
    pub async fn parse_address(
        &self,
        binary: &str,
        hex_address: &str,
        format_index: usize,
    ) -> Result<String, ResolutionError> {
        let parsed = self.port.parse_key(binary, hex_address).await?;
        parsed
            .get("formats")
            .and_then(JsonValue::as_array)
            .and_then(|formats| formats.get(format_index))
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolutionError::MissingFormat {
                input: hex_address.to_string(),
                index: format_index,
            })
    }

    /// Shorthand for [`Self::parse_key`] with the `bytes` field.
    pub async fn to_hex(&self, binary: &str, address: &str) -> Result<String, ResolutionError> {
        self.parse_key(binary, address, BYTES_FIELD).await
    }
}
