// Path: crates/reconciler/src/directory.rs
//! Paginated collection of the root chain's validator set from the CometBFT RPC
//! `/validators` endpoint and the staking REST endpoint.

use eqwatch_types::error::DirectoryFetchError;
use eqwatch_types::validator::{
    ApiValidatorsPage, RpcValidatorsResponse, ValidatorApiEntry, ValidatorRpcEntry,
};
use reqwest::{
    header::{HeaderValue, RETRY_AFTER},
    Client, RequestBuilder,
};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::sleep;

/// Header the Cosmos SDK REST gateway reads to serve historical state.
pub const BLOCK_HEIGHT_HEADER: &str = "x-cosmos-block-height";

const STAKING_VALIDATORS_PATH: &str = "/cosmos/staking/v1beta1/validators";
const HTTP_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct ValidatorDirectoryCollector {
    client: Client,
    rpc_page_size: u32,
}

impl ValidatorDirectoryCollector {
    pub fn new(timeout: Duration, rpc_page_size: u32) -> Result<Self, DirectoryFetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryFetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            rpc_page_size,
        })
    }

    /// Collects every entry of `{rpc_url}/validators`, page by page.
    ///
    /// `height` of `None` or `Some(0)` means latest; any other height is sent on every
    /// page so the result is a consistent snapshot.
    pub async fn collect_rpc(
        &self,
        rpc_url: &str,
        height: Option<u64>,
    ) -> Result<Vec<ValidatorRpcEntry>, DirectoryFetchError> {
        let url = format!("{}/validators", rpc_url.trim_end_matches('/'));
        let height = height.filter(|h| *h > 0);
        let mut page: u64 = 1;
        let mut collected: Vec<ValidatorRpcEntry> = Vec::new();

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", self.rpc_page_size.to_string()),
            ];
            if let Some(h) = height {
                query.push(("height", h.to_string()));
            }
            let resp: RpcValidatorsResponse = self
                .get_json(&url, |client| client.get(&url).query(&query))
                .await?;

            let total = parse_count(&url, "total", &resp.result.total)?;
            let count = parse_count(&url, "count", &resp.result.count)?;
            if count == 0 || resp.result.validators.is_empty() {
                if (collected.len() as u64) < total {
                    return Err(DirectoryFetchError::StalledPagination {
                        url,
                        page,
                        collected: collected.len() as u64,
                        total,
                    });
                }
                break;
            }
            collected.extend(resp.result.validators);
            if collected.len() as u64 >= total {
                break;
            }
            page += 1;
        }

        tracing::debug!(target: "directory", %url, entries = collected.len(), pages = page, "collected rpc validators");
        Ok(collected)
    }

    /// Collects every entry of the staking validators endpoint, following
    /// `pagination.next_key` until it comes back empty. A cursor seen before on this
    /// walk is a decode error.
    pub async fn collect_api(
        &self,
        api_url: &str,
        height: Option<u64>,
    ) -> Result<Vec<ValidatorApiEntry>, DirectoryFetchError> {
        let url = format!("{}{}", api_url.trim_end_matches('/'), STAKING_VALIDATORS_PATH);
        let height = height.filter(|h| *h > 0);
        let mut next_key: Option<String> = None;
        let mut collected: Vec<ValidatorApiEntry> = Vec::new();
        let mut pages = 0usize;
        let mut cursors: HashSet<String> = HashSet::new();

        loop {
            let page: ApiValidatorsPage = self
                .get_json(&url, |client| {
                    let mut req = client.get(&url);
                    // The query encoder escapes the base64 cursor.
                    if let Some(key) = &next_key {
                        req = req.query(&[("pagination.key", key.as_str())]);
                    }
                    if let Some(h) = height {
                        req = req.header(BLOCK_HEIGHT_HEADER, h.to_string());
                    }
                    req
                })
                .await?;
            pages += 1;
            collected.extend(page.validators);

            match page.pagination.next_key.filter(|k| !k.is_empty()) {
                Some(key) => {
                    if !cursors.insert(key.clone()) {
                        return Err(DirectoryFetchError::Decode {
                            url,
                            reason: format!("pagination cursor repeated after page {pages}"),
                        });
                    }
                    next_key = Some(key);
                }
                None => break,
            }
        }

        tracing::debug!(target: "directory", %url, entries = collected.len(), pages, "collected api validators");
        Ok(collected)
    }

    /// Collects both endpoint families at the same height.
    pub async fn collect_directory(
        &self,
        rpc_url: &str,
        api_url: &str,
        height: Option<u64>,
    ) -> Result<ValidatorDirectory, DirectoryFetchError> {
        let rpc = self.collect_rpc(rpc_url, height).await?;
        let api = self.collect_api(api_url, height).await?;
        Ok(ValidatorDirectory::new(rpc, api))
    }

    /// Sends the request built by `build`, retrying 429/5xx with backoff, and decodes
    /// the body as `T`.
    async fn get_json<T, F>(&self, url: &str, build: F) -> Result<T, DirectoryFetchError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0usize;
        let body = loop {
            let resp = build(&self.client)
                .send()
                .await
                .map_err(|e| DirectoryFetchError::Http {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            let status = resp.status();
            let retry_after = resp.headers().get(RETRY_AFTER).cloned();
            let body = resp.bytes().await.map_err(|e| DirectoryFetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

            if (status.as_u16() == 429 || status.is_server_error()) && attempt < HTTP_RETRIES {
                let delay = retry_delay(attempt, retry_after.as_ref());
                tracing::debug!(
                    target: "directory",
                    "HTTP {} from '{}'; backoff {:?}; body='{}'",
                    status.as_u16(),
                    url,
                    delay,
                    ascii_snippet(&body)
                );
                sleep(delay).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                return Err(DirectoryFetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body: ascii_snippet(&body),
                });
            }
            break body;
        };

        serde_json::from_slice(&body).map_err(|e| DirectoryFetchError::Decode {
            url: url.to_string(),
            reason: format!("{} (body: '{}')", e, ascii_snippet(&body)),
        })
    }
}

/// The root validator set, indexed for address → pubkey → moniker lookups.
#[derive(Debug, Clone, Default)]
pub struct ValidatorDirectory {
    rpc: Vec<ValidatorRpcEntry>,
    api: Vec<ValidatorApiEntry>,
    by_address: HashMap<String, usize>,
    by_pubkey: HashMap<String, usize>,
}

/// A validator as seen by both endpoint families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry<'a> {
    pub rpc: &'a ValidatorRpcEntry,
    pub api: Option<&'a ValidatorApiEntry>,
}

impl ValidatorDirectory {
    pub fn new(rpc: Vec<ValidatorRpcEntry>, api: Vec<ValidatorApiEntry>) -> Self {
        let mut by_address = HashMap::with_capacity(rpc.len());
        for (i, v) in rpc.iter().enumerate() {
            by_address.entry(v.address.to_ascii_uppercase()).or_insert(i);
        }
        let mut by_pubkey = HashMap::with_capacity(api.len());
        for (i, v) in api.iter().enumerate() {
            if !v.consensus_pubkey.key.is_empty() {
                by_pubkey.entry(v.consensus_pubkey.key.clone()).or_insert(i);
            }
        }
        Self {
            rpc,
            api,
            by_address,
            by_pubkey,
        }
    }

    /// The consensus public key of the validator with hex consensus address `address`.
    pub fn pubkey_for_address(&self, address: &str) -> Option<&str> {
        self.by_address
            .get(&address.to_ascii_uppercase())
            .and_then(|i| self.rpc.get(*i))
            .map(|v| v.pub_key.value.as_str())
    }

    /// The moniker of the validator whose consensus public key is `pubkey`.
    pub fn moniker_for_pubkey(&self, pubkey: &str) -> Option<&str> {
        self.by_pubkey
            .get(pubkey)
            .and_then(|i| self.api.get(*i))
            .map(ValidatorApiEntry::moniker)
    }

    /// Both views of the validator with hex consensus address `address`, merged by
    /// public key.
    pub fn entry(&self, address: &str) -> Option<DirectoryEntry<'_>> {
        let rpc = self
            .by_address
            .get(&address.to_ascii_uppercase())
            .and_then(|i| self.rpc.get(*i))?;
        let api = self
            .by_pubkey
            .get(&rpc.pub_key.value)
            .and_then(|i| self.api.get(*i));
        Some(DirectoryEntry { rpc, api })
    }

    pub fn rpc_len(&self) -> usize {
        self.rpc.len()
    }

    pub fn api_len(&self) -> usize {
        self.api.len()
    }
}

fn parse_count(url: &str, field: &str, raw: &str) -> Result<u64, DirectoryFetchError> {
    raw.trim().parse::<u64>().map_err(|e| DirectoryFetchError::Decode {
        url: url.to_string(),
        reason: format!("invalid {field} '{raw}': {e}"),
    })
}

fn retry_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(secs) = retry_after
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
    {
        return Duration::from_secs(secs.min(5));
    }
    let ms = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt).min(2_000);
    Duration::from_millis(ms)
}

fn ascii_snippet(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    let s: String = s.trim().chars().take(160).collect();
    s.replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
