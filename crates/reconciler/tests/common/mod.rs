// Path: crates/reconciler/tests/common/mod.rs
//! An in-process fake of a root chain's RPC `/validators` and staking REST
//! endpoints, with request capture.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: &'static str,
    pub query: HashMap<String, String>,
    pub height_header: Option<String>,
}

pub struct FakeRoot {
    pub rpc: Vec<Value>,
    pub api: Vec<Value>,
    pub rpc_max_per_page: usize,
    /// Overrides the `total` the RPC endpoint reports.
    pub rpc_total: Option<usize>,
    pub api_page_size: usize,
    /// Makes the staking endpoint hand out cursors that cycle through this many pages.
    pub api_cursor_cycle: Option<usize>,
    pub seen: Mutex<Vec<SeenRequest>>,
}

impl FakeRoot {
    /// `n` validators, each present in both endpoint families.
    pub fn with_validators(n: usize) -> Self {
        Self {
            rpc: (0..n).map(rpc_entry).collect(),
            api: (0..n).map(api_entry).collect(),
            rpc_max_per_page: 100,
            rpc_total: None,
            api_page_size: 100,
            api_cursor_cycle: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

pub fn hex_address(i: usize) -> String {
    format!("{:040X}", i + 0xABC0)
}

pub fn pubkey(i: usize) -> String {
    format!("pubkey-{i}=")
}

pub fn moniker(i: usize) -> String {
    format!("validator-{i}")
}

pub fn rpc_entry(i: usize) -> Value {
    json!({
        "address": hex_address(i),
        "pub_key": {"type": "tendermint/PubKeyEd25519", "value": pubkey(i)},
        "voting_power": "1000",
        "proposer_priority": "0"
    })
}

pub fn api_entry(i: usize) -> Value {
    json!({
        "operator_address": format!("cosmosvaloper1op{i}"),
        "consensus_pubkey": {"@type": "/cosmos.crypto.ed25519.PubKey", "key": pubkey(i)},
        "jailed": false,
        "status": "BOND_STATUS_BONDED",
        "tokens": "1000",
        "delegator_shares": "1000.000000000000000000",
        "description": {"moniker": moniker(i), "identity": "", "website": "", "security_contact": "", "details": ""}
    })
}

/// A cursor that only survives the trip if the client escapes it.
pub fn cursor(page: usize) -> String {
    format!("c{page}+/==")
}

fn page_of_cursor(raw: &str) -> Option<usize> {
    raw.strip_prefix('c')?.strip_suffix("+/==")?.parse().ok()
}

fn capture(state: &FakeRoot, path: &'static str, query: &HashMap<String, String>, headers: &HeaderMap) {
    state.seen.lock().unwrap().push(SeenRequest {
        path,
        query: query.clone(),
        height_header: headers
            .get("x-cosmos-block-height")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
}

async fn rpc_validators(
    State(state): State<Arc<FakeRoot>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    capture(&state, "/validators", &query, &headers);
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let per_page: usize = query
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(30)
        .clamp(1, state.rpc_max_per_page);
    let start = (page - 1) * per_page;
    let slice: Vec<Value> = state.rpc.iter().skip(start).take(per_page).cloned().collect();
    Json(json!({
        "jsonrpc": "2.0",
        "id": -1,
        "result": {
            "block_height": query.get("height").cloned().unwrap_or_else(|| "1000".into()),
            "validators": slice,
            "count": slice.len().to_string(),
            "total": state.rpc_total.unwrap_or(state.rpc.len()).to_string()
        }
    }))
}

async fn api_validators(
    State(state): State<Arc<FakeRoot>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    capture(&state, "/cosmos/staking/v1beta1/validators", &query, &headers);
    let page = match query.get("pagination.key") {
        None => 0,
        Some(raw) => page_of_cursor(raw).ok_or(StatusCode::BAD_REQUEST)?,
    };
    let size = state.api_page_size;
    let slice: Vec<Value> = state.api.iter().skip(page * size).take(size).cloned().collect();
    let next_key = if let Some(cycle) = state.api_cursor_cycle {
        Value::String(cursor((page + 1) % cycle))
    } else if (page + 1) * size < state.api.len() {
        Value::String(cursor(page + 1))
    } else {
        Value::Null
    };
    Ok(Json(json!({
        "validators": slice,
        "pagination": {"next_key": next_key, "total": "0"}
    })))
}

/// Serves `root` on an ephemeral port and returns its base URL.
pub async fn serve(root: Arc<FakeRoot>) -> String {
    let app = Router::new()
        .route("/validators", get(rpc_validators))
        .route("/cosmos/staking/v1beta1/validators", get(api_validators))
        .with_state(root);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
