// Path: crates/reconciler/src/testing.rs
//! A scripted [`ExternalQueryPort`] for tests and dry runs.

use crate::port::ExternalQueryPort;
use async_trait::async_trait;
use eqwatch_types::error::QueryError;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Mutex;

type Scripted = Result<JsonValue, QueryError>;

/// Answers queries from tables filled in by the test.
///
/// Unscripted key parses fail like an unknown address would; unscripted key
/// assignment lookups answer "no key assigned".
#[derive(Default)]
pub struct ScriptedPort {
    evidence: Mutex<HashMap<String, Scripted>>,
    parses: Mutex<HashMap<(String, String), Scripted>>,
    providers: Mutex<HashMap<(String, String), Scripted>>,
    calls: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedPort {
    pub fn with_parse(self, binary: &str, input: &str, out: JsonValue) -> Self {
        lock(&self.parses).insert((binary.into(), input.into()), Ok(out));
        self
    }

    pub fn with_parse_error(self, binary: &str, input: &str, err: QueryError) -> Self {
        lock(&self.parses).insert((binary.into(), input.into()), Err(err));
        self
    }

    pub fn with_provider(self, chain_id: &str, address: &str, provider: &str) -> Self {
        lock(&self.providers).insert(
            (chain_id.into(), address.into()),
            Ok(json!({ "provider_address": provider })),
        );
        self
    }

    pub fn with_provider_error(self, chain_id: &str, address: &str, err: QueryError) -> Self {
        lock(&self.providers).insert((chain_id.into(), address.into()), Err(err));
        self
    }

    /// Replaces the evidence list served for `node`.
    pub fn set_evidence(&self, node: &str, records: JsonValue) {
        lock(&self.evidence).insert(node.into(), Ok(json!({ "evidence": records })));
    }

    /// Serves `reply` verbatim as the evidence query result for `node`.
    pub fn set_reply(&self, node: &str, reply: JsonValue) {
        lock(&self.evidence).insert(node.into(), Ok(reply));
    }

    /// Makes the evidence query for `node` fail.
    pub fn fail_evidence(&self, node: &str, err: QueryError) {
        lock(&self.evidence).insert(node.into(), Err(err));
    }

    /// Every query made so far, as `kind:arg` strings.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ExternalQueryPort for ScriptedPort {
    async fn query_evidence(&self, node: &str) -> Result<JsonValue, QueryError> {
        self.record(format!("evidence:{node}"));
        lock(&self.evidence)
            .get(node)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "evidence": [] })))
    }

    async fn parse_key(&self, binary: &str, input: &str) -> Result<JsonValue, QueryError> {
        self.record(format!("parse:{binary}:{input}"));
        lock(&self.parses)
            .get(&(binary.to_string(), input.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(QueryError::CommandFailed {
                    command: binary.to_string(),
                    status: "exit status: 1".into(),
                    stderr: format!("unscripted key parse of '{input}'"),
                })
            })
    }

    async fn provider_key(&self, chain_id: &str, address: &str) -> Result<JsonValue, QueryError> {
        self.record(format!("provider:{chain_id}:{address}"));
        lock(&self.providers)
            .get(&(chain_id.to_string(), address.to_string()))
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "provider_address": "" })))
    }
}
