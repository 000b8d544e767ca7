// Path: crates/reconciler/src/port.rs
//! The external query capability: everything the engine learns from chain binaries
//! goes through [`ExternalQueryPort`], so tests can script the answers.

use async_trait::async_trait;
use eqwatch_types::error::QueryError;
use serde_json::Value as JsonValue;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Queries a chain binary can answer.
#[async_trait]
pub trait ExternalQueryPort: Send + Sync {
    /// `q evidence` against `node`; returns the raw JSON document.
    async fn query_evidence(&self, node: &str) -> Result<JsonValue, QueryError>;

    /// `keys parse <input>` with `binary`; returns the raw JSON document.
    ///
    /// For a prefixed address the document carries `bytes`; for raw hex it carries
    /// `formats`, one entry per known prefix.
    async fn parse_key(&self, binary: &str, input: &str) -> Result<JsonValue, QueryError>;

    /// The provider-chain key assigned to a consumer-chain validator, addressed by the
    /// validator's root-format consensus address. Returns the raw JSON document.
    async fn provider_key(&self, chain_id: &str, address: &str)
        -> Result<JsonValue, QueryError>;
}

/// Runs the chain binaries as child processes.
#[derive(Debug, Clone)]
pub struct CommandQueryPort {
    evidence_binary: String,
    root_binary: String,
    root_rpc: String,
    timeout: Duration,
}

impl CommandQueryPort {
    pub fn new(
        evidence_binary: impl Into<String>,
        root_binary: impl Into<String>,
        root_rpc: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            evidence_binary: evidence_binary.into(),
            root_binary: root_binary.into(),
            root_rpc: root_rpc.into(),
            timeout,
        }
    }

    /// Runs `program args..` and decodes stdout as JSON.
    async fn run_json(&self, program: &str, args: &[String]) -> Result<JsonValue, QueryError> {
        tracing::debug!(target: "port", %program, ?args, "running query");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QueryError::Spawn {
                command: program.to_string(),
                reason: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(|e| QueryError::Spawn {
                command: program.to_string(),
                reason: e.to_string(),
            })?,
            // Dropping the future drops the child, which kills it.
            Err(_) => {
                return Err(QueryError::Timeout {
                    command: program.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(QueryError::CommandFailed {
                command: program.to_string(),
                status: output.status.to_string(),
                stderr: snippet(&output.stderr),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|e| QueryError::Decode {
            command: program.to_string(),
            reason: format!("{} (stdout: '{}')", e, snippet(&output.stdout)),
        })
    }
}

#[async_trait]
impl ExternalQueryPort for CommandQueryPort {
    async fn query_evidence(&self, node: &str) -> Result<JsonValue, QueryError> {
        let args = vec![
            "q".to_string(),
            "evidence".to_string(),
            format!("--node={node}"),
            "--output=json".to_string(),
        ];
        self.run_json(&self.evidence_binary, &args).await
    }

    async fn parse_key(&self, binary: &str, input: &str) -> Result<JsonValue, QueryError> {
        let args = vec![
            "keys".to_string(),
            "parse".to_string(),
            input.to_string(),
            "--output=json".to_string(),
        ];
        self.run_json(binary, &args).await
    }

    async fn provider_key(
        &self,
        chain_id: &str,
        address: &str,
    ) -> Result<JsonValue, QueryError> {
        let args = vec![
            "q".to_string(),
            "provider".to_string(),
            "validator-provider-key".to_string(),
            chain_id.to_string(),
            address.to_string(),
            "--output=json".to_string(),
            format!("--node={}", self.root_rpc),
        ];
        self.run_json(&self.root_binary, &args).await
    }
}

fn snippet(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    let s = s.trim();
    let s: String = s.chars().take(160).collect();
    s.replace('\n', "\\n").replace('\r', "\\r").replace('\t', "\\t")
}
