// Path: crates/types/src/error/mod.rs
//! Core error types for the equivocation watcher.
//!
//! The taxonomy follows the blast radius of each failure:
//! configuration errors halt startup, evidence fetch and persistence errors abort a
//! single chain for one cycle, and directory or resolution errors only leave a
//! record's identity unresolved.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised while loading or validating the watcher configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {reason}")]
    Read {
        /// The path that was read.
        path: String,
        /// The underlying I/O failure.
        reason: String,
    },
    /// The configuration could not be parsed, e.g. a required key is missing.
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// A value parsed but is not acceptable.
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ_FAILED",
            Self::Parse(_) => "CONFIG_PARSE_FAILED",
            Self::Invalid { .. } => "CONFIG_INVALID",
        }
    }
}

/// Errors raised by an external query capability (a chain binary invocation).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The command could not be started.
    #[error("Failed to spawn '{command}': {reason}")]
    Spawn {
        /// The program that failed to start.
        command: String,
        /// The underlying failure.
        reason: String,
    },
    /// The command did not finish within its time budget.
    #[error("'{command}' timed out after {secs}s")]
    Timeout {
        /// The program that timed out.
        command: String,
        /// The budget in seconds.
        secs: u64,
    },
    /// The command exited unsuccessfully.
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        /// The program that failed.
        command: String,
        /// The rendered exit status.
        status: String,
        /// A trimmed snippet of stderr.
        stderr: String,
    },
    /// The command's output was not the expected JSON.
    #[error("Failed to decode output of '{command}': {reason}")]
    Decode {
        /// The program whose output was malformed.
        command: String,
        /// The decode failure.
        reason: String,
    },
}

impl ErrorCode for QueryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "QUERY_SPAWN_FAILED",
            Self::Timeout { .. } => "QUERY_TIMEOUT",
            Self::CommandFailed { .. } => "QUERY_COMMAND_FAILED",
            Self::Decode { .. } => "QUERY_DECODE_FAILED",
        }
    }
}

/// Errors raised while fetching the current evidence list of a chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceFetchError {
    /// The evidence query capability failed.
    #[error("Evidence query for '{chain_id}' failed: {source}")]
    Query {
        /// The chain being queried.
        chain_id: String,
        /// The underlying query failure.
        #[source]
        source: QueryError,
    },
    /// The query succeeded but the payload does not have the expected shape.
    #[error("Malformed evidence payload for '{chain_id}': {reason}")]
    Malformed {
        /// The chain being queried.
        chain_id: String,
        /// What was wrong with the payload.
        reason: String,
    },
}

impl ErrorCode for EvidenceFetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Query { .. } => "EVIDENCE_QUERY_FAILED",
            Self::Malformed { .. } => "EVIDENCE_MALFORMED",
        }
    }
}

/// Errors raised while collecting a validator directory over HTTP.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryFetchError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    /// The request failed at the transport level (connect, timeout, body read).
    #[error("HTTP request to '{url}' failed: {reason}")]
    Http {
        /// The requested URL.
        url: String,
        /// The transport failure.
        reason: String,
    },
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from '{url}': {body}")]
    Status {
        /// The requested URL.
        url: String,
        /// The status code.
        status: u16,
        /// A trimmed snippet of the response body.
        body: String,
    },
    /// The response body was not the expected JSON.
    #[error("Malformed response from '{url}': {reason}")]
    Decode {
        /// The requested URL.
        url: String,
        /// The decode failure.
        reason: String,
    },
    /// A page came back empty before the reported total was reached.
    #[error("Pagination stalled at page {page} of '{url}' after {collected}/{total} entries")]
    StalledPagination {
        /// The paginated endpoint.
        url: String,
        /// The page that returned nothing.
        page: u64,
        /// Entries collected so far.
        collected: u64,
        /// The total reported by the endpoint.
        total: u64,
    },
}

impl ErrorCode for DirectoryFetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Client(_) => "DIRECTORY_CLIENT_FAILED",
            Self::Http { .. } => "DIRECTORY_HTTP_FAILED",
            Self::Status { .. } => "DIRECTORY_BAD_STATUS",
            Self::Decode { .. } => "DIRECTORY_DECODE_FAILED",
            Self::StalledPagination { .. } => "DIRECTORY_STALLED_PAGINATION",
        }
    }
}

/// Errors raised while resolving a consensus address into a validator identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// A key-parse or key-assignment query failed.
    #[error("Resolution query failed: {0}")]
    Query(#[from] QueryError),
    /// The parsed key payload lacks the requested field.
    #[error("Key payload for '{input}' has no '{field}' field")]
    MissingField {
        /// The address that was parsed.
        input: String,
        /// The requested field.
        field: String,
    },
    /// The parsed key payload lacks the requested alternate format.
    #[error("Key payload for '{input}' has no format at index {index}")]
    MissingFormat {
        /// The hex address that was parsed.
        input: String,
        /// The requested index into `formats`.
        index: usize,
    },
    /// The evidence record carries no usable `consensus_address`.
    #[error("Evidence record has no consensus_address")]
    MissingConsensusAddress,
    /// The root validator directory could not be collected.
    #[error("Validator directory unavailable: {0}")]
    Directory(#[from] DirectoryFetchError),
}

impl ErrorCode for ResolutionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Query(_) => "RESOLUTION_QUERY_FAILED",
            Self::MissingField { .. } => "RESOLUTION_MISSING_FIELD",
            Self::MissingFormat { .. } => "RESOLUTION_MISSING_FORMAT",
            Self::MissingConsensusAddress => "RESOLUTION_NO_CONSENSUS_ADDRESS",
            Self::Directory(_) => "RESOLUTION_DIRECTORY_UNAVAILABLE",
        }
    }
}

/// Errors raised by the persisted state store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The state file exists but could not be read.
    #[error("Failed to read state file '{path}': {reason}")]
    Read {
        /// The state file path.
        path: String,
        /// The underlying I/O failure.
        reason: String,
    },
    /// The temporary file could not be written or renamed into place.
    #[error("Failed to write state file '{path}': {reason}")]
    Write {
        /// The state file path.
        path: String,
        /// The underlying I/O failure.
        reason: String,
    },
    /// The state collection could not be serialized.
    #[error("Failed to serialize state: {0}")]
    Serialize(String),
    /// The state file is not a valid chain state collection.
    #[error("State file '{path}' is corrupt: {reason}")]
    Corrupt {
        /// The state file path.
        path: String,
        /// The parse failure.
        reason: String,
    },
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "PERSIST_READ_FAILED",
            Self::Write { .. } => "PERSIST_WRITE_FAILED",
            Self::Serialize(_) => "PERSIST_SERIALIZE_FAILED",
            Self::Corrupt { .. } => "PERSIST_CORRUPT",
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialize(e.to_string())
    }
}

/// Chain-level reconciliation failures. Either aborts only the affected chain's cycle.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The chain's evidence could not be fetched.
    #[error(transparent)]
    Fetch(#[from] EvidenceFetchError),
    /// The updated state could not be committed.
    #[error(transparent)]
    Persist(#[from] PersistenceError),
}

impl ErrorCode for ReconcileError {
    fn code(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.code(),
            Self::Persist(e) => e.code(),
        }
    }
}
