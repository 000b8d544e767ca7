// Path: crates/reconciler/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Evidence Reconciliation
//!
//! Detects new equivocation evidence on consumer chains and resolves the offending
//! validator's identity on the root chain.
//!
//! Each poll cycle, for every monitored chain, the [`engine::ReconciliationEngine`]
//! fetches the chain's full evidence list, diffs it against the persisted snapshot,
//! resolves identities through the [`resolver::IdentityResolver`], commits the new
//! snapshot atomically via the [`store::StateStore`], and returns the new records.
//!
//! Everything learned from chain binaries flows through the injected
//! [`port::ExternalQueryPort`]; validator directories are read over HTTP.

pub mod assignment;
pub mod codec;
pub mod directory;
pub mod engine;
pub mod fetcher;
pub mod port;
pub mod resolver;
pub mod service;
pub mod store;
pub mod testing;

pub use engine::{EvidenceDiff, PollReport, ReconciliationEngine};
pub use port::{CommandQueryPort, ExternalQueryPort};
pub use resolver::{IdentityResolver, ResolvedIdentity};
pub use service::{LogSink, PollService, UpdateSink};
pub use store::StateStore;
