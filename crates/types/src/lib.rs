// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Equivocation Watch Types
//!
//! This crate is the foundational library for the equivocation watcher, containing
//! the persisted data model, the validator directory shapes returned by chain
//! endpoints, configuration objects, and the error taxonomy.
//!
//! ## Architectural Role
//!
//! As the base crate, `eqwatch-types` has minimal dependencies and is a dependency
//! of every other crate in the workspace. It deliberately knows nothing about HTTP
//! clients or process execution, so errors carry rendered messages rather than
//! foreign error types.

/// Shared configuration structures (`WatcherConfig`, `ChainConfig`).
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Evidence records, enriched records and per-chain persisted state.
pub mod evidence;
/// Validator entries returned by the RPC and staking REST endpoints.
pub mod validator;
