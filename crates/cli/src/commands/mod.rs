// Path: crates/cli/src/commands/mod.rs

pub mod check;
pub mod config;
pub mod resolve;
pub mod run;
