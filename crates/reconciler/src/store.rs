// Path: crates/reconciler/src/store.rs
//! Durable JSON persistence of the chain state collection.
//!
//! Every save writes the whole collection to a sibling temporary file, syncs it, and
//! renames it over the target, so a reader never observes a half-written file.

use eqwatch_types::config::ChainConfig;
use eqwatch_types::error::PersistenceError;
use eqwatch_types::evidence::ChainState;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    reset_corrupt: bool,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reset_corrupt: false,
        }
    }

    /// Move a malformed state file aside and start empty instead of failing.
    pub fn reset_corrupt(mut self, reset: bool) -> Self {
        self.reset_corrupt = reset;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    fn corrupt_path(&self) -> PathBuf {
        sibling(&self.path, "corrupt")
    }

    /// Loads the persisted collection and aligns it with `chains`.
    ///
    /// Configured chains missing from the file get empty skeletons; persisted chains
    /// that are no longer configured are kept as they are. An absent or empty file is
    /// (re)written with skeletons.
    pub fn load(&self, chains: &[ChainConfig]) -> Result<Vec<ChainState>, PersistenceError> {
        let mut states = match self.read()? {
            Some(states) => states,
            None => {
                tracing::info!(target: "store", path = %self.path.display(), "Creating evidence file...");
                let skeletons: Vec<ChainState> = chains.iter().map(ChainState::skeleton).collect();
                self.save(&skeletons)?;
                return Ok(skeletons);
            }
        };

        for chain in chains {
            match states.iter_mut().find(|s| s.chain_id == chain.chain_id) {
                Some(state) => state.refresh_from(chain),
                None => {
                    tracing::info!(target: "store", chain_id = %chain.chain_id, "adding newly configured chain");
                    states.push(ChainState::skeleton(chain));
                }
            }
        }
        for state in &states {
            if !chains.iter().any(|c| c.chain_id == state.chain_id) {
                tracing::info!(target: "store", chain_id = %state.chain_id, "keeping state of unconfigured chain");
            }
        }
        Ok(states)
    }

    /// Reads the file. `Ok(None)` if it does not exist or holds only whitespace.
    fn read(&self) -> Result<Option<Vec<ChainState>>, PersistenceError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            tracing::info!(target: "store", path = %self.path.display(), "state file is empty");
            return Ok(None);
        }
        match serde_json::from_slice::<Vec<ChainState>>(&raw) {
            Ok(states) => Ok(Some(states)),
            Err(e) if self.reset_corrupt => {
                let aside = self.corrupt_path();
                tracing::warn!(
                    target: "store",
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "state file is corrupt; starting from empty state"
                );
                fs::rename(&self.path, &aside).map_err(|io| PersistenceError::Write {
                    path: aside.display().to_string(),
                    reason: io.to_string(),
                })?;
                Ok(None)
            }
            Err(e) => Err(PersistenceError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Atomically replaces the state file with `states`.
    pub fn save(&self, states: &[ChainState]) -> Result<(), PersistenceError> {
        let rendered = serde_json::to_vec_pretty(states)?;
        let tmp = self.tmp_path();
        let write_err = |path: &Path, e: std::io::Error| PersistenceError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        {
            let file = File::create(&tmp).map_err(|e| write_err(&tmp, e))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&rendered).map_err(|e| write_err(&tmp, e))?;
            writer.write_all(b"\n").map_err(|e| write_err(&tmp, e))?;
            writer.flush().map_err(|e| write_err(&tmp, e))?;
            writer.get_ref().sync_all().map_err(|e| write_err(&tmp, e))?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(&self.path, e));
        }
        tracing::debug!(target: "store", path = %self.path.display(), bytes = rendered.len(), "state saved");
        Ok(())
    }
}

/// `dir/name.ext` → `dir/name.ext.<suffix>`, keeping the sibling on the same filesystem.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
