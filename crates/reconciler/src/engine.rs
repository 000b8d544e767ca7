// Path: crates/reconciler/src/engine.rs
//! Per-chain reconciliation of fetched evidence against persisted state.

use crate::fetcher::EvidenceFetcher;
use crate::resolver::{IdentityResolver, ResolutionSession};
use crate::store::StateStore;
use eqwatch_telemetry::time::Timer;
use eqwatch_telemetry::{error_metrics, watcher_metrics};
use eqwatch_types::config::ChainConfig;
use eqwatch_types::error::{ErrorCode, PersistenceError, ReconcileError};
use eqwatch_types::evidence::{
    same_multiset, ChainState, EnrichedEvidenceRecord, EvidenceRecord, EvidenceUpdate,
};
use std::collections::{HashMap, HashSet};

/// The result of one poll over all monitored chains.
#[derive(Debug, Default)]
pub struct PollReport {
    /// New evidence, one entry per chain that had any.
    pub updates: Vec<EvidenceUpdate>,
    /// Chains whose reconciliation was aborted this cycle.
    pub failed_chains: Vec<String>,
}

/// Owns the chain state collection and drives reconciliation for every monitored
/// chain.
pub struct ReconciliationEngine {
    chains: Vec<ChainConfig>,
    states: Vec<ChainState>,
    store: StateStore,
    fetcher: EvidenceFetcher,
    resolver: IdentityResolver,
}

impl ReconciliationEngine {
    /// Builds an engine over `chains`, loading persisted state from `store`.
    ///
    /// The resolver's root chain is dropped from `chains`: it never reports
    /// evidence against itself.
    pub fn new(
        chains: Vec<ChainConfig>,
        store: StateStore,
        fetcher: EvidenceFetcher,
        resolver: IdentityResolver,
    ) -> Result<Self, PersistenceError> {
        let root_id = resolver.root().chain_id.clone();
        let chains: Vec<ChainConfig> = chains
            .into_iter()
            .filter(|c| c.chain_id != root_id)
            .collect();
        let states = store.load(&chains)?;
        tracing::info!(target: "engine", chains = chains.len(), "Evidence checker loaded.");
        Ok(Self {
            chains,
            states,
            store,
            fetcher,
            resolver,
        })
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn states(&self) -> &[ChainState] {
        &self.states
    }

    pub fn state(&self, chain_id: &str) -> Option<&ChainState> {
        self.states.iter().find(|s| s.chain_id == chain_id)
    }

    /// Reconciles every monitored chain once, sequentially.
    ///
    /// A chain whose fetch or commit fails is skipped for this cycle; the others are
    /// unaffected.
    pub async fn poll(&mut self) -> PollReport {
        let _timer = Timer::new(watcher_metrics());
        let mut session = self.resolver.session();
        let mut report = PollReport::default();
        let chains = self.chains.clone();

        for chain in &chains {
            tracing::info!(target: "engine", "Collecting evidence for {}...", chain.chain_id);
            match self.reconcile_chain(chain, &mut session).await {
                Ok(Some(update)) => report.updates.push(update),
                Ok(None) => {}
                Err(e) => {
                    let (kind, reason) = match &e {
                        ReconcileError::Fetch(_) => ("evidence_fetch", "fetch"),
                        ReconcileError::Persist(_) => ("persistence", "persist"),
                    };
                    tracing::error!(
                        target: "engine",
                        chain_id = %chain.chain_id,
                        code = e.code(),
                        error = %e,
                        "reconciliation aborted for this cycle"
                    );
                    error_metrics().inc_error(kind, e.code());
                    watcher_metrics().inc_chain_failures(&chain.chain_id, reason);
                    report.failed_chains.push(chain.chain_id.clone());
                }
            }
        }

        watcher_metrics().inc_poll_cycles();
        report
    }

    /// Reconciles one chain: fetch, diff, resolve, commit.
    ///
    /// Returns the newly observed records, enriched, or `None` if nothing new was
    /// seen. In-memory state only changes once the commit succeeded.
    pub async fn reconcile_chain(
        &mut self,
        chain: &ChainConfig,
        session: &mut ResolutionSession,
    ) -> Result<Option<EvidenceUpdate>, ReconcileError> {
        if chain.chain_id == self.resolver.root().chain_id {
            return Ok(None);
        }

        let latest = self.fetcher.fetch(chain).await?;
        let previous = self
            .state(&chain.chain_id)
            .map(|s| s.evidence.clone())
            .unwrap_or_default();

        let diff = EvidenceDiff::compute(&previous, latest);
        if !diff.vanished.is_empty() {
            tracing::warn!(
                target: "engine",
                chain_id = %chain.chain_id,
                vanished = diff.vanished.len(),
                "previously recorded evidence no longer reported; keeping it"
            );
        }
        let merged = diff.merged();
        if same_multiset(&merged, &previous) {
            tracing::info!(target: "engine", "No new equivocations recorded for {}.", chain.chain_id);
            return Ok(None);
        }

        let resolved = self.resolve_all(chain, &merged, session).await;
        let by_key: HashMap<String, &EnrichedEvidenceRecord> = resolved
            .iter()
            .map(|e| (e.record.canonical_key(), e))
            .collect();
        let updates: Vec<EnrichedEvidenceRecord> = diff
            .new_records
            .iter()
            .map(|r| {
                by_key
                    .get(&r.canonical_key())
                    .map(|e| (*e).clone())
                    .unwrap_or_else(|| EnrichedEvidenceRecord::unresolved(r.clone()))
            })
            .collect();

        let known = merged.len() as u64;
        let candidate = ChainState {
            chain_id: chain.chain_id.clone(),
            api: chain.api_url.clone(),
            rpc: chain.rpc_url.clone(),
            binary: chain.binary.clone(),
            evidence: merged,
            evidence_resolved: resolved,
        };
        self.commit(candidate)?;
        watcher_metrics().set_known_evidence(&chain.chain_id, known);

        if updates.is_empty() {
            tracing::info!(
                target: "engine",
                chain_id = %chain.chain_id,
                "evidence set changed without new records"
            );
            return Ok(None);
        }

        watcher_metrics().inc_evidence_detected(&chain.chain_id, updates.len() as u64);
        tracing::info!(
            target: "engine",
            chain_id = %chain.chain_id,
            new = updates.len(),
            "New equivocations recorded for {}",
            chain.chain_id
        );
        Ok(Some(EvidenceUpdate {
            chain_id: chain.chain_id.clone(),
            updates,
        }))
    }

    async fn resolve_all(
        &self,
        chain: &ChainConfig,
        records: &[EvidenceRecord],
        session: &mut ResolutionSession,
    ) -> Vec<EnrichedEvidenceRecord> {
        let mut resolved = Vec::with_capacity(records.len());
        let mut reported = HashSet::new();
        for record in records {
            let (enriched, err) = session.enrich(chain, record).await;
            if let Some(err) = err {
                let address = record.consensus_address().unwrap_or_default().to_string();
                if reported.insert(address.clone()) {
                    tracing::warn!(
                        target: "engine",
                        chain_id = %chain.chain_id,
                        consensus_address = %address,
                        code = err.code(),
                        error = %err,
                        "identity unresolved"
                    );
                    error_metrics().inc_error("resolution", err.code());
                    watcher_metrics().inc_unresolved_identities(&chain.chain_id);
                }
            }
            resolved.push(enriched);
        }
        resolved
    }

    /// Swaps `candidate` in, persists the whole collection, and restores the previous
    /// state if the write fails.
    fn commit(&mut self, candidate: ChainState) -> Result<(), PersistenceError> {
        let pos = match self.states.iter().position(|s| s.chain_id == candidate.chain_id) {
            Some(pos) => pos,
            None => {
                self.states.push(ChainState {
                    chain_id: candidate.chain_id.clone(),
                    api: candidate.api.clone(),
                    rpc: candidate.rpc.clone(),
                    binary: candidate.binary.clone(),
                    evidence: Vec::new(),
                    evidence_resolved: Vec::new(),
                });
                self.states.len() - 1
            }
        };
        let Some(slot) = self.states.get_mut(pos) else {
            return Err(PersistenceError::Serialize(format!(
                "state slot for '{}' disappeared",
                candidate.chain_id
            )));
        };
        let previous = std::mem::replace(slot, candidate);

        if let Err(e) = self.store.save(&self.states) {
            if let Some(slot) = self.states.get_mut(pos) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }
}

/// The difference between the stored evidence and a fresh fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceDiff {
    /// The fetch, in reported order.
    pub latest: Vec<EvidenceRecord>,
    /// Records of `latest` not present in the stored set, de-duplicated.
    pub new_records: Vec<EvidenceRecord>,
    /// Stored records the fetch no longer reports.
    pub vanished: Vec<EvidenceRecord>,
}

impl EvidenceDiff {
    pub fn compute(previous: &[EvidenceRecord], latest: Vec<EvidenceRecord>) -> Self {
        let known: HashSet<String> = previous.iter().map(EvidenceRecord::canonical_key).collect();
        let current: HashSet<String> = latest.iter().map(EvidenceRecord::canonical_key).collect();

        let mut seen = HashSet::new();
        let new_records = latest
            .iter()
            .filter(|r| {
                let key = r.canonical_key();
                !known.contains(&key) && seen.insert(key)
            })
            .cloned()
            .collect();
        let vanished = previous
            .iter()
            .filter(|r| !current.contains(&r.canonical_key()))
            .cloned()
            .collect();

        Self {
            latest,
            new_records,
            vanished,
        }
    }

    /// The state to store: the fetch, followed by records it no longer reports.
    ///
    /// Stored evidence is therefore a superset of the latest fetch. Nodes prune old
    /// evidence, and a record seen once must never leave the stored set.
    pub fn merged(&self) -> Vec<EvidenceRecord> {
        let mut merged = self.latest.clone();
        merged.extend(self.vanished.iter().cloned());
        merged
    }
}
