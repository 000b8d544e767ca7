// Path: crates/reconciler/tests/reconcile.rs
mod common;

use common::{hex_address, moniker, pubkey, serve, FakeRoot};
use eqwatch_reconciler::assignment::KeyAssignmentResolver;
use eqwatch_reconciler::codec::AddressCodec;
use eqwatch_reconciler::directory::ValidatorDirectoryCollector;
use eqwatch_reconciler::fetcher::EvidenceFetcher;
use eqwatch_reconciler::testing::ScriptedPort;
use async_trait::async_trait;
use eqwatch_reconciler::{
    ExternalQueryPort, IdentityResolver, PollService, ReconciliationEngine, StateStore,
    UpdateSink,
};
use eqwatch_types::config::ChainConfig;
use eqwatch_types::error::QueryError;
use eqwatch_types::evidence::{ChainState, EvidenceRecord, EvidenceUpdate};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ROOT_ID: &str = "cosmoshub-4";

fn chain(id: &str, binary: &str) -> ChainConfig {
    ChainConfig {
        chain_id: id.into(),
        rpc_url: format!("http://{id}:26657"),
        api_url: format!("http://{id}:1317"),
        binary: binary.into(),
    }
}

fn root(url: &str) -> ChainConfig {
    ChainConfig {
        chain_id: ROOT_ID.into(),
        rpc_url: url.into(),
        api_url: url.into(),
        binary: "gaiad".into(),
    }
}

fn record(v: Value) -> EvidenceRecord {
    serde_json::from_value(v).unwrap()
}

fn valcons_formats(valcons: &str) -> Value {
    json!({"formats": [
        "cosmos1acc", "cosmospub1acc", "cosmosvaloper1op", "cosmosvaloperpub1op",
        valcons, "cosmosvalconspub1x"
    ]})
}

/// Scripts the codec round trip for one consumer address whose root identity is
/// validator `index` of the fake directory, with no key assigned.
fn script_validator(port: ScriptedPort, binary: &str, consumer: &str, index: usize) -> ScriptedPort {
    let consumer_hex = format!("C0{index:038}");
    let root_addr = format!("cosmosvalcons1root{index}");
    port.with_parse(binary, consumer, json!({"human": "consvalcons", "bytes": consumer_hex}))
        .with_parse("gaiad", &consumer_hex, valcons_formats(&root_addr))
        .with_parse("gaiad", &root_addr, json!({"human": "cosmosvalcons", "bytes": hex_address(index)}))
}

struct Harness {
    port: Arc<ScriptedPort>,
    engine: ReconciliationEngine,
    path: PathBuf,
    _dir: TempDir,
}

fn harness(port: ScriptedPort, chains: Vec<ChainConfig>, root_url: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evidence.json");
    let port = Arc::new(port);
    let dyn_port: Arc<dyn ExternalQueryPort> = port.clone();
    let resolver = IdentityResolver::new(
        AddressCodec::new(dyn_port.clone()),
        KeyAssignmentResolver::new(dyn_port.clone()),
        ValidatorDirectoryCollector::new(Duration::from_secs(5), 100).unwrap(),
        root(root_url),
    );
    let engine = ReconciliationEngine::new(
        chains,
        StateStore::new(&path),
        EvidenceFetcher::new(dyn_port),
        resolver,
    )
    .unwrap();
    Harness {
        port,
        engine,
        path,
        _dir: dir,
    }
}

fn persisted(path: &Path) -> Vec<ChainState> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn persisted_chain(path: &Path, chain_id: &str) -> ChainState {
    persisted(path)
        .into_iter()
        .find(|s| s.chain_id == chain_id)
        .unwrap()
}

#[tokio::test]
async fn first_evidence_is_reported_enriched_and_persisted() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "testd", "X", 7);
    let mut h = harness(port, vec![chain("test-1", "testd")], &url);
    assert!(persisted_chain(&h.path, "test-1").evidence.is_empty());

    let ev = json!({"consensus_address": "X", "height": 100});
    h.port.set_evidence("http://test-1:26657", json!([ev.clone()]));
    let report = h.engine.poll().await;

    assert!(report.failed_chains.is_empty());
    assert_eq!(report.updates.len(), 1);
    let update = &report.updates[0];
    assert_eq!(update.chain_id, "test-1");
    assert_eq!(update.updates.len(), 1);
    let enriched = &update.updates[0];
    assert_eq!(enriched.record, record(ev.clone()));
    assert_eq!(enriched.provider_address, "cosmosvalcons1root7");
    assert_eq!(enriched.pubkey, pubkey(7));
    assert_eq!(enriched.moniker, moniker(7));

    let stored = persisted_chain(&h.path, "test-1");
    assert_eq!(stored.evidence, vec![record(ev)]);
    assert_eq!(stored.evidence_resolved, update.updates);
}

#[tokio::test]
async fn unchanged_remote_set_is_idempotent() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "testd", "X", 1);
    let mut h = harness(port, vec![chain("test-1", "testd")], &url);
    h.port.set_evidence(
        "http://test-1:26657",
        json!([{"consensus_address": "X", "height": 100}, {"consensus_address": "X", "height": 101}]),
    );

    assert_eq!(h.engine.poll().await.updates.len(), 1);
    let before = std::fs::read(&h.path).unwrap();

    let report = h.engine.poll().await;
    assert!(report.updates.is_empty());
    assert_eq!(std::fs::read(&h.path).unwrap(), before);

    // The same set in a different order is still no change.
    h.port.set_evidence(
        "http://test-1:26657",
        json!([{"consensus_address": "X", "height": 101}, {"consensus_address": "X", "height": 100}]),
    );
    assert!(h.engine.poll().await.updates.is_empty());
    assert_eq!(std::fs::read(&h.path).unwrap(), before);
}

#[tokio::test]
async fn only_the_delta_is_reported_but_everything_is_resolved() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "testd", "A", 2);
    let port = script_validator(port, "testd", "B", 3);
    let mut h = harness(port, vec![chain("test-1", "testd")], &url);

    h.port.set_evidence("http://test-1:26657", json!([{"consensus_address": "A", "height": 5}]));
    h.engine.poll().await;

    h.port.set_evidence(
        "http://test-1:26657",
        json!([{"consensus_address": "A", "height": 5}, {"consensus_address": "B", "height": 9}]),
    );
    let report = h.engine.poll().await;
    assert_eq!(report.updates.len(), 1);
    let updates = &report.updates[0].updates;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].record.consensus_address(), Some("B"));
    assert_eq!(updates[0].moniker, moniker(3));

    let stored = persisted_chain(&h.path, "test-1");
    assert_eq!(stored.evidence.len(), 2);
    let monikers: Vec<_> = stored.evidence_resolved.iter().map(|e| e.moniker.clone()).collect();
    assert_eq!(monikers, vec![moniker(2), moniker(3)]);
}

#[tokio::test]
async fn root_chain_is_never_fetched() {
    let url = serve(Arc::new(FakeRoot::with_validators(1))).await;
    let root_as_chain = root(&url);
    let mut h = harness(
        ScriptedPort::default(),
        vec![root_as_chain.clone(), chain("test-1", "testd")],
        &url,
    );
    h.port.set_evidence(&root_as_chain.rpc_url, json!([{"consensus_address": "R", "height": 1}]));

    let report = h.engine.poll().await;
    assert!(report.updates.is_empty());
    assert_eq!(h.engine.chains().len(), 1);
    assert!(!h
        .port
        .calls()
        .contains(&format!("evidence:{}", root_as_chain.rpc_url)));
    assert!(persisted(&h.path).iter().all(|s| s.chain_id != ROOT_ID));
}

#[tokio::test]
async fn assigned_key_decides_the_identity() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "testd", "X", 4)
        .with_provider("test-1", "cosmosvalcons1root4", "cosmosvalcons1assigned")
        .with_parse("gaiad", "cosmosvalcons1assigned", json!({"bytes": hex_address(9)}));
    let mut h = harness(port, vec![chain("test-1", "testd")], &url);
    h.port.set_evidence("http://test-1:26657", json!([{"consensus_address": "X", "height": 1}]));

    let report = h.engine.poll().await;
    let enriched = &report.updates[0].updates[0];
    assert_eq!(enriched.provider_address, "cosmosvalcons1assigned");
    assert_eq!(enriched.moniker, moniker(9));
    assert!(h
        .port
        .calls()
        .contains(&"provider:test-1:cosmosvalcons1root4".to_string()));
}

#[tokio::test]
async fn unassigned_identity_is_the_root_format_address() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "neutrond", "neutronvalcons1x", 5);
    let mut h = harness(port, vec![chain("neutron-1", "neutrond")], &url);
    h.port.set_evidence(
        "http://neutron-1:26657",
        json!([{"consensus_address": "neutronvalcons1x", "height": 1}]),
    );

    let report = h.engine.poll().await;
    let enriched = &report.updates[0].updates[0];
    assert_eq!(enriched.provider_address, "cosmosvalcons1root5");
    assert_ne!(enriched.provider_address, "neutronvalcons1x");
}

#[tokio::test]
async fn unresolved_identity_is_still_reported() {
    let url = common::dead_url().await;
    let port = script_validator(ScriptedPort::default(), "testd", "X", 1);
    let mut h = harness(port, vec![chain("test-1", "testd")], &url);
    h.port.set_evidence(
        "http://test-1:26657",
        json!([{"consensus_address": "X", "height": 1}, {"consensus_address": "unknown", "height": 2}]),
    );

    let report = h.engine.poll().await;
    assert!(report.failed_chains.is_empty());
    let updates = &report.updates[0].updates;
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].provider_address, "cosmosvalcons1root1");
    assert!(updates.iter().all(|u| u.pubkey.is_empty() && u.moniker.is_empty()));
    assert_eq!(updates[1].provider_address, "");

    assert_eq!(persisted_chain(&h.path, "test-1").evidence.len(), 2);
}

#[tokio::test]
async fn fetch_failure_skips_only_that_chain() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "bd", "Y", 2);
    let mut h = harness(port, vec![chain("a-1", "ad"), chain("b-1", "bd")], &url);
    h.port.fail_evidence(
        "http://a-1:26657",
        QueryError::Timeout {
            command: "gaiad".into(),
            secs: 30,
        },
    );
    h.port.set_evidence("http://b-1:26657", json!([{"consensus_address": "Y", "height": 3}]));

    let report = h.engine.poll().await;
    assert_eq!(report.failed_chains, vec!["a-1".to_string()]);
    assert_eq!(report.updates.len(), 1);
    assert_eq!(report.updates[0].chain_id, "b-1");
    assert!(persisted_chain(&h.path, "a-1").evidence.is_empty());

    // Recovers on the next cycle.
    h.port.set_evidence("http://a-1:26657", json!([{"consensus_address": "Z", "height": 4}]));
    let report = h.engine.poll().await;
    assert!(report.failed_chains.is_empty());
    assert_eq!(report.updates[0].chain_id, "a-1");
}

#[tokio::test]
async fn stored_evidence_never_shrinks() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let mut h = harness(ScriptedPort::default(), vec![chain("test-1", "testd")], &url);
    h.port.set_evidence(
        "http://test-1:26657",
        json!([{"consensus_address": "A", "height": 1}, {"consensus_address": "B", "height": 2}]),
    );
    h.engine.poll().await;
    let before = h.engine.state("test-1").unwrap().evidence.clone();

    h.port.set_evidence("http://test-1:26657", json!([{"consensus_address": "C", "height": 3}]));
    let report = h.engine.poll().await;
    assert_eq!(report.updates[0].updates.len(), 1);

    let after = &h.engine.state("test-1").unwrap().evidence;
    assert!(before.iter().all(|r| after.contains(r)));
    assert_eq!(after.len(), 3);
    assert_eq!(h.engine.state("test-1").unwrap().evidence_resolved.len(), 3);
}

#[tokio::test]
async fn failed_commit_keeps_state_and_redetects() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let mut h = harness(ScriptedPort::default(), vec![chain("test-1", "testd")], &url);
    let before = std::fs::read(&h.path).unwrap();

    let squatter = h.path.with_file_name("evidence.json.tmp");
    std::fs::create_dir(&squatter).unwrap();
    h.port.set_evidence("http://test-1:26657", json!([{"consensus_address": "A", "height": 1}]));

    let report = h.engine.poll().await;
    assert!(report.updates.is_empty());
    assert_eq!(report.failed_chains, vec!["test-1".to_string()]);
    assert!(h.engine.state("test-1").unwrap().evidence.is_empty());
    assert_eq!(std::fs::read(&h.path).unwrap(), before);

    std::fs::remove_dir(&squatter).unwrap();
    let report = h.engine.poll().await;
    assert_eq!(report.updates.len(), 1);
    assert_eq!(persisted_chain(&h.path, "test-1").evidence.len(), 1);
}

#[tokio::test]
async fn directory_is_collected_once_per_cycle() {
    let fake = Arc::new(FakeRoot::with_validators(10));
    let url = serve(fake.clone()).await;
    let port = script_validator(ScriptedPort::default(), "ad", "A", 1);
    let port = script_validator(port, "bd", "B", 2);
    let mut h = harness(port, vec![chain("a-1", "ad"), chain("b-1", "bd")], &url);
    h.port.set_evidence("http://a-1:26657", json!([{"consensus_address": "A", "height": 1}]));
    h.port.set_evidence("http://b-1:26657", json!([{"consensus_address": "B", "height": 1}]));

    let report = h.engine.poll().await;
    assert_eq!(report.updates.len(), 2);
    let rpc_requests = fake.seen().iter().filter(|r| r.path == "/validators").count();
    let api_requests = fake.seen().iter().filter(|r| r.path != "/validators").count();
    assert_eq!((rpc_requests, api_requests), (1, 1));

    // A quiet cycle never touches the directory.
    h.engine.poll().await;
    assert_eq!(fake.seen().len(), 2);
}

#[tokio::test]
async fn poll_service_skips_while_a_cycle_is_in_flight() {
    let url = serve(Arc::new(FakeRoot::with_validators(1))).await;
    let h = harness(ScriptedPort::default(), vec![chain("test-1", "testd")], &url);
    let service = PollService::new(h.engine);

    let engine = service.engine();
    let held = engine.lock().await;
    assert!(service.try_poll().await.is_none());
    drop(held);

    let report = service.try_poll().await.unwrap();
    assert!(report.updates.is_empty());
}

/// Keeps every delivered update together with the state file as it was on disk at
/// delivery time.
struct RecordingSink {
    path: PathBuf,
    delivered: Mutex<Vec<(EvidenceUpdate, Vec<ChainState>)>>,
}

impl RecordingSink {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn delivered(&self) -> Vec<(EvidenceUpdate, Vec<ChainState>)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSink for RecordingSink {
    async fn deliver(&self, update: &EvidenceUpdate) -> anyhow::Result<()> {
        let on_disk = persisted(&self.path);
        self.delivered.lock().unwrap().push((update.clone(), on_disk));
        Ok(())
    }
}

#[derive(Default)]
struct FailingSink {
    attempts: Mutex<usize>,
}

#[async_trait]
impl UpdateSink for FailingSink {
    async fn deliver(&self, _update: &EvidenceUpdate) -> anyhow::Result<()> {
        *self.attempts.lock().unwrap() += 1;
        anyhow::bail!("downstream unavailable")
    }
}

#[tokio::test]
async fn updates_reach_every_sink_after_the_state_is_written() {
    let url = serve(Arc::new(FakeRoot::with_validators(10))).await;
    let port = script_validator(ScriptedPort::default(), "testd", "X", 7);
    let h = harness(port, vec![chain("test-1", "testd")], &url);
    let failing = Arc::new(FailingSink::default());
    let recording = Arc::new(RecordingSink::new(&h.path));
    let service = PollService::new(h.engine)
        .with_sink(failing.clone())
        .with_sink(recording.clone());

    let ev = json!({"consensus_address": "X", "height": 100});
    h.port.set_evidence("http://test-1:26657", json!([ev.clone()]));
    let report = service.try_poll().await.unwrap();
    assert_eq!(report.updates.len(), 1);

    // The failing sink does not keep the update from the next one.
    assert_eq!(*failing.attempts.lock().unwrap(), 1);
    let delivered = recording.delivered();
    assert_eq!(delivered.len(), 1);
    let (update, on_disk) = &delivered[0];
    assert_eq!(update, &report.updates[0]);
    assert_eq!(update.updates[0].moniker, moniker(7));
    let stored = on_disk.iter().find(|s| s.chain_id == "test-1").unwrap();
    assert_eq!(stored.evidence, vec![record(ev)]);

    // Nothing new, nothing delivered.
    service.try_poll().await.unwrap();
    assert_eq!(recording.delivered().len(), 1);
    assert_eq!(*failing.attempts.lock().unwrap(), 1);
}

#[tokio::test]
async fn nothing_is_delivered_when_the_commit_fails() {
    let url = serve(Arc::new(FakeRoot::with_validators(1))).await;
    let h = harness(ScriptedPort::default(), vec![chain("test-1", "testd")], &url);
    let recording = Arc::new(RecordingSink::new(&h.path));
    let service = PollService::new(h.engine).with_sink(recording.clone());

    let squatter = h.path.with_file_name("evidence.json.tmp");
    std::fs::create_dir(&squatter).unwrap();
    h.port.set_evidence("http://test-1:26657", json!([{"consensus_address": "A", "height": 1}]));

    let report = service.try_poll().await.unwrap();
    assert_eq!(report.failed_chains, vec!["test-1".to_string()]);
    assert!(recording.delivered().is_empty());

    std::fs::remove_dir(&squatter).unwrap();
    service.try_poll().await.unwrap();
    assert_eq!(recording.delivered().len(), 1);
}
