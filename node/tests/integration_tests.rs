//! End-to-end catchup between an in-memory responder and an LMDB-backed
//! requester, with every message passed through its JSON wire form.

use std::sync::Arc;

use tessera_consensus::stabilize_up_to;
use tessera_messages::{
    from_json, to_json, CatchupChain, CatchupResponse, HashTreeRequest, HashTreeResponse,
};
use tessera_node::{ConsensusCore, LogFormat, NodeConfig, NodeError};
use tessera_nullables::{DagBuilder, NullStore};
use tessera_store::{BallStore, BatchWriter, CatchupStore, UnitStore};
use tessera_store_lmdb::meta::SCHEMA_VERSION;
use tessera_store_lmdb::LmdbEnvironment;
use tessera_types::{Sequence, SpendKey, UnitId};

fn responder() -> (DagBuilder, Vec<UnitId>) {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let mut mc = dag.extend_main_chain(g, 12);
    let params = dag.params().clone();
    stabilize_up_to(dag.store().as_ref(), &params, 5).unwrap();
    let tip = *mc.last().unwrap();
    mc.extend(dag.extend_main_chain(tip, 12));
    stabilize_up_to(dag.store().as_ref(), &params, 20).unwrap();
    let tip = *mc.last().unwrap();
    mc.extend(dag.extend_main_chain(tip, 10));
    (dag, mc)
}

fn config_for(dir: &tempfile::TempDir, dag: &DagBuilder) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().join("lmdb"),
        lmdb_map_size: 64 * 1024 * 1024,
        witnesses: dag.witness_addresses(),
        params: dag.params().clone(),
        ..NodeConfig::default()
    }
}

fn lmdb_requester(
    dir: &tempfile::TempDir,
    dag: &DagBuilder,
) -> ConsensusCore<LmdbEnvironment> {
    let (core, report) = ConsensusCore::open(&config_for(dir, dag)).unwrap();
    assert!(report.is_healthy());
    core.store().commit(dag.genesis_batch()).unwrap();
    core
}

fn wire<T: serde::Serialize + serde::de::DeserializeOwned>(message: &T) -> T {
    let text = to_json(message).unwrap();
    from_json(&text).unwrap()
}

#[tokio::test]
async fn lmdb_node_catches_up_over_json() {
    let (dag, mc) = responder();
    let responder = ConsensusCore::new(
        Arc::clone(dag.store()),
        dag.params().clone(),
        dag.witness_addresses(),
    );
    let dir = tempfile::tempdir().unwrap();
    let node = lmdb_requester(&dir, &dag);

    let request = wire(&node.catchup_request().unwrap());
    assert_eq!(request.last_stable_mci, 0);
    let response: CatchupResponse = wire(&responder.prepare_catchup_chain(&request).await.unwrap());
    let chain: CatchupChain = match response {
        CatchupResponse::Chain(chain) => chain,
        CatchupResponse::Current { .. } => panic!("expected a chain"),
    };
    let queue = node.process_catchup_chain(&chain).await.unwrap();
    assert_eq!(queue.len(), 3);
    assert!(node.catchup_in_progress().unwrap());

    let mut trees = 0;
    while let Some(request) = node.next_hash_tree_request().unwrap() {
        let request: HashTreeRequest = wire(&request);
        let tree: HashTreeResponse = wire(&responder.read_hash_tree(&request).await.unwrap());
        let outcome = node.process_hash_tree(&tree.balls).await.unwrap();
        assert_eq!(outcome.dequeued, request.from_ball);
        trees += 1;
    }
    assert_eq!(trees, 2);

    let mc20_ball = dag.store().ball(&mc[19]).unwrap();
    assert_eq!(node.hash_tree_unit_by_ball(&mc20_ball).unwrap(), Some(mc[19]));
    let status = node.status().unwrap();
    assert_eq!(status.catchup_queue.len(), 1);
    assert_eq!(status.hash_tree_balls, 20);

    assert!(node.finish_catchup_if_done().await.unwrap());
    assert!(!node.catchup_in_progress().unwrap());
}

#[tokio::test]
async fn reopened_store_keeps_catchup_state() {
    let (dag, _) = responder();
    let responder = ConsensusCore::new(
        Arc::clone(dag.store()),
        dag.params().clone(),
        dag.witness_addresses(),
    );
    let dir = tempfile::tempdir().unwrap();
    {
        let node = lmdb_requester(&dir, &dag);
        let request = node.catchup_request().unwrap();
        let CatchupResponse::Chain(chain) = responder.prepare_catchup_chain(&request).await.unwrap()
        else {
            panic!("expected a chain");
        };
        node.process_catchup_chain(&chain).await.unwrap();
        let request = node.next_hash_tree_request().unwrap().unwrap();
        let tree = responder.read_hash_tree(&request).await.unwrap();
        node.process_hash_tree(&tree.balls).await.unwrap();
    }

    let (node, _) = ConsensusCore::open(&config_for(&dir, &dag)).unwrap();
    assert!(node.catchup_in_progress().unwrap());
    assert_eq!(node.store().catchup_chain().unwrap().len(), 2);
    assert!(node.next_hash_tree_request().unwrap().is_some());

    node.purge_catchup().await.unwrap();
    let status = node.status().unwrap();
    assert!(status.catchup_queue.is_empty());
    assert_eq!(status.hash_tree_balls, 0);
}

#[tokio::test]
async fn classification_waits_for_author_lock() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let spend = SpendKey {
        unit: g,
        message_index: 0,
        output_index: 0,
    };
    let u1 = dag.unit(&[g]).data(b"one").spending(spend).add();
    let u2 = dag.unit(&[g]).data(b"two").spending(spend).add();
    let core = Arc::new(ConsensusCore::new(
        Arc::clone(dag.store()),
        dag.params().clone(),
        dag.witness_addresses(),
    ));
    let unit = dag.store().unit(&u2).unwrap();
    let author = unit.authors[0].address.as_str().to_string();

    let guard = core.locks().lock([author]).await;
    let task = {
        let core = Arc::clone(&core);
        let unit = unit.clone();
        tokio::spawn(async move { core.classify_sequence(&unit).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!task.is_finished());
    drop(guard);

    let classification = task.await.unwrap().unwrap();
    assert_eq!(classification.sequence, Sequence::Good);
    assert_eq!(classification.conflicts, vec![u1]);
}

#[tokio::test]
async fn stabilization_through_the_facade() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let mc = dag.extend_main_chain(g, 3);
    let core = ConsensusCore::new(
        Arc::clone(dag.store()),
        dag.params().clone(),
        dag.witness_addresses(),
    );
    let report = core.mark_mci_stable(1).await.unwrap();
    assert_eq!(report.units, vec![mc[0]]);
    assert!(matches!(
        core.mark_mci_stable(3).await,
        Err(NodeError::Consensus(_))
    ));
    assert_eq!(core.status().unwrap().last_stable_mci, 1);
    assert_eq!(core.status().unwrap().last_known_mci, 3);
}

#[test]
fn fresh_directory_opens_healthy() {
    let dag = DagBuilder::new();
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&dir, &dag);
    config.log_format = LogFormat::Json;
    let (core, report) = ConsensusCore::open(&config).unwrap();
    assert!(report.is_healthy());
    assert_eq!(core.store().schema_version().unwrap(), SCHEMA_VERSION);
    assert!(!core.catchup_in_progress().unwrap());
}

#[test]
fn non_lmdb_directory_is_refused() {
    let dag = DagBuilder::new();
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&dir, &dag);
    config.data_dir = dir.path().to_path_buf();
    assert!(matches!(
        ConsensusCore::open(&config),
        Err(NodeError::Integrity(_))
    ));
}

#[test]
fn null_store_core_reports_genesis_status() {
    let dag = DagBuilder::new();
    let core: ConsensusCore<NullStore> = ConsensusCore::new(
        Arc::clone(dag.store()),
        dag.params().clone(),
        dag.witness_addresses(),
    );
    let status = core.status().unwrap();
    assert_eq!(status.last_stable_mci, 0);
    assert_eq!(status.last_known_mci, 0);
}
