//! The consensus facade exposed to validation, gossip and wallet layers.
//!
//! Ancestry queries are lock-free reads. Conflict classification holds the
//! lock keys of the unit's author addresses, stabilization holds a single
//! `stability` key, and the catchup steps use the global `catchup_chain`
//! and `hash_tree` keys of [`CatchupService`]. All keys live in one
//! [`KeyedMutex`].

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use tessera_catchup::{CatchupService, HashTreeOutcome};
use tessera_consensus::{
    classify, compare, descendants_by_authors_before_mci, is_included, is_included_or_equal,
    mark_mci_stable, Classification, StabilizedMci, UnitOrder,
};
use tessera_messages::{
    CatchupChain, CatchupRequest, CatchupResponse, HashTreeBall, HashTreeRequest,
    HashTreeResponse,
};
use tessera_store::DagStore;
use tessera_store_lmdb::meta::SCHEMA_VERSION;
use tessera_store_lmdb::{check_data_dir, check_integrity, IntegrityReport, LmdbEnvironment};
use tessera_types::{Address, BallHash, Joint, Mci, ProtocolParams, Unit, UnitId};
use tessera_utils::KeyedMutex;
use tessera_witness::{prepare_witness_proof, process_witness_proof, VerifiedProof, WitnessProof};

use crate::{NodeConfig, NodeError};

pub const STABILITY_LOCK: &str = "stability";

/// Snapshot of sync-relevant state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub last_stable_mci: Mci,
    pub last_known_mci: Mci,
    pub catchup_queue: Vec<BallHash>,
    pub hash_tree_balls: usize,
}

pub struct ConsensusCore<S> {
    store: Arc<S>,
    params: ProtocolParams,
    witnesses: Vec<Address>,
    locks: KeyedMutex,
    catchup: CatchupService<S>,
}

impl<S: DagStore> ConsensusCore<S> {
    pub fn new(store: Arc<S>, params: ProtocolParams, witnesses: Vec<Address>) -> Self {
        let locks = KeyedMutex::new();
        let catchup = CatchupService::new(Arc::clone(&store), params.clone(), locks.clone());
        Self {
            store,
            params,
            witnesses,
            locks,
            catchup,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn witnesses(&self) -> &[Address] {
        &self.witnesses
    }

    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }

    pub fn compare(&self, a: &UnitId, b: &UnitId) -> Result<UnitOrder, NodeError> {
        Ok(compare(self.store.as_ref(), a, b)?)
    }

    pub fn is_included(&self, earlier: &UnitId, later: &[UnitId]) -> Result<bool, NodeError> {
        Ok(is_included(self.store.as_ref(), earlier, later)?)
    }

    pub fn is_included_or_equal(
        &self,
        earlier: &UnitId,
        later: &[UnitId],
    ) -> Result<bool, NodeError> {
        Ok(is_included_or_equal(self.store.as_ref(), earlier, later)?)
    }

    pub fn descendants_by_authors_before_mci(
        &self,
        earlier: &UnitId,
        authors: &[Address],
        to_mci: Mci,
    ) -> Result<Vec<UnitId>, NodeError> {
        Ok(descendants_by_authors_before_mci(
            self.store.as_ref(),
            earlier,
            authors,
            to_mci,
        )?)
    }

    /// Classify `unit` against the consumers already stored, holding the
    /// locks of every author address for the duration.
    pub async fn classify_sequence(&self, unit: &Unit) -> Result<Classification, NodeError> {
        let keys: Vec<String> = unit.author_addresses().map(|a| a.as_str().to_string()).collect();
        let _guard = self.locks.lock(keys).await;
        Ok(classify(self.store.as_ref(), unit)?)
    }

    /// Make the next MCI stable.
    pub async fn mark_mci_stable(&self, mci: Mci) -> Result<StabilizedMci, NodeError> {
        let _guard = self.locks.lock([STABILITY_LOCK]).await;
        Ok(mark_mci_stable(self.store.as_ref(), &self.params, mci)?)
    }

    pub fn prepare_witness_proof(&self, last_stable_mci: Mci) -> Result<WitnessProof, NodeError> {
        Ok(prepare_witness_proof(
            self.store.as_ref(),
            &self.params,
            &self.witnesses,
            last_stable_mci,
        )?)
    }

    pub fn process_witness_proof(
        &self,
        unstable_mc_joints: &[Joint],
        definition_joints: &[Joint],
        from_current: bool,
    ) -> Result<VerifiedProof, NodeError> {
        Ok(process_witness_proof(
            self.store.as_ref(),
            &self.params,
            unstable_mc_joints,
            definition_joints,
            &self.witnesses,
            from_current,
        )?)
    }

    /// The request this node would send to a peer to catch up.
    pub fn catchup_request(&self) -> Result<CatchupRequest, NodeError> {
        let last_stable_mci = self.store.last_stable_mci()?;
        let unstable = self.store.unstable_mc_units()?.len() as Mci;
        Ok(CatchupRequest {
            last_stable_mci,
            last_known_mci: last_stable_mci + unstable,
            witnesses: self.witnesses.clone(),
        })
    }

    pub async fn prepare_catchup_chain(
        &self,
        request: &CatchupRequest,
    ) -> Result<CatchupResponse, NodeError> {
        Ok(self.catchup.prepare_catchup_chain(request).await?)
    }

    pub async fn process_catchup_chain(
        &self,
        chain: &CatchupChain,
    ) -> Result<Vec<BallHash>, NodeError> {
        Ok(self.catchup.process_catchup_chain(chain, &self.witnesses).await?)
    }

    pub async fn read_hash_tree(
        &self,
        request: &HashTreeRequest,
    ) -> Result<HashTreeResponse, NodeError> {
        Ok(self.catchup.read_hash_tree(request).await?)
    }

    pub async fn process_hash_tree(
        &self,
        balls: &[HashTreeBall],
    ) -> Result<HashTreeOutcome, NodeError> {
        Ok(self.catchup.process_hash_tree(balls).await?)
    }

    pub fn next_hash_tree_request(&self) -> Result<Option<HashTreeRequest>, NodeError> {
        Ok(self.catchup.next_hash_tree_request()?)
    }

    pub async fn finish_catchup_if_done(&self) -> Result<bool, NodeError> {
        Ok(self.catchup.finish_catchup_if_done().await?)
    }

    pub async fn purge_catchup(&self) -> Result<(), NodeError> {
        Ok(self.catchup.purge_catchup().await?)
    }

    pub fn catchup_in_progress(&self) -> Result<bool, NodeError> {
        Ok(self.catchup.catchup_in_progress()?)
    }

    pub fn hash_tree_unit_by_ball(&self, ball: &BallHash) -> Result<Option<UnitId>, NodeError> {
        Ok(self.catchup.hash_tree_unit_by_ball(ball)?)
    }

    pub fn status(&self) -> Result<NodeStatus, NodeError> {
        let request = self.catchup_request()?;
        Ok(NodeStatus {
            last_stable_mci: request.last_stable_mci,
            last_known_mci: request.last_known_mci,
            catchup_queue: self.store.catchup_chain()?,
            hash_tree_balls: self.store.hash_tree_balls()?.len(),
        })
    }
}

impl ConsensusCore<LmdbEnvironment> {
    /// Open the LMDB environment under `config.data_dir` and check it.
    ///
    /// Fails if the parameters or witness list are invalid, or if the
    /// integrity check reports any problem.
    pub fn open(config: &NodeConfig) -> Result<(Self, IntegrityReport), NodeError> {
        config.validate()?;
        let env = open_checked(&config.data_dir, config.lmdb_max_dbs, config.lmdb_map_size)?;
        let report = check_integrity(&env)?;
        if !report.is_healthy() {
            return Err(NodeError::Integrity(report.errors.join("; ")));
        }
        tracing::info!(
            path = %config.data_dir.display(),
            databases = report.databases_checked,
            entries = report.total_entries,
            "store opened"
        );
        let core = Self::new(Arc::new(env), config.params.clone(), config.witnesses.clone());
        Ok((core, report))
    }
}

/// Open an LMDB environment after checking that the directory is either
/// fresh or holds a data file with a known layout version.
pub fn open_checked(path: &Path, max_dbs: u32, map_size: usize) -> Result<LmdbEnvironment, NodeError> {
    check_data_dir(path).map_err(NodeError::Integrity)?;
    let env = LmdbEnvironment::open(path, max_dbs, map_size)?;
    match env.schema_version()? {
        0 => env.set_schema_version(SCHEMA_VERSION)?,
        SCHEMA_VERSION => {}
        other => {
            return Err(NodeError::Integrity(format!(
                "schema version {other}, expected {SCHEMA_VERSION}"
            )))
        }
    }
    Ok(env)
}
