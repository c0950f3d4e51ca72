//! Lock-serialized entry point for the catchup workflow.
//!
//! Building or consuming a catchup chain holds the `catchup_chain` key and
//! accepting a hash tree holds the `hash_tree` key, so at most one of each is
//! in flight across the node. Reads take no lock.

use std::sync::{Arc, Mutex, MutexGuard};

use tessera_messages::{
    CatchupChain, CatchupRequest, CatchupResponse, HashTreeBall, HashTreeRequest, HashTreeResponse,
};
use tessera_store::{DagStore, WriteBatch};
use tessera_types::{Address, BallHash, ProtocolParams, UnitId};
use tessera_utils::KeyedMutex;

use crate::chain::{prepare_catchup_chain, process_catchup_chain};
use crate::hash_tree::{process_hash_tree, read_hash_tree, HashTreeIndex, HashTreeOutcome};
use crate::CatchupError;

pub const CATCHUP_CHAIN_LOCK: &str = "catchup_chain";
pub const HASH_TREE_LOCK: &str = "hash_tree";

pub struct CatchupService<S> {
    store: Arc<S>,
    params: ProtocolParams,
    locks: KeyedMutex,
    index: Mutex<HashTreeIndex>,
}

impl<S: DagStore> CatchupService<S> {
    pub fn new(store: Arc<S>, params: ProtocolParams, locks: KeyedMutex) -> Self {
        Self {
            store,
            params,
            locks,
            index: Mutex::new(HashTreeIndex::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn index(&self) -> MutexGuard<'_, HashTreeIndex> {
        // Index updates happen after the store commit and cannot panic midway.
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn prepare_catchup_chain(
        &self,
        request: &CatchupRequest,
    ) -> Result<CatchupResponse, CatchupError> {
        prepare_catchup_chain(self.store.as_ref(), &self.params, request)
    }

    pub async fn process_catchup_chain(
        &self,
        chain: &CatchupChain,
        witnesses: &[Address],
    ) -> Result<Vec<BallHash>, CatchupError> {
        let _guard = self.locks.lock([CATCHUP_CHAIN_LOCK]).await;
        process_catchup_chain(self.store.as_ref(), &self.params, chain, witnesses)
    }

    pub async fn read_hash_tree(
        &self,
        request: &HashTreeRequest,
    ) -> Result<HashTreeResponse, CatchupError> {
        read_hash_tree(self.store.as_ref(), request)
    }

    pub async fn process_hash_tree(
        &self,
        balls: &[HashTreeBall],
    ) -> Result<HashTreeOutcome, CatchupError> {
        let _guard = self.locks.lock([HASH_TREE_LOCK]).await;
        let mut index = self.index();
        process_hash_tree(self.store.as_ref(), &mut index, balls)
    }

    /// The request covering the first two queued balls, if there are two.
    pub fn next_hash_tree_request(&self) -> Result<Option<HashTreeRequest>, CatchupError> {
        let chain = self.store.catchup_chain()?;
        Ok(match chain.as_slice() {
            [from, to, ..] => Some(HashTreeRequest {
                from_ball: *from,
                to_ball: *to,
            }),
            _ => None,
        })
    }

    /// Clear a queue that has no gap left to fill. Returns true if catchup
    /// is complete.
    pub async fn finish_catchup_if_done(&self) -> Result<bool, CatchupError> {
        let _guard = self.locks.lock([CATCHUP_CHAIN_LOCK]).await;
        let chain = self.store.catchup_chain()?;
        if chain.len() >= 2 {
            return Ok(false);
        }
        if !chain.is_empty() {
            let mut batch = WriteBatch::new();
            batch.set_catchup_chain(Vec::new());
            self.store.commit(batch)?;
        }
        tracing::info!("catchup done");
        Ok(true)
    }

    /// Abandon an in-progress catchup.
    pub async fn purge_catchup(&self) -> Result<(), CatchupError> {
        let _guard = self.locks.lock([CATCHUP_CHAIN_LOCK, HASH_TREE_LOCK]).await;
        let mut batch = WriteBatch::new();
        batch.set_catchup_chain(Vec::new());
        batch.clear_hash_tree();
        self.store.commit(batch)?;
        self.index().clear();
        tracing::info!("catchup purged");
        Ok(())
    }

    pub fn catchup_in_progress(&self) -> Result<bool, CatchupError> {
        Ok(!self.store.catchup_chain()?.is_empty())
    }

    /// Resolve a ball accepted through a hash tree whose unit is not yet
    /// permanent.
    pub fn hash_tree_unit_by_ball(&self, ball: &BallHash) -> Result<Option<UnitId>, CatchupError> {
        if let Some(unit) = self.index().get(ball) {
            return Ok(Some(unit));
        }
        Ok(self.store.hash_tree_unit(ball)?)
    }
}
