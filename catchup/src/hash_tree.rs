//! Hash trees: the balls between two adjacent catchup chain balls.
//!
//! Records are sent in `(MCI, level)` order so that every parent ball is
//! either already permanent on the requester or appears earlier in the same
//! tree. Accepted records stay in a transient table until the units
//! themselves arrive and stabilize.

use std::collections::{BTreeSet, HashMap};

use tessera_crypto::ball_hash;
use tessera_messages::{HashTreeBall, HashTreeRequest, HashTreeResponse};
use tessera_store::{
    BallStore, BatchWriter, CatchupStore, HashTreeStore, StoreError, UnitStore, WriteBatch,
};
use tessera_types::{BallHash, Mci, UnitId};

use crate::CatchupError;

/// In-memory ball to unit index mirroring the transient hash-tree table.
///
/// Changes go through an [`IndexStage`] and only land in the index when the
/// stage is committed, so an aborted batch leaves no trace.
#[derive(Debug, Default)]
pub struct HashTreeIndex {
    units_by_ball: HashMap<BallHash, UnitId>,
}

impl HashTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ball: &BallHash) -> Option<UnitId> {
        self.units_by_ball.get(ball).copied()
    }

    pub fn len(&self) -> usize {
        self.units_by_ball.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units_by_ball.is_empty()
    }

    pub fn clear(&mut self) {
        self.units_by_ball.clear();
    }

    pub fn stage(&mut self) -> IndexStage<'_> {
        IndexStage {
            index: self,
            added: HashMap::new(),
            removed: Vec::new(),
        }
    }
}

/// Pending index changes for one batch.
pub struct IndexStage<'a> {
    index: &'a mut HashTreeIndex,
    added: HashMap<BallHash, UnitId>,
    removed: Vec<BallHash>,
}

impl IndexStage<'_> {
    pub fn get(&self, ball: &BallHash) -> Option<UnitId> {
        if self.removed.contains(ball) {
            return None;
        }
        self.added.get(ball).copied().or_else(|| self.index.get(ball))
    }

    pub fn insert(&mut self, ball: BallHash, unit: UnitId) {
        self.removed.retain(|b| *b != ball);
        self.added.insert(ball, unit);
    }

    pub fn remove(&mut self, ball: BallHash) {
        self.added.remove(&ball);
        self.removed.push(ball);
    }

    pub fn commit(self) {
        for ball in &self.removed {
            self.index.units_by_ball.remove(ball);
        }
        self.index.units_by_ball.extend(self.added);
    }
}

/// Result of accepting a hash tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashTreeOutcome {
    pub accepted: usize,
    /// The catchup chain ball that the tree made redundant.
    pub dequeued: BallHash,
    /// Transient records dropped because their units became permanent.
    pub purged: usize,
    /// Highest MCI among main-chain parents that were already permanent.
    pub max_parent_mci: Option<Mci>,
}

/// Serve the records between two stable main-chain balls.
pub fn read_hash_tree<S>(store: &S, request: &HashTreeRequest) -> Result<HashTreeResponse, CatchupError>
where
    S: BallStore + ?Sized,
{
    let from_mci = stable_mc_index(store, &request.from_ball)?;
    let to_mci = stable_mc_index(store, &request.to_ball)?;
    if from_mci >= to_mci {
        return Err(CatchupError::InvalidRequest(format!(
            "from MCI {from_mci} is not before to MCI {to_mci}"
        )));
    }

    // MCI 0 holds only the root, which the requester needs as well.
    let first_mci = if from_mci == 0 { 0 } else { from_mci + 1 };
    let mut balls = Vec::new();
    for mci in first_mci..=to_mci {
        for unit in store.units_at_mci(mci)? {
            balls.push(hash_tree_record(store, &unit)?);
        }
    }
    tracing::debug!(from_mci, to_mci, records = balls.len(), "read hash tree");
    Ok(HashTreeResponse { balls })
}

fn stable_mc_index<S: BallStore + ?Sized>(store: &S, ball: &BallHash) -> Result<Mci, CatchupError> {
    let unit = store
        .unit_of_ball(ball)?
        .ok_or(CatchupError::BallNotFound(*ball))?;
    let props = store.props(&unit)?;
    if !props.is_stable {
        return Err(CatchupError::BallNotStable(*ball));
    }
    if !props.is_on_main_chain {
        return Err(CatchupError::BallNotOnMainChain(*ball));
    }
    props
        .main_chain_index
        .ok_or_else(|| StoreError::Corruption(format!("main-chain unit {unit} has no MCI")).into())
}

fn hash_tree_record<S: BallStore + ?Sized>(store: &S, unit: &UnitId) -> Result<HashTreeBall, CatchupError> {
    let props = store.props(unit)?;
    let ball = store.ball(unit)?;
    let mut parent_balls = Vec::new();
    for parent in store.parents(unit)? {
        parent_balls.push(store.ball_of(&parent)?.ok_or_else(|| {
            StoreError::Corruption(format!("parent {parent} of stable {unit} has no ball"))
        })?);
    }
    parent_balls.sort();
    let mut skiplist_balls = Vec::new();
    for target in store.skiplist_units(unit)? {
        skiplist_balls.push(store.ball(&target)?);
    }
    skiplist_balls.sort();
    Ok(HashTreeBall {
        unit: *unit,
        ball,
        is_nonserial: !props.sequence.is_good(),
        parent_balls,
        skiplist_balls,
    })
}

/// Verify and store a hash tree as one unit of work.
///
/// Every record's ball is recomputed and every parent and skiplist ball must
/// already be known, either from earlier in this tree, from the transient
/// table, or as a permanent ball. The tree's last ball must equal the
/// second ball of the catchup queue; the first ball is then dequeued. On any
/// error nothing is written and `index` is unchanged.
pub fn process_hash_tree<S>(
    store: &S,
    index: &mut HashTreeIndex,
    balls: &[HashTreeBall],
) -> Result<HashTreeOutcome, CatchupError>
where
    S: BallStore + CatchupStore + HashTreeStore + BatchWriter + ?Sized,
{
    let Some(root) = balls.last() else {
        return Err(CatchupError::InvalidRequest("empty hash tree".into()));
    };
    let genesis = store.genesis_unit()?;
    let mut stage = index.stage();
    let mut batch = WriteBatch::new();
    let mut max_parent_mci: Option<Mci> = None;

    for record in balls {
        let computed = ball_hash(
            &record.unit,
            &record.parent_balls,
            &record.skiplist_balls,
            record.is_nonserial,
        );
        if computed != record.ball {
            tracing::warn!(unit = %record.unit, ball = %record.ball, "hash tree ball mismatch");
            return Err(CatchupError::WrongBallHash {
                unit: record.unit,
                ball: record.ball,
            });
        }
        if record.parent_balls.is_empty() && genesis != Some(record.unit) {
            return Err(CatchupError::NoParents(record.unit));
        }

        for parent in &record.parent_balls {
            if known_in_tree(store, &stage, parent)? {
                continue;
            }
            let unit = store
                .unit_of_ball(parent)?
                .ok_or(CatchupError::MissingParentBalls(record.unit))?;
            let props = store.props(&unit)?;
            if props.is_on_main_chain {
                max_parent_mci = max_parent_mci.max(props.main_chain_index);
            }
        }
        for skiplist in &record.skiplist_balls {
            if !known_in_tree(store, &stage, skiplist)? && store.unit_of_ball(skiplist)?.is_none() {
                return Err(CatchupError::MissingSkiplistBalls(record.unit));
            }
        }

        stage.insert(record.ball, record.unit);
        batch.put_hash_tree_ball(record.ball, record.unit);
    }

    let chain = store.catchup_chain()?;
    if chain.len() < 2 {
        return Err(CatchupError::ChainTooShort);
    }
    if chain[1] != root.ball {
        tracing::warn!(expected = %chain[1], got = %root.ball, "hash tree root mismatch");
        return Err(CatchupError::TreeRootMismatch {
            expected: chain[1],
            got: root.ball,
        });
    }
    let dequeued = chain[0];
    batch.remove_catchup_ball(dequeued);

    let mut purged = 0;
    let mut pending: BTreeSet<BallHash> =
        store.hash_tree_balls()?.into_iter().map(|(ball, _)| ball).collect();
    pending.extend(balls.iter().map(|r| r.ball));
    for ball in pending {
        if store.unit_of_ball(&ball)?.is_some() {
            batch.delete_hash_tree_ball(ball);
            stage.remove(ball);
            purged += 1;
        }
    }

    store.commit(batch)?;
    stage.commit();
    tracing::info!(
        accepted = balls.len(),
        purged,
        max_parent_mci,
        %dequeued,
        "hash tree accepted"
    );
    Ok(HashTreeOutcome {
        accepted: balls.len(),
        dequeued,
        purged,
        max_parent_mci,
    })
}

fn known_in_tree<S: HashTreeStore + ?Sized>(
    store: &S,
    stage: &IndexStage<'_>,
    ball: &BallHash,
) -> Result<bool, CatchupError> {
    Ok(stage.get(ball).is_some() || store.hash_tree_unit(ball)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_is_discarded_unless_committed() {
        let mut index = HashTreeIndex::new();
        let a = BallHash::new([1; 32]);
        let b = BallHash::new([2; 32]);
        {
            let mut stage = index.stage();
            stage.insert(a, UnitId::new([1; 32]));
            assert_eq!(stage.get(&a), Some(UnitId::new([1; 32])));
        }
        assert!(index.is_empty());

        let mut stage = index.stage();
        stage.insert(a, UnitId::new([1; 32]));
        stage.insert(b, UnitId::new([2; 32]));
        stage.commit();
        assert_eq!(index.len(), 2);

        let mut stage = index.stage();
        stage.remove(a);
        assert_eq!(stage.get(&a), None);
        stage.commit();
        assert_eq!(index.get(&a), None);
        assert_eq!(index.get(&b), Some(UnitId::new([2; 32])));
    }
}
