//! Staged mutations, applied all-or-nothing.
//!
//! Engines never write through the read traits. They stage every change
//! in a [`WriteBatch`] and hand it to [`BatchWriter::commit`], which applies
//! the operations in order inside one backend transaction. A batch that is
//! dropped, or whose commit fails, leaves the store untouched.

use crate::StoreError;
use tessera_types::{Address, BallHash, Definition, Mci, Unit, UnitId, UnitProps};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    /// Store unit content and index its parents, authors and spent keys.
    PutUnit(Box<Unit>),
    /// Insert or overwrite a unit's DAG-position metadata.
    PutProps(UnitProps),
    PutBall { unit: UnitId, ball: BallHash },
    PutSkiplist { unit: UnitId, skiplist_units: Vec<UnitId> },
    PutDefinition { chash: Address, definition: Definition },
    SetLastStableMci(Mci),
    /// Replace the catchup queue; an empty list ends the catchup.
    SetCatchupChain(Vec<BallHash>),
    RemoveCatchupBall(BallHash),
    PutHashTreeBall { ball: BallHash, unit: UnitId },
    DeleteHashTreeBall(BallHash),
    ClearHashTree,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn put_unit(&mut self, unit: Unit) {
        self.push(BatchOp::PutUnit(Box::new(unit)));
    }

    pub fn put_props(&mut self, props: UnitProps) {
        self.push(BatchOp::PutProps(props));
    }

    pub fn put_ball(&mut self, unit: UnitId, ball: BallHash) {
        self.push(BatchOp::PutBall { unit, ball });
    }

    pub fn put_skiplist(&mut self, unit: UnitId, skiplist_units: Vec<UnitId>) {
        self.push(BatchOp::PutSkiplist {
            unit,
            skiplist_units,
        });
    }

    pub fn put_definition(&mut self, chash: Address, definition: Definition) {
        self.push(BatchOp::PutDefinition { chash, definition });
    }

    pub fn set_last_stable_mci(&mut self, mci: Mci) {
        self.push(BatchOp::SetLastStableMci(mci));
    }

    pub fn set_catchup_chain(&mut self, balls: Vec<BallHash>) {
        self.push(BatchOp::SetCatchupChain(balls));
    }

    pub fn remove_catchup_ball(&mut self, ball: BallHash) {
        self.push(BatchOp::RemoveCatchupBall(ball));
    }

    pub fn put_hash_tree_ball(&mut self, ball: BallHash, unit: UnitId) {
        self.push(BatchOp::PutHashTreeBall { ball, unit });
    }

    pub fn delete_hash_tree_ball(&mut self, ball: BallHash) {
        self.push(BatchOp::DeleteHashTreeBall(ball));
    }

    pub fn clear_hash_tree(&mut self) {
        self.push(BatchOp::ClearHashTree);
    }

    /// Append every operation of `other`, preserving order.
    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Applies a [`WriteBatch`] atomically.
pub trait BatchWriter {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
