//! Batch commit: every staged operation runs inside one LMDB write
//! transaction. If any operation fails the transaction is dropped and
//! LMDB aborts it, so nothing in the batch persists.

use heed::RwTxn;

use tessera_store::{BatchOp, BatchWriter, StoreError, WriteBatch};
use tessera_types::UnitProps;

use crate::keys::{address_prefix, mci_unit_key, pair_key, spend_prefix};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    fn apply(&self, txn: &mut RwTxn, op: BatchOp) -> Result<(), LmdbError> {
        match op {
            BatchOp::PutUnit(unit) => {
                let id = unit.unit;
                if self.units_db.get(txn, id.as_bytes())?.is_some() {
                    return Ok(());
                }
                for parent in &unit.parent_units {
                    let key = pair_key(parent.as_bytes(), id.as_bytes());
                    self.children_db.put(txn, &key, &[])?;
                }
                for address in unit.author_addresses() {
                    let key = pair_key(&address_prefix(address), id.as_bytes());
                    self.authored_db.put(txn, &key, &[])?;
                }
                for spend in unit.spent_keys() {
                    let key = pair_key(&spend_prefix(&spend), id.as_bytes());
                    self.consumers_db.put(txn, &key, &[])?;
                }
                let bytes = bincode::serialize(&*unit)?;
                self.units_db.put(txn, id.as_bytes(), &bytes)?;
            }
            BatchOp::PutProps(props) => self.put_props(txn, &props)?,
            BatchOp::PutBall { unit, ball } => {
                self.balls_db.put(txn, unit.as_bytes(), ball.as_bytes())?;
                self.ball_units_db.put(txn, ball.as_bytes(), unit.as_bytes())?;
            }
            BatchOp::PutSkiplist {
                unit,
                skiplist_units,
            } => {
                let bytes = bincode::serialize(&skiplist_units)?;
                self.skiplist_db.put(txn, unit.as_bytes(), &bytes)?;
            }
            BatchOp::PutDefinition { chash, definition } => {
                let bytes = bincode::serialize(&definition)?;
                self.definitions_db
                    .put(txn, chash.as_str().as_bytes(), &bytes)?;
            }
            BatchOp::SetLastStableMci(mci) => self.write_last_stable_mci(txn, mci)?,
            BatchOp::SetCatchupChain(balls) => {
                self.catchup_db.clear(txn)?;
                for (position, ball) in balls.iter().enumerate() {
                    self.catchup_db
                        .put(txn, &(position as u64).to_be_bytes(), ball.as_bytes())?;
                }
            }
            BatchOp::RemoveCatchupBall(ball) => {
                for (key, queued) in self.read_catchup_entries(txn)? {
                    if queued == ball {
                        self.catchup_db.delete(txn, &key)?;
                    }
                }
            }
            BatchOp::PutHashTreeBall { ball, unit } => {
                self.hash_tree_db.put(txn, ball.as_bytes(), unit.as_bytes())?;
            }
            BatchOp::DeleteHashTreeBall(ball) => {
                self.hash_tree_db.delete(txn, ball.as_bytes())?;
            }
            BatchOp::ClearHashTree => self.hash_tree_db.clear(txn)?,
        }
        Ok(())
    }

    /// Overwrite props and move the MCI and main-chain index entries with them.
    fn put_props(&self, txn: &mut RwTxn, props: &UnitProps) -> Result<(), LmdbError> {
        let unit = props.unit;
        if let Some(old) = self.get_props(txn, &unit)? {
            if let Some(mci) = old.main_chain_index {
                self.mci_units_db
                    .delete(txn, &mci_unit_key(mci, old.level, &unit))?;
                if old.is_on_main_chain {
                    let current = self.main_chain_db.get(txn, &mci.to_be_bytes())?;
                    if current == Some(unit.as_bytes().as_slice()) {
                        self.main_chain_db.delete(txn, &mci.to_be_bytes())?;
                    }
                }
            }
        }

        let bytes = bincode::serialize(props)?;
        self.props_db.put(txn, unit.as_bytes(), &bytes)?;
        if let Some(mci) = props.main_chain_index {
            self.mci_units_db
                .put(txn, &mci_unit_key(mci, props.level, &unit), &[])?;
            if props.is_on_main_chain {
                self.main_chain_db
                    .put(txn, &mci.to_be_bytes(), unit.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl BatchWriter for LmdbEnvironment {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let ops = batch.len();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for op in batch.into_ops() {
            self.apply(&mut wtxn, op)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::trace!(ops, "committed write batch");
        Ok(())
    }
}
