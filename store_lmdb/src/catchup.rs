//! LMDB implementation of CatchupStore and HashTreeStore.

use heed::RoTxn;

use tessera_store::{CatchupStore, HashTreeStore, StoreError};
use tessera_types::{BallHash, UnitId};

use crate::keys::{decode_ball, decode_unit_id};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    /// Queue entries as `(position key, ball)`, oldest first.
    pub(crate) fn read_catchup_entries(
        &self,
        txn: &RoTxn,
    ) -> Result<Vec<(Vec<u8>, BallHash)>, LmdbError> {
        let mut entries = Vec::new();
        for entry in self.catchup_db.iter(txn)? {
            let (key, val) = entry?;
            entries.push((key.to_vec(), decode_ball(val)?));
        }
        Ok(entries)
    }
}

impl CatchupStore for LmdbEnvironment {
    fn catchup_chain(&self) -> Result<Vec<BallHash>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .read_catchup_entries(&rtxn)?
            .into_iter()
            .map(|(_, ball)| ball)
            .collect())
    }
}

impl HashTreeStore for LmdbEnvironment {
    fn hash_tree_unit(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .hash_tree_db
            .get(&rtxn, ball.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(decode_unit_id).transpose()?)
    }

    fn hash_tree_balls(&self) -> Result<Vec<(BallHash, UnitId)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for entry in self.hash_tree_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, val) = entry.map_err(LmdbError::from)?;
            out.push((decode_ball(key)?, decode_unit_id(val)?));
        }
        Ok(out)
    }
}
