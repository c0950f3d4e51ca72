//! LMDB implementation of BallStore.

use tessera_store::{BallStore, StoreError};
use tessera_types::{BallHash, UnitId};

use crate::keys::{decode_ball, decode_unit_id};
use crate::{LmdbEnvironment, LmdbError};

impl BallStore for LmdbEnvironment {
    fn ball_of(&self, unit: &UnitId) -> Result<Option<BallHash>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .balls_db
            .get(&rtxn, unit.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(decode_ball).transpose()?)
    }

    fn unit_of_ball(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .ball_units_db
            .get(&rtxn, ball.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(decode_unit_id).transpose()?)
    }
}
