//! Ball storage: checkpoint hashes of stable units.

use crate::{StoreError, UnitStore};
use tessera_types::{BallHash, Joint, UnitId};

pub trait BallStore: UnitStore {
    fn ball_of(&self, unit: &UnitId) -> Result<Option<BallHash>, StoreError>;

    fn unit_of_ball(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError>;

    /// A unit together with its ball and skiplist, as transmitted.
    fn read_joint(&self, unit: &UnitId) -> Result<Option<Joint>, StoreError> {
        let Some(content) = self.read_unit(unit)? else {
            return Ok(None);
        };
        Ok(Some(Joint {
            unit: content,
            ball: self.ball_of(unit)?,
            skiplist_units: self.skiplist_units(unit)?,
        }))
    }

    /// Ball of a unit that must already be stable.
    fn ball(&self, unit: &UnitId) -> Result<BallHash, StoreError> {
        self.ball_of(unit)?
            .ok_or_else(|| StoreError::NotFound(format!("ball of {unit}")))
    }
}
