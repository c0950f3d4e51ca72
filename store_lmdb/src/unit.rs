//! LMDB implementation of UnitStore.

use heed::RoTxn;

use tessera_store::{StoreError, UnitStore};
use tessera_types::{Address, Mci, Unit, UnitId, UnitProps};

use crate::keys::{address_prefix, decode_unit_id, mci_prefix, scan_prefix, trailing_unit_id};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    pub(crate) fn get_props(
        &self,
        txn: &RoTxn,
        unit: &UnitId,
    ) -> Result<Option<UnitProps>, LmdbError> {
        match self.props_db.get(txn, unit.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn get_unit(&self, txn: &RoTxn, unit: &UnitId) -> Result<Option<Unit>, LmdbError> {
        match self.units_db.get(txn, unit.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn suffix_units(
        &self,
        db: &crate::environment::Table,
        txn: &RoTxn,
        prefix: &[u8],
    ) -> Result<Vec<UnitId>, LmdbError> {
        scan_prefix(db, txn, prefix)?
            .iter()
            .map(|key| trailing_unit_id(key))
            .collect()
    }
}

impl UnitStore for LmdbEnvironment {
    fn unit_props(&self, unit: &UnitId) -> Result<Option<UnitProps>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.get_props(&rtxn, unit)?)
    }

    fn read_unit(&self, unit: &UnitId) -> Result<Option<Unit>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.get_unit(&rtxn, unit)?)
    }

    fn children(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.suffix_units(&self.children_db, &rtxn, unit.as_bytes())?)
    }

    fn units_at_mci(&self, mci: Mci) -> Result<Vec<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.suffix_units(&self.mci_units_db, &rtxn, &mci_prefix(mci))?)
    }

    fn mc_unit_at(&self, mci: Mci) -> Result<Option<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .main_chain_db
            .get(&rtxn, &mci.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(decode_unit_id).transpose()?)
    }

    fn last_stable_mci(&self) -> Result<Mci, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_last_stable_mci(&rtxn)?)
    }

    fn skiplist_units(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .skiplist_db
            .get(&rtxn, unit.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?),
            None => Ok(Vec::new()),
        }
    }

    fn units_by_author(&self, address: &Address) -> Result<Vec<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.suffix_units(&self.authored_db, &rtxn, &address_prefix(address))?)
    }
}
