//! LMDB implementation of SpendStore.

use tessera_store::{SpendStore, StoreError};
use tessera_types::{SpendKey, UnitId};

use crate::keys::{scan_prefix, spend_prefix, trailing_unit_id};
use crate::{LmdbEnvironment, LmdbError};

impl SpendStore for LmdbEnvironment {
    fn consumers(&self, key: &SpendKey) -> Result<Vec<UnitId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let keys = scan_prefix(&self.consumers_db, &rtxn, &spend_prefix(key))?;
        Ok(keys
            .iter()
            .map(|k| trailing_unit_id(k))
            .collect::<Result<_, _>>()?)
    }
}
