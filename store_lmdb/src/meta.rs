//! Scalar bookkeeping stored in the `meta` database.

use heed::{RoTxn, RwTxn};
use tessera_store::StoreError;
use tessera_types::Mci;

use crate::{LmdbEnvironment, LmdbError};

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
const LAST_STABLE_MCI_KEY: &[u8] = b"last_stable_mci";

/// Layout version written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Serialization(format!("{what} has unexpected byte length")))?;
    Ok(u64::from_be_bytes(arr))
}

impl LmdbEnvironment {
    pub(crate) fn read_last_stable_mci(&self, txn: &RoTxn) -> Result<Mci, LmdbError> {
        match self.meta_db.get(txn, LAST_STABLE_MCI_KEY)? {
            Some(bytes) => decode_u64(bytes, "last_stable_mci"),
            None => Ok(0),
        }
    }

    pub(crate) fn write_last_stable_mci(&self, txn: &mut RwTxn, mci: Mci) -> Result<(), LmdbError> {
        self.meta_db.put(txn, LAST_STABLE_MCI_KEY, &mci.to_be_bytes())?;
        Ok(())
    }

    /// Schema version recorded in the environment; 0 for a fresh one.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .meta_db
            .get(&rtxn, SCHEMA_VERSION_KEY)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, SCHEMA_VERSION_KEY, &version.to_le_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
