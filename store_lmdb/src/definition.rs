//! LMDB implementation of DefinitionStore.

use tessera_store::{DefinitionStore, StoreError};
use tessera_types::{Address, Definition};

use crate::{LmdbEnvironment, LmdbError};

impl DefinitionStore for LmdbEnvironment {
    fn definition(&self, chash: &Address) -> Result<Option<Definition>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .definitions_db
            .get(&rtxn, chash.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }
}
