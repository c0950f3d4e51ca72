//! Index of resource consumers.

use crate::StoreError;
use tessera_types::{SpendKey, UnitId};

pub trait SpendStore {
    /// Every stored unit that consumes `key`, in insertion order.
    fn consumers(&self, key: &SpendKey) -> Result<Vec<UnitId>, StoreError>;
}
