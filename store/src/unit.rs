//! Unit content and DAG-position metadata.

use crate::StoreError;
use tessera_types::{Address, Mci, Unit, UnitId, UnitProps};

/// Read access to units and their persisted DAG-position metadata.
///
/// Ancestry walks call [`UnitStore::props`] on every step, so backends
/// should keep that lookup cheap.
pub trait UnitStore {
    /// DAG-position metadata of a unit, if the unit is known.
    fn unit_props(&self, unit: &UnitId) -> Result<Option<UnitProps>, StoreError>;

    /// Full unit content, if known.
    fn read_unit(&self, unit: &UnitId) -> Result<Option<Unit>, StoreError>;

    /// Units that list `unit` among their parents.
    fn children(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError>;

    /// Every unit assigned `mci`, ordered by `(level, unit)`.
    fn units_at_mci(&self, mci: Mci) -> Result<Vec<UnitId>, StoreError>;

    /// The main-chain unit at `mci`.
    fn mc_unit_at(&self, mci: Mci) -> Result<Option<UnitId>, StoreError>;

    fn last_stable_mci(&self) -> Result<Mci, StoreError>;

    /// Skiplist targets recorded for a stable main-chain unit.
    fn skiplist_units(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError>;

    /// Units with `address` among their authors, order is backend-specific.
    fn units_by_author(&self, address: &Address) -> Result<Vec<UnitId>, StoreError>;

    /// Metadata of a unit that must exist.
    fn props(&self, unit: &UnitId) -> Result<UnitProps, StoreError> {
        self.unit_props(unit)?
            .ok_or_else(|| StoreError::NotFound(format!("unit props {unit}")))
    }

    /// Content of a unit that must exist.
    fn unit(&self, unit: &UnitId) -> Result<Unit, StoreError> {
        self.read_unit(unit)?
            .ok_or_else(|| StoreError::NotFound(format!("unit {unit}")))
    }

    fn parents(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError> {
        Ok(self.unit(unit)?.parent_units)
    }

    fn unit_exists(&self, unit: &UnitId) -> Result<bool, StoreError> {
        Ok(self.unit_props(unit)?.is_some())
    }

    /// The root unit, i.e. the main-chain unit at index 0.
    fn genesis_unit(&self) -> Result<Option<UnitId>, StoreError> {
        self.mc_unit_at(0)
    }

    /// Main-chain units above the last stable MCI, tip first.
    fn unstable_mc_units(&self) -> Result<Vec<UnitId>, StoreError> {
        let mut units = Vec::new();
        let mut mci = self.last_stable_mci()? + 1;
        while let Some(unit) = self.mc_unit_at(mci)? {
            units.push(unit);
            mci += 1;
        }
        units.reverse();
        Ok(units)
    }
}
