//! Address definitions and their change history.

use crate::{StoreError, UnitStore};
use tessera_types::{Address, Definition, Mci, UnitId};

pub trait DefinitionStore: UnitStore {
    /// A definition revealed anywhere in the DAG, keyed by its chash.
    fn definition(&self, chash: &Address) -> Result<Option<Definition>, StoreError>;

    /// The definition chash controlling `address` as of `max_mci`.
    ///
    /// Only stable, good definition changes count. An address that never
    /// changed its definition is controlled by itself.
    fn definition_chash_at(&self, address: &Address, max_mci: Mci) -> Result<Address, StoreError> {
        let mut latest: Option<((Mci, u64), Address)> = None;
        for id in self.units_by_author(address)? {
            let props = self.props(&id)?;
            if !props.is_stable || !props.sequence.is_good() {
                continue;
            }
            let Some(mci) = props.main_chain_index.filter(|m| *m <= max_mci) else {
                continue;
            };
            let unit = self.unit(&id)?;
            if let Some(chash) = unit.definition_change_for(address) {
                let position = (mci, props.level);
                if latest.as_ref().map_or(true, |(p, _)| position > *p) {
                    latest = Some((position, chash.clone()));
                }
            }
        }
        Ok(latest.map_or_else(|| address.clone(), |(_, chash)| chash))
    }

    /// Stable, good units by any of `addresses` that reveal a definition or
    /// change one, ordered by level.
    ///
    /// With `since_mci > 0`, only units whose latest included MCI is at
    /// least `since_mci` are returned.
    fn definition_units(
        &self,
        addresses: &[Address],
        since_mci: Mci,
    ) -> Result<Vec<UnitId>, StoreError> {
        let mut found: Vec<(u64, UnitId)> = Vec::new();
        for address in addresses {
            for id in self.units_by_author(address)? {
                if found.iter().any(|(_, u)| *u == id) {
                    continue;
                }
                let props = self.props(&id)?;
                if !props.is_stable || !props.sequence.is_good() {
                    continue;
                }
                if since_mci > 0 && props.latest_included_mc_index.map_or(true, |l| l < since_mci) {
                    continue;
                }
                let unit = self.unit(&id)?;
                let reveals = unit
                    .authors
                    .iter()
                    .any(|a| &a.address == address && a.definition.is_some());
                if reveals || unit.definition_change_for(address).is_some() {
                    found.push((props.level, id));
                }
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }
}
