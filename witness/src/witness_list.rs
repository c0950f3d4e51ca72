//! Witness list checks.

use std::collections::HashSet;

use tessera_crypto::validate_address;
use tessera_store::UnitStore;
use tessera_types::{Address, ProtocolParams, Unit};

use crate::WitnessError;

/// A list must hold exactly `count_witnesses` well-formed addresses in
/// strictly ascending order.
pub fn validate_witness_list(list: &[Address], params: &ProtocolParams) -> Result<(), WitnessError> {
    if list.len() != params.count_witnesses {
        return Err(WitnessError::InvalidWitnessList(format!(
            "expected {} witnesses, got {}",
            params.count_witnesses,
            list.len()
        )));
    }
    if let Some(bad) = list.iter().find(|a| !validate_address(a.as_str())) {
        return Err(WitnessError::InvalidWitnessList(format!("bad address {bad}")));
    }
    if list.windows(2).any(|w| w[0] >= w[1]) {
        return Err(WitnessError::InvalidWitnessList(
            "witnesses must be sorted and distinct".into(),
        ));
    }
    Ok(())
}

/// Number of addresses in one list that are missing from the other,
/// whichever direction is larger.
pub fn witness_list_mutations(a: &[Address], b: &[Address]) -> usize {
    let set_a: HashSet<&Address> = a.iter().collect();
    let set_b: HashSet<&Address> = b.iter().collect();
    set_a.difference(&set_b).count().max(set_b.difference(&set_a).count())
}

pub fn lists_compatible(a: &[Address], b: &[Address], params: &ProtocolParams) -> bool {
    witness_list_mutations(a, b) <= params.max_witness_list_mutations
}

/// The witness list a unit declares, following `witness_list_unit` when the
/// list is given by reference.
pub fn witness_list_of<S: UnitStore + ?Sized>(
    store: &S,
    unit: &Unit,
) -> Result<Vec<Address>, WitnessError> {
    if !unit.witnesses.is_empty() {
        return Ok(unit.witnesses.clone());
    }
    match &unit.witness_list_unit {
        Some(reference) => {
            let referenced = store.unit(reference)?;
            if referenced.witnesses.is_empty() {
                return Err(WitnessError::InvalidWitnessList(format!(
                    "unit {reference} carries no witness list"
                )));
            }
            Ok(referenced.witnesses)
        }
        None => Err(WitnessError::InvalidWitnessList(format!(
            "unit {} declares no witnesses",
            unit.unit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_nullables::{DagBuilder, TestAuthor};

    #[test]
    fn builder_witness_list_is_valid() {
        let dag = DagBuilder::new();
        validate_witness_list(&dag.witness_addresses(), dag.params()).unwrap();
    }

    #[test]
    fn rejects_wrong_size_order_and_garbage() {
        let dag = DagBuilder::new();
        let params = dag.params();
        let list = dag.witness_addresses();

        assert!(validate_witness_list(&list[1..], params).is_err());

        let mut reversed = list.clone();
        reversed.reverse();
        assert!(validate_witness_list(&reversed, params).is_err());

        let mut duplicated = list.clone();
        duplicated[1] = duplicated[0].clone();
        assert!(validate_witness_list(&duplicated, params).is_err());

        let mut garbage = list.clone();
        garbage[0] = Address::new("NOT-AN-ADDRESS");
        assert!(validate_witness_list(&garbage, params).is_err());
    }

    #[test]
    fn mutations_are_capped() {
        let dag = DagBuilder::new();
        let params = dag.params();
        let list = dag.witness_addresses();
        let mut one_swapped = list.clone();
        one_swapped[3] = TestAuthor::from_seed(90).address;
        let mut two_swapped = one_swapped.clone();
        two_swapped[4] = TestAuthor::from_seed(91).address;

        assert_eq!(witness_list_mutations(&list, &list), 0);
        assert_eq!(witness_list_mutations(&list, &one_swapped), 1);
        assert_eq!(witness_list_mutations(&two_swapped, &list), 2);
        assert!(lists_compatible(&list, &one_swapped, params));
        assert!(!lists_compatible(&list, &two_swapped, params));
    }

    #[test]
    fn referenced_witness_list_is_followed() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let u = dag.unit(&[g]).data(b"x").add();
        let store = dag.store().as_ref();
        let unit = store.unit(&u).unwrap();
        assert!(unit.witnesses.is_empty());
        assert_eq!(witness_list_of(store, &unit).unwrap(), dag.witness_addresses());
    }
}
