//! Conflict resolution between units that consume the same resource.
//!
//! A unit is compared against every other consumer of each key it spends.
//! Consumers already in its causal past are ancestors and never conflict;
//! the rest are independent conflicts, and only stability decides between
//! those.

use std::collections::HashSet;

use tessera_store::{SpendStore, UnitStore};
use tessera_types::{Sequence, Unit, UnitId};

use crate::ancestry::{is_included_or_equal, load};
use crate::ConsensusError;

/// Outcome of classifying one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub sequence: Sequence,
    /// Other consumers of the same keys that the unit already includes.
    pub ancestors: Vec<UnitId>,
    /// Other consumers the unit does not include.
    pub conflicts: Vec<UnitId>,
}

/// Classify `unit` against the other consumers of the keys it spends.
///
/// The unit itself need not be stored yet, but its parents must be.
///
/// - no independent conflict: good;
/// - a stable, good independent conflict: final-bad;
/// - every independent conflict stable and bad: good;
/// - an unstable independent conflict that is still good: good, the
///   conflict stays open until one side stabilizes;
/// - otherwise: temp-bad.
pub fn classify<S>(store: &S, unit: &Unit) -> Result<Classification, ConsensusError>
where
    S: UnitStore + SpendStore + ?Sized,
{
    let mut seen: HashSet<UnitId> = HashSet::new();
    let mut ancestors = Vec::new();
    let mut conflicts = Vec::new();
    for key in unit.spent_keys() {
        for other in store.consumers(&key)? {
            if other == unit.unit || !seen.insert(other) {
                continue;
            }
            if is_included_or_equal(store, &other, &unit.parent_units)? {
                ancestors.push(other);
            } else {
                conflicts.push(other);
            }
        }
    }

    let sequence = if conflicts.is_empty() {
        Sequence::Good
    } else {
        let props = conflicts
            .iter()
            .map(|u| load(store, u))
            .collect::<Result<Vec<_>, _>>()?;
        if props.iter().any(|p| p.is_stable && p.sequence.is_good()) {
            Sequence::FinalBad
        } else if props.iter().all(|p| p.is_stable) {
            Sequence::Good
        } else if props.iter().any(|p| !p.is_stable && p.sequence.is_good()) {
            Sequence::Good
        } else {
            Sequence::TempBad
        }
    };

    tracing::debug!(
        unit = %unit.unit,
        %sequence,
        ancestors = ancestors.len(),
        conflicts = conflicts.len(),
        "classified unit"
    );
    Ok(Classification {
        sequence,
        ancestors,
        conflicts,
    })
}

pub fn classify_sequence<S>(store: &S, unit: &Unit) -> Result<Sequence, ConsensusError>
where
    S: UnitStore + SpendStore + ?Sized,
{
    Ok(classify(store, unit)?.sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_nullables::DagBuilder;
    use tessera_store::{BatchWriter, WriteBatch};
    use tessera_types::SpendKey;

    fn output_of(unit: UnitId) -> SpendKey {
        SpendKey {
            unit,
            message_index: 0,
            output_index: 0,
        }
    }

    #[test]
    fn unit_without_spends_is_good() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let u = dag.unit(&[g]).data(b"hello").add();
        let store = dag.store().as_ref();
        let unit = store.read_unit(&u).unwrap().unwrap();
        let c = classify(store, &unit).unwrap();
        assert_eq!(c.sequence, Sequence::Good);
        assert!(c.ancestors.is_empty() && c.conflicts.is_empty());
    }

    #[test]
    fn spend_of_ancestor_output_is_not_a_conflict() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let key = output_of(g);
        let u1 = dag.unit(&[g]).spending(key).add();
        let u2 = dag.unit(&[u1]).spending(key).add();
        let store = dag.store().as_ref();
        let c = classify(store, &store.read_unit(&u2).unwrap().unwrap()).unwrap();
        assert_eq!(c.sequence, Sequence::Good);
        assert_eq!(c.ancestors, vec![u1]);
        assert!(c.conflicts.is_empty());
    }

    #[test]
    fn open_conflict_keeps_both_good() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let key = output_of(g);
        let u1 = dag.unit(&[g]).spending(key).add();
        let u2 = dag.unit(&[g]).data(b"other branch").spending(key).add();
        let store = dag.store().as_ref();
        for (this, other) in [(u1, u2), (u2, u1)] {
            let c = classify(store, &store.read_unit(&this).unwrap().unwrap()).unwrap();
            assert_eq!(c.sequence, Sequence::Good);
            assert_eq!(c.conflicts, vec![other]);
        }
    }

    #[test]
    fn conflict_with_only_bad_unstable_units_is_temp_bad() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let key = output_of(g);
        let u1 = dag.unit(&[g]).spending(key).add();
        let u2 = dag.unit(&[g]).data(b"b").spending(key).add();
        let store = dag.store();
        let mut props = store.props(&u1).unwrap();
        props.sequence = Sequence::TempBad;
        let mut batch = WriteBatch::new();
        batch.put_props(props);
        store.commit(batch).unwrap();

        let unit = store.read_unit(&u2).unwrap().unwrap();
        assert_eq!(classify_sequence(store.as_ref(), &unit).unwrap(), Sequence::TempBad);
    }

    #[test]
    fn stable_bad_conflicts_do_not_block() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let key = output_of(g);
        let u1 = dag.unit(&[g]).spending(key).add();
        let u2 = dag.unit(&[g]).data(b"b").spending(key).add();
        let store = dag.store();
        let mut props = store.props(&u1).unwrap();
        props.sequence = Sequence::FinalBad;
        props.is_stable = true;
        let mut batch = WriteBatch::new();
        batch.put_props(props);
        store.commit(batch).unwrap();

        let unit = store.read_unit(&u2).unwrap().unwrap();
        assert_eq!(classify_sequence(store.as_ref(), &unit).unwrap(), Sequence::Good);
    }
}
