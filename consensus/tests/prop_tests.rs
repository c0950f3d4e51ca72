use std::collections::HashSet;

use proptest::prelude::*;

use tessera_consensus::{compare, is_included, is_included_or_equal, UnitOrder};
use tessera_nullables::DagBuilder;
use tessera_store::UnitStore;
use tessera_types::{ProtocolParams, UnitId};

fn small_params() -> ProtocolParams {
    ProtocolParams {
        count_witnesses: 3,
        majority_of_witnesses: 2,
        ..ProtocolParams::default()
    }
}

/// Build a DAG where unit `i` picks one or two parents among earlier units,
/// then make the last unit the main-chain tip.
fn build(picks: &[(usize, Option<usize>)]) -> (DagBuilder, Vec<UnitId>) {
    let mut dag = DagBuilder::with_params(small_params());
    let mut units = vec![dag.genesis()];
    for (i, (first, second)) in picks.iter().enumerate() {
        let mut parents = vec![units[first % units.len()]];
        if let Some(second) = second {
            let p = units[second % units.len()];
            if !parents.contains(&p) {
                parents.push(p);
            }
        }
        let id = dag.unit(&parents).data(&[i as u8]).add();
        units.push(id);
    }
    let tip = *units.last().unwrap();
    dag.set_main_chain(&tip);
    (dag, units)
}

fn ancestors(dag: &DagBuilder, unit: &UnitId) -> HashSet<UnitId> {
    let store = dag.store();
    let mut seen = HashSet::new();
    let mut stack = store.parents(unit).unwrap();
    while let Some(u) = stack.pop() {
        if seen.insert(u) {
            stack.extend(store.parents(&u).unwrap());
        }
    }
    seen
}

fn picks() -> impl Strategy<Value = Vec<(usize, Option<usize>)>> {
    prop::collection::vec((0usize..32, prop::option::of(0usize..32)), 1..14)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// compare is antisymmetric and reflexive.
    #[test]
    fn compare_is_antisymmetric(picks in picks()) {
        let (dag, units) = build(&picks);
        let store = dag.store().as_ref();
        for a in &units {
            prop_assert_eq!(compare(store, a, a).unwrap(), UnitOrder::Equal);
            for b in &units {
                let ab = compare(store, a, b).unwrap();
                let ba = compare(store, b, a).unwrap();
                prop_assert_eq!(ab, ba.reverse());
            }
        }
    }

    /// An ordered pair is always an inclusion.
    #[test]
    fn before_implies_included(picks in picks()) {
        let (dag, units) = build(&picks);
        let store = dag.store().as_ref();
        for a in &units {
            for b in &units {
                if compare(store, a, b).unwrap() == UnitOrder::Before {
                    prop_assert!(is_included_or_equal(store, a, &[*b]).unwrap());
                }
            }
        }
    }

    /// compare and is_included agree with a full ancestor traversal.
    #[test]
    fn answers_match_full_traversal(picks in picks()) {
        let (dag, units) = build(&picks);
        let store = dag.store().as_ref();
        for b in &units {
            let truth = ancestors(&dag, b);
            for a in &units {
                if a == b {
                    continue;
                }
                let expected = truth.contains(a);
                prop_assert_eq!(is_included(store, a, &[*b]).unwrap(), expected);
                let order = compare(store, a, b).unwrap();
                prop_assert_eq!(order == UnitOrder::Before, expected);
            }
        }
    }
}
