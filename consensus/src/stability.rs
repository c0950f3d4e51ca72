//! Stabilization: the only path that makes units stable.
//!
//! Advancing the last stable MCI by one finalizes every unit at that MCI in
//! a single batch: sequences are resolved against already stable conflicts,
//! balls and skiplists are computed, and unstable units that lost a conflict
//! to a newly stable unit are demoted to temp-bad.

use std::collections::HashMap;

use tessera_crypto::ball_hash;
use tessera_store::{BallStore, BatchWriter, SpendStore, UnitStore, WriteBatch};
use tessera_types::{BallHash, Mci, ProtocolParams, Sequence, Unit, UnitId, UnitProps};

use crate::ancestry::{is_included_or_equal, load, parents_of};
use crate::ConsensusError;

/// Summary of one stabilized MCI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StabilizedMci {
    pub mci: Mci,
    /// Units at the MCI in `(level, unit)` order.
    pub units: Vec<UnitId>,
    /// Unstable units demoted to temp-bad.
    pub demoted: Vec<UnitId>,
}

/// Make `mci` stable. It must directly follow the current last stable MCI.
pub fn mark_mci_stable<S>(
    store: &S,
    params: &ProtocolParams,
    mci: Mci,
) -> Result<StabilizedMci, ConsensusError>
where
    S: UnitStore + BallStore + SpendStore + BatchWriter + ?Sized,
{
    let expected = store.last_stable_mci()? + 1;
    if mci != expected {
        return Err(ConsensusError::OutOfOrderStability { expected, got: mci });
    }
    if store.mc_unit_at(mci)?.is_none() {
        return Err(ConsensusError::NoMainChainUnit(mci));
    }

    let units = store.units_at_mci(mci)?;
    let mut contents: Vec<Unit> = Vec::with_capacity(units.len());
    let mut staged: HashMap<UnitId, UnitProps> = HashMap::new();
    let mut balls: HashMap<UnitId, BallHash> = HashMap::new();
    let mut batch = WriteBatch::new();

    for id in &units {
        let mut props = load(store, id)?;
        let content = store
            .read_unit(id)?
            .ok_or(ConsensusError::MissingUnit(*id))?;
        props.sequence = resolve_sequence(store, &props, &content, mci, &staged)?;
        props.is_stable = true;

        let mut parent_balls = Vec::with_capacity(content.parent_units.len());
        for parent in &content.parent_units {
            parent_balls.push(match balls.get(parent) {
                Some(ball) => *ball,
                None => store
                    .ball_of(parent)?
                    .ok_or(ConsensusError::MissingBall(*parent))?,
            });
        }

        let mut skiplist_units = Vec::new();
        let mut skiplist_balls = Vec::new();
        if props.is_on_main_chain {
            for target in params.skiplist_mcis(mci) {
                let unit = store
                    .mc_unit_at(target)?
                    .ok_or(ConsensusError::NoMainChainUnit(target))?;
                skiplist_balls.push(store.ball_of(&unit)?.ok_or(ConsensusError::MissingBall(unit))?);
                skiplist_units.push(unit);
            }
        }

        let ball = ball_hash(id, &parent_balls, &skiplist_balls, !props.sequence.is_good());
        balls.insert(*id, ball);
        batch.put_ball(*id, ball);
        if !skiplist_units.is_empty() {
            batch.put_skiplist(*id, skiplist_units);
        }
        staged.insert(*id, props);
        contents.push(content);
    }

    let mut demoted: Vec<UnitId> = Vec::new();
    for content in &contents {
        if !staged[&content.unit].sequence.is_good() {
            continue;
        }
        for key in content.spent_keys() {
            for other in store.consumers(&key)? {
                if other == content.unit || staged.contains_key(&other) || demoted.contains(&other)
                {
                    continue;
                }
                let mut props = load(store, &other)?;
                if props.is_stable || !props.sequence.is_good() {
                    continue;
                }
                if is_included_or_equal(store, &content.unit, &parents_of(store, &other)?)? {
                    continue;
                }
                tracing::debug!(unit = %other, winner = %content.unit, "demoting to temp-bad");
                props.sequence = Sequence::TempBad;
                batch.put_props(props);
                demoted.push(other);
            }
        }
    }

    for id in &units {
        if let Some(props) = staged.remove(id) {
            batch.put_props(props);
        }
    }
    batch.set_last_stable_mci(mci);
    store.commit(batch)?;

    tracing::info!(mci, units = units.len(), demoted = demoted.len(), "MCI stable");
    Ok(StabilizedMci {
        mci,
        units,
        demoted,
    })
}

/// Stabilize every MCI after the last stable one up to and including `mci`.
pub fn stabilize_up_to<S>(
    store: &S,
    params: &ProtocolParams,
    mci: Mci,
) -> Result<Vec<StabilizedMci>, ConsensusError>
where
    S: UnitStore + BallStore + SpendStore + BatchWriter + ?Sized,
{
    let mut done = Vec::new();
    let mut next = store.last_stable_mci()? + 1;
    while next <= mci {
        done.push(mark_mci_stable(store, params, next)?);
        next += 1;
    }
    Ok(done)
}

/// Final sequence of a unit becoming stable at `mci`.
///
/// An independent conflict that is already stable and good at a lower MCI
/// wins. Independent conflicts at the same MCI have no winner. A spend that
/// includes this unit is not a conflict, whichever MCI it lands on.
fn resolve_sequence<S>(
    store: &S,
    props: &UnitProps,
    content: &Unit,
    mci: Mci,
    staged: &HashMap<UnitId, UnitProps>,
) -> Result<Sequence, ConsensusError>
where
    S: UnitStore + SpendStore + ?Sized,
{
    if props.sequence == Sequence::FinalBad {
        return Ok(Sequence::FinalBad);
    }
    for key in content.spent_keys() {
        for other in store.consumers(&key)? {
            if other == content.unit {
                continue;
            }
            if is_included_or_equal(store, &other, &content.parent_units)? {
                continue;
            }
            if is_included_or_equal(store, &content.unit, &parents_of(store, &other)?)? {
                continue;
            }
            let other_props = match staged.get(&other) {
                Some(p) => p.clone(),
                None => load(store, &other)?,
            };
            match other_props.main_chain_index {
                Some(m) if m == mci => return Ok(Sequence::FinalBad),
                Some(m) if m < mci && other_props.is_stable && other_props.sequence.is_good() => {
                    return Ok(Sequence::FinalBad)
                }
                _ => {}
            }
        }
    }
    Ok(Sequence::Good)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_nullables::DagBuilder;
    use tessera_types::ProtocolParams;

    #[test]
    fn stabilizing_assigns_balls_in_order() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let mc = dag.extend_main_chain(g, 3);
        let store = dag.store().as_ref();
        let params = dag.params().clone();

        let report = mark_mci_stable(store, &params, 1).unwrap();
        assert_eq!(report.units, vec![mc[0]]);
        assert!(report.demoted.is_empty());
        let props = store.props(&mc[0]).unwrap();
        assert!(props.is_stable);
        assert_eq!(store.last_stable_mci().unwrap(), 1);

        let g_ball = store.ball(&g).unwrap();
        assert_eq!(
            store.ball(&mc[0]).unwrap(),
            ball_hash(&mc[0], &[g_ball], &[], false)
        );
        assert!(store.ball_of(&mc[1]).unwrap().is_none());
    }

    #[test]
    fn out_of_order_mci_is_rejected() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        dag.extend_main_chain(g, 3);
        let store = dag.store().as_ref();
        let err = mark_mci_stable(store, dag.params(), 2).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::OutOfOrderStability { expected: 1, got: 2 }
        ));
        let err = mark_mci_stable(store, dag.params(), 1)
            .and_then(|_| stabilize_up_to(store, dag.params(), 9))
            .unwrap_err();
        assert!(matches!(err, ConsensusError::NoMainChainUnit(4)));
        assert_eq!(store.last_stable_mci().unwrap(), 3);
    }

    #[test]
    fn skiplist_links_main_chain_units() {
        let params = ProtocolParams {
            count_witnesses: 3,
            majority_of_witnesses: 2,
            skiplist_interval: 2,
            ..ProtocolParams::default()
        };
        let mut dag = DagBuilder::with_params(params.clone());
        let g = dag.genesis();
        let mc = dag.extend_main_chain(g, 4);
        let store = dag.store().as_ref();
        stabilize_up_to(store, &params, 4).unwrap();

        assert_eq!(store.skiplist_units(&mc[1]).unwrap(), vec![g]);
        assert_eq!(store.skiplist_units(&mc[3]).unwrap(), vec![mc[1], g]);
        assert!(store.skiplist_units(&mc[2]).unwrap().is_empty());
        let expected = ball_hash(
            &mc[3],
            &[store.ball(&mc[2]).unwrap()],
            &[store.ball(&mc[1]).unwrap(), store.ball(&g).unwrap()],
            false,
        );
        assert_eq!(store.ball(&mc[3]).unwrap(), expected);
    }

    #[test]
    fn failed_commit_leaves_mci_unstable() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let mc = dag.extend_main_chain(g, 2);
        let store = dag.store().as_ref();
        store.fail_next_commit();
        assert!(mark_mci_stable(store, dag.params(), 1).is_err());
        assert!(!store.props(&mc[0]).unwrap().is_stable);
        assert!(store.ball_of(&mc[0]).unwrap().is_none());
        assert_eq!(store.last_stable_mci().unwrap(), 0);
    }
}
