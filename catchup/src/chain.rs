//! Catchup chains.
//!
//! The responder anchors a witness proof at the requester's last stable MCI
//! and then follows `last_ball_unit` references back to that MCI, one joint
//! per hop. The requester verifies the proof and the hops and keeps the
//! balls, oldest first, as its catchup queue; each adjacent pair of balls is
//! later filled in by a hash tree.

use tessera_crypto::has_valid_unit_hash;
use tessera_messages::{CatchupChain, CatchupRequest, CatchupResponse};
use tessera_store::{BallStore, BatchWriter, CatchupStore, DefinitionStore, StoreError, WriteBatch};
use tessera_types::{Address, BallHash, ProtocolParams};
use tessera_witness::{
    prepare_witness_proof, process_witness_proof, validate_witness_list, WitnessError,
};

use crate::CatchupError;

/// Answer a catchup request.
pub fn prepare_catchup_chain<S>(
    store: &S,
    params: &ProtocolParams,
    request: &CatchupRequest,
) -> Result<CatchupResponse, CatchupError>
where
    S: BallStore + DefinitionStore + ?Sized,
{
    let CatchupRequest {
        last_stable_mci,
        last_known_mci,
        witnesses,
    } = request;
    if last_stable_mci >= last_known_mci && (*last_known_mci > 0 || *last_stable_mci > 0) {
        return Err(CatchupError::InvalidRequest(format!(
            "last_stable_mci {last_stable_mci} >= last_known_mci {last_known_mci}"
        )));
    }
    validate_witness_list(witnesses, params)?;

    if *last_stable_mci >= store.last_stable_mci()? {
        return Ok(CatchupResponse::current());
    }

    let proof = match prepare_witness_proof(store, params, witnesses, *last_stable_mci) {
        Ok(proof) => proof,
        Err(WitnessError::AlreadyCurrent) => return Ok(CatchupResponse::current()),
        Err(e) => return Err(e.into()),
    };

    let mut stable_last_ball_joints = Vec::new();
    let mut unit = proof.last_ball_unit;
    loop {
        let joint = store
            .read_joint(&unit)?
            .ok_or_else(|| StoreError::NotFound(format!("joint {unit}")))?;
        let mci = store.props(&unit)?.main_chain_index.ok_or_else(|| {
            StoreError::Corruption(format!("stable last ball unit {unit} has no MCI"))
        })?;
        let next = joint.unit.last_ball_unit;
        stable_last_ball_joints.push(joint);
        if mci <= *last_stable_mci {
            break;
        }
        unit = next.ok_or_else(|| {
            StoreError::Corruption(format!("unit {unit} at MCI {mci} has no last ball unit"))
        })?;
    }

    tracing::info!(
        from = last_stable_mci,
        to = proof.last_ball_mci,
        hops = stable_last_ball_joints.len(),
        "prepared catchup chain"
    );
    Ok(CatchupResponse::Chain(CatchupChain {
        unstable_mc_joints: proof.unstable_mc_joints,
        stable_last_ball_joints,
        witness_change_and_definition_joints: proof.witness_change_and_definition_joints,
    }))
}

/// Verify a catchup chain and store its balls as the new catchup queue.
///
/// Returns the queued balls, oldest first. The first ball is replaced by our
/// own last stable ball when the responder started further back, so that no
/// unit is delivered twice.
pub fn process_catchup_chain<S>(
    store: &S,
    params: &ProtocolParams,
    chain: &CatchupChain,
    witnesses: &[Address],
) -> Result<Vec<BallHash>, CatchupError>
where
    S: BallStore + DefinitionStore + CatchupStore + BatchWriter + ?Sized,
{
    let Some(first) = chain.stable_last_ball_joints.first() else {
        return Err(CatchupError::ChainLinkage("no stable last ball joints".into()));
    };
    let verified = process_witness_proof(
        store,
        params,
        &chain.unstable_mc_joints,
        &chain.witness_change_and_definition_joints,
        witnesses,
        true,
    )?;

    let mut last_ball_unit = first.unit.unit;
    let mut last_ball = verified
        .last_ball_by_unit
        .get(&last_ball_unit)
        .copied()
        .ok_or_else(|| {
            CatchupError::ChainLinkage(format!(
                "first stable unit {last_ball_unit} is not a last ball unit of the proof"
            ))
        })?;

    let mut balls = Vec::with_capacity(chain.stable_last_ball_joints.len());
    for joint in &chain.stable_last_ball_joints {
        let unit = &joint.unit;
        let ball = joint.ball.ok_or(CatchupError::StableWithoutBall(unit.unit))?;
        if !has_valid_unit_hash(unit) {
            return Err(CatchupError::InvalidHash(unit.unit));
        }
        if unit.unit != last_ball_unit {
            return Err(CatchupError::ChainLinkage(format!(
                "expected last ball unit {last_ball_unit}, got {}",
                unit.unit
            )));
        }
        if ball != last_ball {
            return Err(CatchupError::ChainLinkage(format!(
                "ball {ball} of {} is not the referenced last ball {last_ball}",
                unit.unit
            )));
        }
        if let (Some(next_unit), Some(next_ball)) = (unit.last_ball_unit, unit.last_ball) {
            last_ball_unit = next_unit;
            last_ball = next_ball;
        }
        balls.push(ball);
    }
    balls.reverse();

    if !store.catchup_chain()?.is_empty() {
        return Err(CatchupError::ChainInProgress);
    }
    reconcile_first_ball(store, &mut balls)?;

    let mut batch = WriteBatch::new();
    batch.set_catchup_chain(balls.clone());
    store.commit(batch)?;
    tracing::info!(balls = balls.len(), "catchup chain accepted");
    Ok(balls)
}

/// The oldest ball must be ours, stable and on the main chain, at or below
/// our last stable MCI.
fn reconcile_first_ball<S>(store: &S, balls: &mut [BallHash]) -> Result<(), CatchupError>
where
    S: BallStore + ?Sized,
{
    let first = balls[0];
    let unit = store
        .unit_of_ball(&first)?
        .ok_or(CatchupError::BallNotFound(first))?;
    let props = store.props(&unit)?;
    if !props.is_stable {
        return Err(CatchupError::BallNotStable(first));
    }
    if !props.is_on_main_chain {
        return Err(CatchupError::BallNotOnMainChain(first));
    }
    let last_stable_mci = store.last_stable_mci()?;
    let mci = props.main_chain_index.unwrap_or(0);
    if mci > last_stable_mci {
        return Err(CatchupError::FirstBallTooNew(first));
    }
    if mci == last_stable_mci {
        return Ok(());
    }

    let our_tip = store
        .mc_unit_at(last_stable_mci)?
        .ok_or_else(|| StoreError::Corruption(format!("no main-chain unit at {last_stable_mci}")))?;
    balls[0] = store.ball(&our_tip)?;
    tracing::debug!(replaced = %first, with = %balls[0], "first chain ball moved to our stable tip");
    if let Some(second) = balls.get(1) {
        if let Some(unit) = store.unit_of_ball(second)? {
            if store.props(&unit)?.is_stable {
                return Err(CatchupError::SecondBallStable(*second));
            }
        }
    }
    Ok(())
}
