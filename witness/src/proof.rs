//! Witness proofs.
//!
//! A responder walks its unstable main chain from the tip back to the last
//! stable point. Once a majority of the requester's witnesses has authored
//! units on that walk, the `last_ball` those units reference is trusted: a
//! witness majority built on top of it. The proof also carries every stable
//! unit that reveals or changes a witness definition, so the requester can
//! check witness signatures without any other history.

use std::collections::{HashMap, HashSet};

use tessera_crypto::{definition_chash, has_valid_unit_hash, unit_hash_to_sign, verify_definition};
use tessera_store::{BallStore, DefinitionStore, StoreError, UnitStore};
use tessera_types::{Address, Author, BallHash, Definition, Joint, Mci, ProtocolParams, Unit, UnitId};

use crate::WitnessError;

/// Material that lets a peer trust a recent last ball.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessProof {
    /// Unstable main-chain joints, tip first, without balls.
    pub unstable_mc_joints: Vec<Joint>,
    /// Stable joints revealing or changing witness definitions, by level.
    pub witness_change_and_definition_joints: Vec<Joint>,
    /// The newest last ball unit referenced after the witness majority.
    pub last_ball_unit: UnitId,
    pub last_ball_mci: Mci,
}

/// Outcome of a verified proof.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifiedProof {
    /// Last ball units referenced by joints at or past the witness majority,
    /// tip first.
    pub last_ball_units: Vec<UnitId>,
    pub last_ball_by_unit: HashMap<UnitId, BallHash>,
}

/// Build a proof for a peer that trusts `witnesses` and is stable up to
/// `last_stable_mci`.
pub fn prepare_witness_proof<S>(
    store: &S,
    params: &ProtocolParams,
    witnesses: &[Address],
    last_stable_mci: Mci,
) -> Result<WitnessProof, WitnessError>
where
    S: BallStore + DefinitionStore + ?Sized,
{
    let mut found: HashSet<&Address> = HashSet::new();
    let mut unstable_mc_joints = Vec::new();
    let mut candidates: Vec<UnitId> = Vec::new();

    for unit in store.unstable_mc_units()? {
        let mut joint = store
            .read_joint(&unit)?
            .ok_or_else(|| StoreError::NotFound(format!("joint {unit}")))?;
        // The unit may have stabilized since the main chain was read.
        joint.ball = None;
        joint.skiplist_units.clear();
        for address in joint.unit.author_addresses() {
            if let Some(w) = witnesses.iter().find(|w| *w == address) {
                found.insert(w);
            }
        }
        if found.len() >= params.majority_of_witnesses {
            if let Some(last_ball_unit) = joint.unit.last_ball_unit {
                candidates.push(last_ball_unit);
            }
        }
        unstable_mc_joints.push(joint);
    }

    if found.len() < params.majority_of_witnesses {
        return Err(WitnessError::NotEnoughWitnesses {
            found: found.len(),
            required: params.majority_of_witnesses,
        });
    }

    let mut anchor: Option<(Mci, UnitId)> = None;
    for unit in candidates {
        let mci = store
            .props(&unit)?
            .main_chain_index
            .ok_or_else(|| StoreError::Corruption(format!("last ball unit {unit} has no MCI")))?;
        if anchor.map_or(true, |(best, _)| mci > best) {
            anchor = Some((mci, unit));
        }
    }
    let (last_ball_mci, last_ball_unit) = anchor.ok_or(WitnessError::NoLastBallUnits)?;
    if last_stable_mci >= last_ball_mci {
        return Err(WitnessError::AlreadyCurrent);
    }

    let mut witness_change_and_definition_joints = Vec::new();
    for unit in store.definition_units(witnesses, last_stable_mci)? {
        let joint = store
            .read_joint(&unit)?
            .ok_or_else(|| StoreError::NotFound(format!("joint {unit}")))?;
        witness_change_and_definition_joints.push(joint);
    }

    tracing::debug!(
        unstable = unstable_mc_joints.len(),
        definitions = witness_change_and_definition_joints.len(),
        %last_ball_unit,
        last_ball_mci,
        "prepared witness proof"
    );
    Ok(WitnessProof {
        unstable_mc_joints,
        witness_change_and_definition_joints,
        last_ball_unit,
        last_ball_mci,
    })
}

/// Verify a witness proof. Any failure rejects the whole proof.
///
/// Unstable joints must form one parent-to-child path, tip first, and
/// reach a witness majority. Definition joints are replayed oldest first to
/// track the definition chash each witness currently signs with; the walk
/// starts from the chashes known locally at the last stable MCI when
/// `from_current` is set, or from the bare addresses otherwise.
pub fn process_witness_proof<S>(
    store: &S,
    params: &ProtocolParams,
    unstable_mc_joints: &[Joint],
    definition_joints: &[Joint],
    witnesses: &[Address],
    from_current: bool,
) -> Result<VerifiedProof, WitnessError>
where
    S: DefinitionStore + ?Sized,
{
    let mut found: HashSet<&Address> = HashSet::new();
    let mut witness_units: Vec<&Unit> = Vec::new();
    let mut expected_parents: Option<&[UnitId]> = None;
    let mut verified = VerifiedProof::default();

    for joint in unstable_mc_joints {
        let unit = &joint.unit;
        if joint.ball.is_some() {
            return Err(WitnessError::UnexpectedBall(unit.unit));
        }
        if !has_valid_unit_hash(unit) {
            return Err(WitnessError::InvalidHash(unit.unit));
        }
        if let Some(parents) = expected_parents {
            if !parents.contains(&unit.unit) {
                return Err(WitnessError::NotInParents(unit.unit));
            }
        }
        let mut by_witness = false;
        for address in unit.author_addresses() {
            if let Some(w) = witnesses.iter().find(|w| *w == address) {
                found.insert(w);
                by_witness = true;
            }
        }
        if by_witness {
            witness_units.push(unit);
        }
        expected_parents = Some(&unit.parent_units);
        if found.len() >= params.majority_of_witnesses {
            if let (Some(last_ball_unit), Some(last_ball)) = (unit.last_ball_unit, unit.last_ball) {
                verified.last_ball_units.push(last_ball_unit);
                verified.last_ball_by_unit.insert(last_ball_unit, last_ball);
            }
        }
    }
    if found.len() < params.majority_of_witnesses {
        tracing::warn!(found = found.len(), "witness proof without majority");
        return Err(WitnessError::NotEnoughWitnesses {
            found: found.len(),
            required: params.majority_of_witnesses,
        });
    }

    let mut signers = ActiveDefinitions::seed(store, witnesses, from_current)?;

    for joint in definition_joints {
        let unit = &joint.unit;
        if joint.ball.is_none() {
            return Err(WitnessError::MissingBall(unit.unit));
        }
        if !has_valid_unit_hash(unit) {
            return Err(WitnessError::InvalidHash(unit.unit));
        }
        let authors: Vec<&Author> = unit
            .authors
            .iter()
            .filter(|a| witnesses.contains(&a.address))
            .collect();
        if authors.is_empty() {
            return Err(WitnessError::NotAuthoredByWitness(unit.unit));
        }
        let mut relevant = false;
        for author in &authors {
            relevant |= author.definition.is_some();
            signers.verify(store, unit, author)?;
        }
        for author in &authors {
            if let Some(chash) = unit.definition_change_for(&author.address) {
                signers.change(&author.address, chash.clone());
                relevant = true;
            }
        }
        if !relevant {
            return Err(WitnessError::NeitherDefinitionNorChange(unit.unit));
        }
    }

    for unit in witness_units {
        for author in unit.authors.iter().filter(|a| witnesses.contains(&a.address)) {
            signers.verify(store, unit, author)?;
        }
    }

    if verified.last_ball_units.is_empty() {
        return Err(WitnessError::NoLastBallUnits);
    }
    Ok(verified)
}

/// Definition chash each witness signs with, plus definitions learned from
/// the proof itself.
struct ActiveDefinitions {
    chashes: HashMap<Address, Address>,
    definitions: HashMap<Address, Definition>,
}

impl ActiveDefinitions {
    fn seed<S: DefinitionStore + ?Sized>(
        store: &S,
        witnesses: &[Address],
        from_current: bool,
    ) -> Result<Self, WitnessError> {
        let last_stable_mci = store.last_stable_mci()?;
        let mut chashes = HashMap::with_capacity(witnesses.len());
        for address in witnesses {
            let chash = if from_current {
                store.definition_chash_at(address, last_stable_mci)?
            } else {
                address.clone()
            };
            chashes.insert(address.clone(), chash);
        }
        Ok(Self {
            chashes,
            definitions: HashMap::new(),
        })
    }

    fn change(&mut self, address: &Address, chash: Address) {
        tracing::debug!(%address, %chash, "witness definition changed");
        self.chashes.insert(address.clone(), chash);
    }

    fn verify<S: DefinitionStore + ?Sized>(
        &mut self,
        store: &S,
        unit: &Unit,
        author: &Author,
    ) -> Result<(), WitnessError> {
        let address = &author.address;
        let chash = self
            .chashes
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.clone());
        if let Some(definition) = &author.definition {
            if definition_chash(definition) != chash {
                return Err(WitnessError::DefinitionMismatch {
                    unit: unit.unit,
                    address: address.clone(),
                    expected: chash,
                });
            }
            self.definitions.insert(chash.clone(), definition.clone());
        }
        let definition = match self.definitions.get(&chash) {
            Some(definition) => definition.clone(),
            None => {
                let definition = store.definition(&chash)?.ok_or_else(|| {
                    WitnessError::UnknownDefinition {
                        address: address.clone(),
                        chash: chash.clone(),
                    }
                })?;
                self.definitions.insert(chash.clone(), definition.clone());
                definition
            }
        };
        if !verify_definition(&definition, &author.authentifiers, &unit_hash_to_sign(unit)) {
            tracing::warn!(unit = %unit.unit, %address, "witness signature rejected");
            return Err(WitnessError::InvalidSignature {
                unit: unit.unit,
                address: address.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_consensus::stabilize_up_to;
    use tessera_nullables::DagBuilder;

    /// Twelve witness units, MCIs 1..=5 stable, then ten more witness units
    /// referencing the ball at MCI 5.
    fn synced_dag() -> DagBuilder {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let tip = *dag.extend_main_chain(g, 12).last().unwrap();
        let params = dag.params().clone();
        stabilize_up_to(dag.store().as_ref(), &params, 5).unwrap();
        dag.extend_main_chain(tip, 10);
        dag
    }

    #[test]
    fn prepare_anchors_at_latest_stable_ball() {
        let dag = synced_dag();
        let store = dag.store().as_ref();
        let proof =
            prepare_witness_proof(store, dag.params(), &dag.witness_addresses(), 0).unwrap();
        assert_eq!(proof.last_ball_mci, 5);
        assert_eq!(proof.last_ball_unit, dag.mc_unit(5).unwrap());
        assert_eq!(proof.unstable_mc_joints.len(), 17);
        assert!(proof.unstable_mc_joints.iter().all(|j| j.ball.is_none()));
        assert_eq!(
            proof.witness_change_and_definition_joints[0].unit.unit,
            dag.genesis()
        );
    }

    #[test]
    fn prepare_reports_already_current() {
        let dag = synced_dag();
        let err = prepare_witness_proof(dag.store().as_ref(), dag.params(), &dag.witness_addresses(), 5)
            .unwrap_err();
        assert!(matches!(err, WitnessError::AlreadyCurrent));
    }

    #[test]
    fn prepared_proof_verifies() {
        let dag = synced_dag();
        let store = dag.store().as_ref();
        let witnesses = dag.witness_addresses();
        let proof = prepare_witness_proof(store, dag.params(), &witnesses, 0).unwrap();
        let verified = process_witness_proof(
            store,
            dag.params(),
            &proof.unstable_mc_joints,
            &proof.witness_change_and_definition_joints,
            &witnesses,
            false,
        )
        .unwrap();
        assert_eq!(verified.last_ball_units[0], proof.last_ball_unit);
        assert_eq!(
            verified.last_ball_by_unit[&proof.last_ball_unit],
            store.ball(&proof.last_ball_unit).unwrap()
        );
    }

    #[test]
    fn gap_in_main_chain_is_rejected() {
        let dag = synced_dag();
        let store = dag.store().as_ref();
        let witnesses = dag.witness_addresses();
        let mut proof = prepare_witness_proof(store, dag.params(), &witnesses, 0).unwrap();
        proof.unstable_mc_joints.remove(2);
        let err = process_witness_proof(
            store,
            dag.params(),
            &proof.unstable_mc_joints,
            &proof.witness_change_and_definition_joints,
            &witnesses,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WitnessError::NotInParents(_)));
    }

    #[test]
    fn tampered_unit_is_rejected() {
        let dag = synced_dag();
        let store = dag.store().as_ref();
        let witnesses = dag.witness_addresses();
        let mut proof = prepare_witness_proof(store, dag.params(), &witnesses, 0).unwrap();
        proof.unstable_mc_joints[0].unit.timestamp = tessera_types::Timestamp::new(1);
        let err = process_witness_proof(
            store,
            dag.params(),
            &proof.unstable_mc_joints,
            &proof.witness_change_and_definition_joints,
            &witnesses,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WitnessError::InvalidHash(_)));
    }

    #[test]
    fn ball_on_unstable_joint_is_rejected() {
        let dag = synced_dag();
        let store = dag.store().as_ref();
        let witnesses = dag.witness_addresses();
        let mut proof = prepare_witness_proof(store, dag.params(), &witnesses, 0).unwrap();
        proof.unstable_mc_joints[1].ball = Some(BallHash::new([1; 32]));
        let err = process_witness_proof(
            store,
            dag.params(),
            &proof.unstable_mc_joints,
            &proof.witness_change_and_definition_joints,
            &witnesses,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WitnessError::UnexpectedBall(_)));
    }
}
