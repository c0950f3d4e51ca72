//! Deterministic DAG fixtures.
//!
//! `DagBuilder` stands in for the parts of a node that sit outside the
//! consensus core: it signs and stores units, picks best parents, and
//! assigns main-chain indexes when told which free unit is the tip.
//! The best parent is the one with the highest witnessed level, then the
//! highest level, then the one already on the main chain, then the smallest
//! id, so a chain extended on top of a unit keeps that unit's branch as its
//! main chain.
//! Stabilization is left to the consensus engine under test.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tessera_crypto::{
    ball_hash, definition_chash, keypair_from_seed, sign_author, unit_hash,
};
use tessera_store::{BallStore, BatchWriter, DefinitionStore, UnitStore, WriteBatch};
use tessera_types::{
    Address, Author, BallHash, Definition, DefinitionChange, KeyPair, Level, Message, Payload,
    Payment, ProtocolParams, SpendKey, Timestamp, Unit, UnitId, UnitProps,
};

use crate::NullStore;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const DEFAULT_AUTHOR_SEED: u8 = 200;

/// A signing identity with a deterministic key.
#[derive(Clone, Debug)]
pub struct TestAuthor {
    pub address: Address,
    pub definition: Definition,
    seed: [u8; 32],
}

impl TestAuthor {
    pub fn from_seed(seed: u8) -> Self {
        let seed = [seed; 32];
        let definition = Definition::Sig {
            pubkey: keypair_from_seed(&seed).public,
        };
        Self {
            address: definition_chash(&definition),
            definition,
            seed,
        }
    }

    /// The same address controlled by a fresh key, as after a definition change.
    pub fn rotated(&self, seed: u8) -> Self {
        let fresh = Self::from_seed(seed);
        Self {
            address: self.address.clone(),
            ..fresh
        }
    }

    pub fn definition_chash(&self) -> Address {
        definition_chash(&self.definition)
    }

    pub fn keypair(&self) -> KeyPair {
        keypair_from_seed(&self.seed)
    }
}

/// A unit under construction. Finish with [`UnitSpec::add`].
pub struct UnitSpec<'a> {
    dag: &'a mut DagBuilder,
    parents: Vec<UnitId>,
    authors: Vec<TestAuthor>,
    messages: Vec<Message>,
}

impl UnitSpec<'_> {
    pub fn by(mut self, author: &TestAuthor) -> Self {
        self.authors.push(author.clone());
        self
    }

    pub fn spending(mut self, key: SpendKey) -> Self {
        self.messages.push(Message {
            payload: Payload::Payment(Payment {
                inputs: vec![key],
                outputs: Vec::new(),
            }),
        });
        self
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.messages.push(Message {
            payload: Payload::Data(bytes.to_vec()),
        });
        self
    }

    /// Hand control of `to.address` over to `to`'s definition.
    pub fn change_definition(mut self, to: &TestAuthor) -> Self {
        self.messages.push(Message {
            payload: Payload::AddressDefinitionChange(DefinitionChange {
                address: Some(to.address.clone()),
                definition_chash: to.definition_chash(),
            }),
        });
        self
    }

    pub fn add(self) -> UnitId {
        let authors = if self.authors.is_empty() {
            vec![TestAuthor::from_seed(DEFAULT_AUTHOR_SEED)]
        } else {
            self.authors
        };
        self.dag.insert(self.parents, authors, self.messages)
    }
}

/// Builds signed DAGs in a [`NullStore`].
pub struct DagBuilder {
    store: Arc<NullStore>,
    params: ProtocolParams,
    witnesses: Vec<TestAuthor>,
    genesis: UnitId,
    revealed: HashSet<(Address, Address)>,
    next_timestamp: u64,
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::with_params(ProtocolParams::default())
    }

    /// Start a DAG with a stable genesis unit authored by the witnesses.
    pub fn with_params(params: ProtocolParams) -> Self {
        let mut witnesses: Vec<TestAuthor> = (1..=params.count_witnesses)
            .map(|i| TestAuthor::from_seed(i as u8))
            .collect();
        witnesses.sort_by(|a, b| a.address.cmp(&b.address));

        let mut dag = Self {
            store: Arc::new(NullStore::new()),
            params,
            witnesses,
            genesis: UnitId::ZERO,
            revealed: HashSet::new(),
            next_timestamp: GENESIS_TIMESTAMP,
        };
        dag.genesis = dag.create_genesis();
        dag
    }

    pub fn store(&self) -> &Arc<NullStore> {
        &self.store
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn genesis(&self) -> UnitId {
        self.genesis
    }

    pub fn witnesses(&self) -> &[TestAuthor] {
        &self.witnesses
    }

    pub fn witness_addresses(&self) -> Vec<Address> {
        self.witnesses.iter().map(|w| w.address.clone()).collect()
    }

    /// Replace a witness's signing identity, e.g. after a definition change.
    pub fn set_witness(&mut self, author: TestAuthor) {
        if let Some(w) = self.witnesses.iter_mut().find(|w| w.address == author.address) {
            *w = author;
        }
    }

    pub fn unit(&mut self, parents: &[UnitId]) -> UnitSpec<'_> {
        UnitSpec {
            dag: self,
            parents: parents.to_vec(),
            authors: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Append a single-parent chain on top of `from`, one unit per entry of
    /// `authors`. Returns the new units oldest first.
    pub fn extend_chain(&mut self, from: UnitId, authors: &[TestAuthor]) -> Vec<UnitId> {
        let mut tip = from;
        let mut out = Vec::with_capacity(authors.len());
        for author in authors {
            tip = self.unit(&[tip]).by(author).add();
            out.push(tip);
        }
        out
    }

    /// Append `count` units, authored by the witnesses in turn, and make the
    /// last one the main-chain tip.
    pub fn extend_main_chain(&mut self, from: UnitId, count: usize) -> Vec<UnitId> {
        let authors: Vec<TestAuthor> = (0..count)
            .map(|i| self.witnesses[i % self.witnesses.len()].clone())
            .collect();
        let units = self.extend_chain(from, &authors);
        if let Some(tip) = units.last() {
            self.set_main_chain(tip);
        }
        units
    }

    /// Everything a fresh node needs to start from the same genesis: the
    /// unit, its stable props and ball, and the definitions it reveals.
    pub fn genesis_batch(&self) -> WriteBatch {
        let store = &self.store;
        let unit = store.unit(&self.genesis).unwrap();
        let mut batch = WriteBatch::new();
        for signer in &self.witnesses {
            if let Some(definition) = store.definition(&signer.address).unwrap() {
                batch.put_definition(signer.address.clone(), definition);
            }
        }
        batch.put_props(store.props(&self.genesis).unwrap());
        batch.put_ball(self.genesis, store.ball(&self.genesis).unwrap());
        batch.put_unit(unit);
        batch.set_last_stable_mci(0);
        batch
    }

    pub fn mc_unit(&self, mci: u64) -> Option<UnitId> {
        self.store.mc_unit_at(mci).unwrap()
    }

    /// Rebuild the unstable part of the main chain so that it ends at `tip`.
    ///
    /// The best-parent path from `tip` must reach the last stable main-chain
    /// unit. Every unstable unit included by the new main chain gets the
    /// index of the first main-chain unit that includes it; LIMCIs are then
    /// recomputed in level order.
    pub fn set_main_chain(&mut self, tip: &UnitId) {
        let store = Arc::clone(&self.store);
        let mut path = Vec::new();
        let mut cursor = *tip;
        let base = loop {
            let props = store.props(&cursor).unwrap();
            if props.is_stable {
                assert!(props.is_on_main_chain, "main chain must pass through stable main chain");
                break props;
            }
            path.push(cursor);
            cursor = props.best_parent_unit.expect("unstable unit without best parent");
        };
        let base_mci = base.main_chain_index.expect("stable main-chain unit has an index");
        assert_eq!(base_mci, store.last_stable_mci().unwrap());
        path.reverse();

        let mut unstable: HashMap<UnitId, UnitProps> = store
            .all_props()
            .into_iter()
            .filter(|p| !p.is_stable)
            .map(|mut p| {
                p.main_chain_index = None;
                p.is_on_main_chain = false;
                p.latest_included_mc_index = None;
                (p.unit, p)
            })
            .collect();

        for (offset, mc_unit) in path.iter().enumerate() {
            let mci = base_mci + 1 + offset as u64;
            if let Some(p) = unstable.get_mut(mc_unit) {
                p.is_on_main_chain = true;
            }
            let mut stack = vec![*mc_unit];
            while let Some(unit) = stack.pop() {
                let Some(props) = unstable.get_mut(&unit) else {
                    continue;
                };
                if props.main_chain_index.is_some() {
                    continue;
                }
                props.main_chain_index = Some(mci);
                stack.extend(store.parents(&unit).unwrap());
            }
        }

        let mut order: Vec<(Level, UnitId)> =
            unstable.values().map(|p| (p.level, p.unit)).collect();
        order.sort();
        for (_, unit) in order {
            let limci = store
                .parents(&unit)
                .unwrap()
                .iter()
                .map(|parent| {
                    let p = unstable
                        .get(parent)
                        .cloned()
                        .unwrap_or_else(|| store.props(parent).unwrap());
                    if p.is_on_main_chain {
                        p.main_chain_index
                    } else {
                        p.latest_included_mc_index
                    }
                })
                .max()
                .flatten();
            if let Some(p) = unstable.get_mut(&unit) {
                p.latest_included_mc_index = limci;
            }
        }

        let mut batch = WriteBatch::new();
        for props in unstable.into_values() {
            batch.put_props(props);
        }
        store.commit(batch).unwrap();
        tracing::debug!(tip = %tip, mci = base_mci + path.len() as u64, "main chain rebuilt");
    }

    /// The root unit is co-authored by every witness, revealing all of
    /// their definitions in a stable unit.
    fn create_genesis(&mut self) -> UnitId {
        let author = self.witnesses.clone();
        let mut unit = self.compose(Vec::new(), &author, Vec::new(), None);
        unit.witnesses = self.witness_addresses();
        let unit = self.sign(unit, &author);
        let id = unit.unit;

        let mut props = UnitProps::new(id, 0);
        props.main_chain_index = Some(0);
        props.is_on_main_chain = true;
        props.is_stable = true;

        let mut batch = WriteBatch::new();
        self.stage_definitions(&mut batch, &unit, &author);
        batch.put_unit(unit);
        batch.put_props(props);
        batch.put_ball(id, ball_hash(&id, &[], &[], false));
        batch.set_last_stable_mci(0);
        self.store.commit(batch).unwrap();
        id
    }

    fn insert(
        &mut self,
        parents: Vec<UnitId>,
        authors: Vec<TestAuthor>,
        messages: Vec<Message>,
    ) -> UnitId {
        assert!(!parents.is_empty(), "only genesis has no parents");
        let parent_props: Vec<UnitProps> = parents
            .iter()
            .map(|p| self.store.props(p).expect("parent must be stored"))
            .collect();

        let last_stable = self.store.last_stable_mci().unwrap();
        let last_ball_unit = self.store.mc_unit_at(last_stable).unwrap().unwrap();
        let last_ball = self.store.ball(&last_ball_unit).unwrap();

        let mut unit = self.compose(parents, &authors, messages, Some((last_ball_unit, last_ball)));
        unit.witness_list_unit = Some(self.genesis);
        let unit = self.sign(unit, &authors);
        let id = unit.unit;

        let best_parent = parent_props
            .iter()
            .max_by(|a, b| {
                a.witnessed_level
                    .cmp(&b.witnessed_level)
                    .then(a.level.cmp(&b.level))
                    .then(a.is_on_main_chain.cmp(&b.is_on_main_chain))
                    .then(b.unit.cmp(&a.unit))
            })
            .map(|p| p.unit);
        let level = parent_props.iter().map(|p| p.level).max().unwrap_or(0) + 1;

        let mut props = UnitProps::new(id, level);
        props.best_parent_unit = best_parent;
        props.witnessed_level = best_parent.map_or(0, |bp| self.witnessed_level_from(bp));
        props.latest_included_mc_index = parent_props
            .iter()
            .map(|p| {
                if p.is_on_main_chain {
                    p.main_chain_index
                } else {
                    p.latest_included_mc_index
                }
            })
            .max()
            .flatten();

        let mut batch = WriteBatch::new();
        self.stage_definitions(&mut batch, &unit, &authors);
        batch.put_unit(unit);
        batch.put_props(props);
        for mut parent in parent_props {
            if parent.is_free {
                parent.is_free = false;
                batch.put_props(parent);
            }
        }
        self.store.commit(batch).unwrap();
        id
    }

    /// Level at which a witness majority is first collected walking best
    /// parents from `start`.
    fn witnessed_level_from(&self, start: UnitId) -> Level {
        let witnesses: HashSet<&Address> = self.witnesses.iter().map(|w| &w.address).collect();
        let mut collected: HashSet<Address> = HashSet::new();
        let mut cursor = Some(start);
        while let Some(unit) = cursor {
            let props = self.store.props(&unit).unwrap();
            for address in self.store.unit(&unit).unwrap().author_addresses() {
                if witnesses.contains(address) {
                    collected.insert(address.clone());
                }
            }
            if collected.len() >= self.params.majority_of_witnesses {
                return props.level;
            }
            cursor = props.best_parent_unit;
        }
        0
    }

    fn compose(
        &mut self,
        parents: Vec<UnitId>,
        authors: &[TestAuthor],
        messages: Vec<Message>,
        last_ball: Option<(UnitId, BallHash)>,
    ) -> Unit {
        let authors = authors
            .iter()
            .map(|a| Author {
                address: a.address.clone(),
                definition: (!self.revealed.contains(&(a.address.clone(), a.definition_chash())))
                    .then(|| a.definition.clone()),
                authentifiers: BTreeMap::new(),
            })
            .collect();
        self.next_timestamp += 1;
        Unit {
            unit: UnitId::ZERO,
            version: 1,
            parent_units: parents,
            last_ball: last_ball.map(|(_, b)| b),
            last_ball_unit: last_ball.map(|(u, _)| u),
            witnesses: Vec::new(),
            witness_list_unit: None,
            authors,
            messages,
            timestamp: Timestamp::new(self.next_timestamp),
        }
    }

    fn sign(&self, mut unit: Unit, signers: &[TestAuthor]) -> Unit {
        unit.unit = unit_hash(&unit);
        let authentifiers: Vec<_> = signers
            .iter()
            .map(|signer| sign_author(&unit, &[("r", &signer.keypair().private)]))
            .collect();
        for (author, auth) in unit.authors.iter_mut().zip(authentifiers) {
            author.authentifiers = auth;
        }
        unit
    }

    fn stage_definitions(&mut self, batch: &mut WriteBatch, unit: &Unit, signers: &[TestAuthor]) {
        for (author, signer) in unit.authors.iter().zip(signers) {
            if let Some(definition) = &author.definition {
                batch.put_definition(signer.definition_chash(), definition.clone());
                self.revealed
                    .insert((author.address.clone(), signer.definition_chash()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_stable_with_ball() {
        let dag = DagBuilder::new();
        let g = dag.genesis();
        let props = dag.store().props(&g).unwrap();
        assert!(props.is_stable && props.is_on_main_chain);
        assert_eq!(props.main_chain_index, Some(0));
        assert_eq!(dag.store().ball(&g).unwrap(), ball_hash(&g, &[], &[], false));
        assert_eq!(dag.store().genesis_unit().unwrap(), Some(g));
    }

    #[test]
    fn witnesses_are_sorted_and_distinct() {
        let dag = DagBuilder::new();
        let list = dag.witness_addresses();
        assert_eq!(list.len(), 12);
        assert!(list.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn main_chain_assigns_indexes_and_limci() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let mc = dag.extend_main_chain(g, 3);
        let side = dag.unit(&[mc[0]]).data(b"side").add();
        let join = dag.unit(&[mc[2], side]).add();
        dag.set_main_chain(&join);

        let store = dag.store();
        for (i, u) in mc.iter().enumerate() {
            let p = store.props(u).unwrap();
            assert!(p.is_on_main_chain);
            assert_eq!(p.main_chain_index, Some(i as u64 + 1));
        }
        let side_props = store.props(&side).unwrap();
        assert!(!side_props.is_on_main_chain);
        assert_eq!(side_props.main_chain_index, Some(4));
        assert_eq!(side_props.latest_included_mc_index, Some(1));
        let join_props = store.props(&join).unwrap();
        assert_eq!(join_props.latest_included_mc_index, Some(3));
        assert_eq!(join_props.main_chain_index, Some(4));
        assert!(!store.props(&mc[2]).unwrap().is_free);
        assert_eq!(store.unstable_mc_units().unwrap().first(), Some(&join));
    }

    #[test]
    fn definitions_are_revealed_once() {
        let mut dag = DagBuilder::new();
        let alice = TestAuthor::from_seed(50);
        let g = dag.genesis();
        let first = dag.unit(&[g]).by(&alice).add();
        let second = dag.unit(&[first]).by(&alice).add();
        let store = dag.store();
        assert!(store.unit(&first).unwrap().authors[0].definition.is_some());
        assert!(store.unit(&second).unwrap().authors[0].definition.is_none());
        assert_eq!(
            store.definition(&alice.address).unwrap(),
            Some(alice.definition.clone())
        );

        let rotated = alice.rotated(51);
        let third = dag.unit(&[second]).by(&rotated).add();
        let store = dag.store();
        assert_eq!(
            store.unit(&third).unwrap().authors[0].definition,
            Some(rotated.definition.clone())
        );
    }

    #[test]
    fn witnessed_level_reaches_majority() {
        let mut dag = DagBuilder::new();
        let g = dag.genesis();
        let mc = dag.extend_main_chain(g, 9);
        let store = dag.store();
        // Best-parent walk from the 9th unit sees witnesses 8..1 and genesis.
        let last = store.props(&mc[8]).unwrap();
        assert!(last.witnessed_level > 0);
        assert!(last.witnessed_level < last.level);
        assert_eq!(store.props(&mc[0]).unwrap().witnessed_level, 0);
    }
}
