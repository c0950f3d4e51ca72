//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tessera_store::{
    BallStore, BatchOp, BatchWriter, CatchupStore, DefinitionStore, HashTreeStore, SpendStore,
    StoreError, UnitStore, WriteBatch,
};
use tessera_types::{
    Address, BallHash, Definition, Mci, SpendKey, Unit, UnitId, UnitProps,
};

#[derive(Clone, Default)]
struct State {
    units: HashMap<UnitId, Unit>,
    props: HashMap<UnitId, UnitProps>,
    children: HashMap<UnitId, Vec<UnitId>>,
    authored: HashMap<Address, Vec<UnitId>>,
    consumers: HashMap<SpendKey, Vec<UnitId>>,
    balls: HashMap<UnitId, BallHash>,
    ball_units: HashMap<BallHash, UnitId>,
    skiplist: HashMap<UnitId, Vec<UnitId>>,
    definitions: HashMap<Address, Definition>,
    last_stable_mci: Mci,
    catchup_chain: Vec<BallHash>,
    hash_tree: BTreeMap<BallHash, UnitId>,
}

impl State {
    fn apply(&mut self, op: BatchOp) {
        match op {
            BatchOp::PutUnit(unit) => {
                let id = unit.unit;
                if self.units.contains_key(&id) {
                    return;
                }
                for parent in &unit.parent_units {
                    self.children.entry(*parent).or_default().push(id);
                }
                for address in unit.author_addresses() {
                    self.authored.entry(address.clone()).or_default().push(id);
                }
                for key in unit.spent_keys() {
                    self.consumers.entry(key).or_default().push(id);
                }
                self.units.insert(id, *unit);
            }
            BatchOp::PutProps(props) => {
                self.props.insert(props.unit, props);
            }
            BatchOp::PutBall { unit, ball } => {
                self.balls.insert(unit, ball);
                self.ball_units.insert(ball, unit);
            }
            BatchOp::PutSkiplist {
                unit,
                skiplist_units,
            } => {
                self.skiplist.insert(unit, skiplist_units);
            }
            BatchOp::PutDefinition { chash, definition } => {
                self.definitions.insert(chash, definition);
            }
            BatchOp::SetLastStableMci(mci) => self.last_stable_mci = mci,
            BatchOp::SetCatchupChain(balls) => self.catchup_chain = balls,
            BatchOp::RemoveCatchupBall(ball) => self.catchup_chain.retain(|b| *b != ball),
            BatchOp::PutHashTreeBall { ball, unit } => {
                self.hash_tree.insert(ball, unit);
            }
            BatchOp::DeleteHashTreeBall(ball) => {
                self.hash_tree.remove(&ball);
            }
            BatchOp::ClearHashTree => self.hash_tree.clear(),
        }
    }
}

/// An in-memory implementation of every store trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
    fail_next_commit: AtomicBool,
    commits: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn unit_count(&self) -> usize {
        self.state.lock().unwrap().units.len()
    }

    /// Metadata of every stored unit, in no particular order.
    pub fn all_props(&self) -> Vec<UnitProps> {
        self.state.lock().unwrap().props.values().cloned().collect()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        Ok(f(&self.state.lock().unwrap()))
    }
}

impl UnitStore for NullStore {
    fn unit_props(&self, unit: &UnitId) -> Result<Option<UnitProps>, StoreError> {
        self.read(|s| s.props.get(unit).cloned())
    }

    fn read_unit(&self, unit: &UnitId) -> Result<Option<Unit>, StoreError> {
        self.read(|s| s.units.get(unit).cloned())
    }

    fn children(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError> {
        self.read(|s| s.children.get(unit).cloned().unwrap_or_default())
    }

    fn units_at_mci(&self, mci: Mci) -> Result<Vec<UnitId>, StoreError> {
        self.read(|s| {
            let mut units: Vec<(u64, UnitId)> = s
                .props
                .values()
                .filter(|p| p.main_chain_index == Some(mci))
                .map(|p| (p.level, p.unit))
                .collect();
            units.sort();
            units.into_iter().map(|(_, u)| u).collect()
        })
    }

    fn mc_unit_at(&self, mci: Mci) -> Result<Option<UnitId>, StoreError> {
        self.read(|s| {
            s.props
                .values()
                .find(|p| p.is_on_main_chain && p.main_chain_index == Some(mci))
                .map(|p| p.unit)
        })
    }

    fn last_stable_mci(&self) -> Result<Mci, StoreError> {
        self.read(|s| s.last_stable_mci)
    }

    fn skiplist_units(&self, unit: &UnitId) -> Result<Vec<UnitId>, StoreError> {
        self.read(|s| s.skiplist.get(unit).cloned().unwrap_or_default())
    }

    fn units_by_author(&self, address: &Address) -> Result<Vec<UnitId>, StoreError> {
        self.read(|s| s.authored.get(address).cloned().unwrap_or_default())
    }
}

impl BallStore for NullStore {
    fn ball_of(&self, unit: &UnitId) -> Result<Option<BallHash>, StoreError> {
        self.read(|s| s.balls.get(unit).copied())
    }

    fn unit_of_ball(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError> {
        self.read(|s| s.ball_units.get(ball).copied())
    }
}

impl SpendStore for NullStore {
    fn consumers(&self, key: &SpendKey) -> Result<Vec<UnitId>, StoreError> {
        self.read(|s| s.consumers.get(key).cloned().unwrap_or_default())
    }
}

impl DefinitionStore for NullStore {
    fn definition(&self, chash: &Address) -> Result<Option<Definition>, StoreError> {
        self.read(|s| s.definitions.get(chash).cloned())
    }
}

impl CatchupStore for NullStore {
    fn catchup_chain(&self) -> Result<Vec<BallHash>, StoreError> {
        self.read(|s| s.catchup_chain.clone())
    }
}

impl HashTreeStore for NullStore {
    fn hash_tree_unit(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError> {
        self.read(|s| s.hash_tree.get(ball).copied())
    }

    fn hash_tree_balls(&self) -> Result<Vec<(BallHash, UnitId)>, StoreError> {
        self.read(|s| s.hash_tree.iter().map(|(b, u)| (*b, *u)).collect())
    }
}

impl BatchWriter for NullStore {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let mut guard = self.state.lock().unwrap();
        let mut next = guard.clone();
        for op in batch.into_ops() {
            next.apply(op);
        }
        *guard = next;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_types::{Author, Message, Payload, Payment, Timestamp};

    fn unit(id: u8, parents: &[u8], spends: &[SpendKey]) -> Unit {
        Unit {
            unit: UnitId::new([id; 32]),
            version: 1,
            parent_units: parents.iter().map(|p| UnitId::new([*p; 32])).collect(),
            last_ball: None,
            last_ball_unit: None,
            witnesses: Vec::new(),
            witness_list_unit: None,
            authors: vec![Author {
                address: Address::new("ALICE"),
                definition: None,
                authentifiers: BTreeMap::new(),
            }],
            messages: vec![Message {
                payload: Payload::Payment(Payment {
                    inputs: spends.to_vec(),
                    outputs: Vec::new(),
                }),
            }],
            timestamp: Timestamp::new(0),
        }
    }

    #[test]
    fn put_unit_indexes_children_authors_and_spends() {
        let store = NullStore::new();
        let key = SpendKey {
            unit: UnitId::new([9; 32]),
            message_index: 0,
            output_index: 0,
        };
        let mut batch = WriteBatch::new();
        batch.put_unit(unit(1, &[], &[]));
        batch.put_unit(unit(2, &[1], &[key]));
        batch.put_unit(unit(2, &[1], &[key]));
        store.commit(batch).unwrap();

        let one = UnitId::new([1; 32]);
        let two = UnitId::new([2; 32]);
        assert_eq!(store.children(&one).unwrap(), vec![two]);
        assert_eq!(store.consumers(&key).unwrap(), vec![two]);
        assert_eq!(
            store.units_by_author(&Address::new("ALICE")).unwrap(),
            vec![one, two]
        );
        assert_eq!(store.parents(&two).unwrap(), vec![one]);
    }

    #[test]
    fn failed_commit_applies_nothing() {
        let store = NullStore::new();
        store.fail_next_commit();
        let mut batch = WriteBatch::new();
        batch.set_last_stable_mci(5);
        batch.put_hash_tree_ball(BallHash::new([1; 32]), UnitId::new([1; 32]));
        assert!(store.commit(batch).is_err());
        assert_eq!(store.last_stable_mci().unwrap(), 0);
        assert!(store.hash_tree_balls().unwrap().is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn catchup_queue_ops() {
        let store = NullStore::new();
        let balls: Vec<BallHash> = (1..=3).map(|i| BallHash::new([i; 32])).collect();
        let mut batch = WriteBatch::new();
        batch.set_catchup_chain(balls.clone());
        batch.remove_catchup_ball(balls[0]);
        store.commit(batch).unwrap();
        assert_eq!(store.catchup_chain().unwrap(), balls[1..].to_vec());
    }

    #[test]
    fn missing_props_is_not_found() {
        let store = NullStore::new();
        let err = store.props(&UnitId::new([7; 32])).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
