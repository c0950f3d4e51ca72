#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tessera_catchup::{process_hash_tree, HashTreeIndex};
use tessera_crypto::ball_hash;
use tessera_messages::HashTreeBall;
use tessera_nullables::DagBuilder;
use tessera_store::{BallStore, BatchWriter, CatchupStore, HashTreeStore, WriteBatch};
use tessera_types::{BallHash, UnitId};

#[derive(Arbitrary, Debug)]
struct Record {
    unit: [u8; 32],
    /// Indexes into the balls known so far; out-of-range picks a random ball.
    parents: Vec<u8>,
    skiplist: Vec<u8>,
    nonserial: bool,
    /// Store a garbage ball instead of the correct one.
    corrupt: bool,
}

fuzz_target!(|records: Vec<Record>| {
    if records.is_empty() || records.len() > 64 {
        return;
    }
    let dag = DagBuilder::new();
    let store = dag.store().as_ref();
    let Ok(genesis_ball) = store.ball(&dag.genesis()) else {
        return;
    };

    let mut known = vec![genesis_ball];
    let mut balls = Vec::with_capacity(records.len());
    for record in &records {
        let pick = |i: &u8| {
            known
                .get(*i as usize)
                .copied()
                .unwrap_or_else(|| BallHash::new([*i; 32]))
        };
        let mut parent_balls: Vec<BallHash> = record.parents.iter().map(pick).collect();
        parent_balls.sort();
        parent_balls.dedup();
        let mut skiplist_balls: Vec<BallHash> = record.skiplist.iter().map(pick).collect();
        skiplist_balls.sort();
        skiplist_balls.dedup();
        let unit = UnitId::new(record.unit);
        let ball = if record.corrupt {
            BallHash::new(record.unit)
        } else {
            ball_hash(&unit, &parent_balls, &skiplist_balls, record.nonserial)
        };
        known.push(ball);
        balls.push(HashTreeBall {
            unit,
            ball,
            is_nonserial: record.nonserial,
            parent_balls,
            skiplist_balls,
        });
    }

    let root = balls[balls.len() - 1].ball;
    let mut batch = WriteBatch::new();
    batch.set_catchup_chain(vec![genesis_ball, root]);
    if store.commit(batch).is_err() {
        return;
    }

    let before_queue = store.catchup_chain().unwrap_or_default();
    let before_tree = store.hash_tree_balls().unwrap_or_default();
    let mut index = HashTreeIndex::new();
    match process_hash_tree(store, &mut index, &balls) {
        Ok(outcome) => {
            assert_eq!(outcome.dequeued, genesis_ball);
            assert_eq!(store.catchup_chain().unwrap_or_default(), vec![root]);
        }
        Err(_) => {
            // Rejection is all-or-nothing.
            assert_eq!(store.catchup_chain().unwrap_or_default(), before_queue);
            assert_eq!(store.hash_tree_balls().unwrap_or_default(), before_tree);
            assert!(index.is_empty());
        }
    }
});
