use tessera_consensus::{classify, classify_sequence, stabilize_up_to};
use tessera_crypto::ball_hash;
use tessera_nullables::{DagBuilder, TestAuthor};
use tessera_store::{BallStore, UnitStore};
use tessera_types::{Sequence, SpendKey, Unit, UnitId};

fn output_of(unit: UnitId) -> SpendKey {
    SpendKey {
        unit,
        message_index: 0,
        output_index: 0,
    }
}

fn content(dag: &DagBuilder, id: &UnitId) -> Unit {
    dag.store().unit(id).unwrap()
}

#[test]
fn spending_after_an_ancestor_spend_is_good() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let key = output_of(g);
    let u1 = dag.unit(&[g]).spending(key).add();
    let u2 = dag.unit(&[u1]).spending(key).add();

    let c = classify(dag.store().as_ref(), &content(&dag, &u2)).unwrap();
    assert_eq!(c.sequence, Sequence::Good);
    assert!(c.conflicts.is_empty());

    dag.set_main_chain(&u2);
    let params = dag.params().clone();
    stabilize_up_to(dag.store().as_ref(), &params, 2).unwrap();
    assert_eq!(dag.store().props(&u2).unwrap().sequence, Sequence::Good);
}

#[test]
fn spends_in_one_ancestry_line_at_one_mci_stay_good() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let key = output_of(g);
    let mc = dag.extend_main_chain(g, 3);
    let u1 = dag.unit(&[g]).spending(key).add();
    let u2 = dag.unit(&[u1]).spending(key).add();
    let join = dag.unit(&[mc[2], u2]).add();
    dag.set_main_chain(&join);

    let store = dag.store().clone();
    assert_eq!(store.props(&u1).unwrap().main_chain_index, Some(4));
    assert_eq!(store.props(&u2).unwrap().main_chain_index, Some(4));

    let params = dag.params().clone();
    let reports = stabilize_up_to(store.as_ref(), &params, 4).unwrap();
    assert!(reports.iter().all(|r| r.demoted.is_empty()));
    assert_eq!(store.props(&u1).unwrap().sequence, Sequence::Good);
    assert_eq!(store.props(&u2).unwrap().sequence, Sequence::Good);

    let u1_parent_balls = vec![store.ball(&g).unwrap()];
    assert_eq!(
        store.ball(&u1).unwrap(),
        ball_hash(&u1, &u1_parent_balls, &[], false)
    );
}

#[test]
fn first_stable_spend_wins() {
    let mut dag = DagBuilder::new();
    let alice = TestAuthor::from_seed(70);
    let bob = TestAuthor::from_seed(71);
    let g = dag.genesis();
    let key = output_of(g);
    let u1 = dag.unit(&[g]).by(&alice).spending(key).add();
    let u2 = dag.unit(&[g]).by(&bob).spending(key).add();

    let store = dag.store().clone();
    assert_eq!(classify_sequence(store.as_ref(), &content(&dag, &u1)).unwrap(), Sequence::Good);
    assert_eq!(classify_sequence(store.as_ref(), &content(&dag, &u2)).unwrap(), Sequence::Good);

    // u1 becomes the main-chain unit at MCI 1; u2 is not covered yet.
    let chain = dag.extend_main_chain(u1, 3);
    let params = dag.params().clone();
    let reports = stabilize_up_to(store.as_ref(), &params, 1).unwrap();
    assert_eq!(reports[0].units, vec![u1]);
    assert_eq!(reports[0].demoted, vec![u2]);

    assert_eq!(store.props(&u1).unwrap().sequence, Sequence::Good);
    assert_eq!(store.props(&u2).unwrap().sequence, Sequence::TempBad);
    assert_eq!(classify_sequence(store.as_ref(), &content(&dag, &u2)).unwrap(), Sequence::FinalBad);

    // Once u2 is covered and its MCI stabilizes, the label is final.
    let join = dag.unit(&[*chain.last().unwrap(), u2]).add();
    dag.set_main_chain(&join);
    let u2_mci = store.props(&u2).unwrap().main_chain_index.unwrap();
    stabilize_up_to(store.as_ref(), &params, u2_mci).unwrap();

    let props = store.props(&u2).unwrap();
    assert!(props.is_stable);
    assert_eq!(props.sequence, Sequence::FinalBad);
    assert_eq!(classify_sequence(store.as_ref(), &content(&dag, &u2)).unwrap(), Sequence::FinalBad);
    assert_eq!(
        store.ball(&u2).unwrap(),
        ball_hash(&u2, &[store.ball(&g).unwrap()], &[], true)
    );
}

#[test]
fn conflicts_stabilizing_together_both_lose() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let key = output_of(g);
    let anchor = dag.extend_main_chain(g, 1)[0];
    let u1 = dag.unit(&[g]).data(b"one").spending(key).add();
    let u2 = dag.unit(&[g]).data(b"two").spending(key).add();
    let join = dag.unit(&[anchor, u1, u2]).add();
    dag.set_main_chain(&join);

    let store = dag.store().clone();
    assert_eq!(store.props(&u1).unwrap().main_chain_index, Some(2));
    assert_eq!(store.props(&u2).unwrap().main_chain_index, Some(2));

    let params = dag.params().clone();
    stabilize_up_to(store.as_ref(), &params, 2).unwrap();
    assert_eq!(store.props(&u1).unwrap().sequence, Sequence::FinalBad);
    assert_eq!(store.props(&u2).unwrap().sequence, Sequence::FinalBad);
    assert_eq!(store.props(&join).unwrap().sequence, Sequence::Good);
}

#[test]
fn final_results_never_weaken() {
    let mut dag = DagBuilder::new();
    let g = dag.genesis();
    let key = output_of(g);
    let u1 = dag.unit(&[g]).data(b"winner").spending(key).add();
    let u2 = dag.unit(&[g]).data(b"loser").spending(key).add();
    let mut tip = dag.extend_main_chain(u1, 2).pop().unwrap();
    let store = dag.store().clone();
    let params = dag.params().clone();
    stabilize_up_to(store.as_ref(), &params, 1).unwrap();

    let loser = content(&dag, &u2);
    for round in 0..3u8 {
        assert_eq!(classify_sequence(store.as_ref(), &loser).unwrap(), Sequence::FinalBad);
        tip = dag.unit(&[tip]).data(&[round]).add();
        dag.set_main_chain(&tip);
        let next = store.last_stable_mci().unwrap() + 1;
        stabilize_up_to(store.as_ref(), &params, next).unwrap();
    }
    assert_eq!(classify_sequence(store.as_ref(), &loser).unwrap(), Sequence::FinalBad);
}
