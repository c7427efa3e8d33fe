use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chain_harness_core::{
    chain::{BlockId, ChainBuilder},
    scenario::{TestInstance, wait_until},
};

const POLL: Duration = Duration::from_millis(10);

fn chain() -> ChainBuilder {
    let mut chain = ChainBuilder::new(1024 * 1024);
    chain.set_genesis(BlockId::from_bytes([3; 32])).expect("fresh builder");
    chain
}

#[tokio::test]
async fn wait_until_resolves_once_predicate_holds() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&polls);

    let held = wait_until(
        move || {
            let counted = Arc::clone(&counted);
            async move { counted.fetch_add(1, Ordering::SeqCst) >= 3 }
        },
        POLL,
        Duration::from_secs(5),
    )
    .await;

    assert!(held);
    assert!(polls.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn wait_until_reports_expired_deadline() {
    let held = wait_until(|| async { false }, POLL, Duration::from_millis(50)).await;
    assert!(!held);
}

#[test]
fn instance_records_blocks_in_append_order() {
    let mut chain = chain();
    let mut instance = TestInstance::new(true);
    let mut ids = Vec::new();
    for i in 0..3 {
        let block = chain.next_block(i).expect("block").clone();
        ids.push(block.id());
        instance.append(block, true);
    }

    assert!(instance.sync_every_block());
    assert_eq!(instance.len(), 3);
    let recorded: Vec<_> = instance.entries().iter().map(|(b, _)| b.id()).collect();
    assert_eq!(recorded, ids);
}

#[test]
fn final_expected_tip_skips_rejected_blocks() {
    let mut chain = chain();
    let mut instance = TestInstance::new(false);

    let accepted = chain.next_block(1).expect("block").clone();
    let accepted_id = accepted.id();
    instance.append(accepted, true);

    let rejected = chain.next_block(2).expect("block").clone();
    instance.append(rejected, false);

    assert_eq!(instance.final_expected_tip(), Some(accepted_id));
}

#[test]
fn empty_instance_has_no_expected_tip() {
    let instance = TestInstance::new(false);
    assert!(instance.is_empty());
    assert_eq!(instance.final_expected_tip(), None);
}

#[test]
fn total_bytes_sums_serialized_sizes() {
    let mut chain = chain();
    let mut instance = TestInstance::new(false);
    let mut expected = 0;
    for i in 0..2 {
        let block = chain.next_block(i).expect("block").clone();
        expected += block.serialized_size();
        instance.append(block, true);
    }
    assert_eq!(instance.total_bytes(), expected);
}
