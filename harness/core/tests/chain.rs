use chain_harness_core::chain::{
    Block, BlockId, ChainBuildError, ChainBuilder, FILLER_OVERHEAD, HEADER_LEN, NextBlockParams,
    SizeConstraintError, Transaction,
};

const MAX_BLOCK_SIZE: usize = 1024 * 1024;

fn genesis() -> BlockId {
    BlockId::from_bytes([7; 32])
}

fn builder() -> ChainBuilder {
    let mut chain = ChainBuilder::new(MAX_BLOCK_SIZE);
    chain.set_genesis(genesis()).expect("fresh builder");
    chain
}

/// Serialized size of a block with only a coinbase.
fn plain_block_base() -> usize {
    let mut chain = builder();
    let block = chain.next_block(1).expect("plain block");
    assert_eq!(block.txs().len(), 1);
    block.serialized_size()
}

#[test]
fn same_seeds_reproduce_identical_blocks() {
    fn run() -> Vec<Vec<u8>> {
        let mut chain = builder();
        let mut raws = Vec::new();

        raws.push(chain.next_block(0).expect("block 0").encoded().to_vec());
        chain.save_spendable_output().expect("tip exists");
        for i in 0..5 {
            let block = chain.next_block(5000 + i).expect("mature block");
            raws.push(block.encoded().to_vec());
            chain.save_spendable_output().expect("tip exists");
        }
        let spend = chain.get_spendable_output().expect("saved output");
        let params = NextBlockParams {
            spend: Some(spend),
            target_size: Some(4096),
            ..Default::default()
        };
        let sized = chain.next_block_with(1, params).expect("sized block");
        raws.push(sized.encoded().to_vec());
        raws
    }

    assert_eq!(run(), run());
}

#[test]
fn blocks_form_a_singly_linked_chain() {
    let mut chain = builder();
    let first = chain.next_block(10).expect("first").id();
    let second = chain.next_block(11).expect("second");

    assert_eq!(second.parent(), first);
    assert_eq!(second.height(), 2);
    assert_eq!(chain.height(), 2);
    assert_eq!(chain.tip_id(), Some(second.id()));
    assert_eq!(chain.block_at(1).map(Block::id), Some(first));
}

#[test]
fn first_block_builds_on_pinned_genesis() {
    let mut chain = builder();
    let block = chain.next_block(3).expect("block");
    assert_eq!(block.parent(), genesis());
    assert_eq!(block.height(), 1);
}

#[test]
fn explicit_parent_height_forks_from_that_block() {
    let mut chain = builder();
    let first = chain.next_block(1).expect("first").id();
    chain.next_block(2).expect("second");

    let fork = chain
        .next_block_with(
            3,
            NextBlockParams {
                parent_height: Some(1),
                ..Default::default()
            },
        )
        .expect("fork");
    assert_eq!(fork.parent(), first);
    assert_eq!(fork.height(), 2);
}

#[test]
fn unknown_parent_height_is_rejected() {
    let mut chain = builder();
    chain.next_block(1).expect("first");

    let err = chain
        .next_block_with(
            2,
            NextBlockParams {
                parent_height: Some(9),
                ..Default::default()
            },
        )
        .expect_err("height 9 does not exist");
    assert!(matches!(
        err,
        ChainBuildError::UnknownParent { height: 9, tip_height: 1 }
    ));
}

#[test]
fn building_without_genesis_fails() {
    let mut chain = ChainBuilder::new(MAX_BLOCK_SIZE);
    let err = chain.next_block(0).expect_err("genesis unset");
    assert!(matches!(err, ChainBuildError::GenesisUnset));
}

#[test]
fn genesis_cannot_be_repinned_after_blocks() {
    let mut chain = builder();
    chain.next_block(0).expect("block");
    let err = chain
        .set_genesis(BlockId::from_bytes([9; 32]))
        .expect_err("already producing");
    assert!(matches!(
        err,
        ChainBuildError::GenesisAlreadyUsed { blocks: 1 }
    ));
}

#[test]
fn outputs_come_back_in_fifo_order_exactly_once() {
    let mut chain = builder();
    let mut expected = Vec::new();
    for i in 0..4 {
        let id = chain.next_block(i).expect("block").id();
        chain.save_spendable_output().expect("tip exists");
        expected.push(id);
    }

    for id in expected {
        let output = chain.get_spendable_output().expect("queued output");
        assert_eq!(output.outpoint.block, id);
        assert_eq!(output.outpoint.index, 0);
    }
    assert_eq!(chain.saved_output_count(), 0);
    chain
        .get_spendable_output()
        .expect_err("queue must be empty");
}

#[test]
fn saving_an_output_requires_a_block() {
    let mut chain = builder();
    let err = chain.save_spendable_output().expect_err("no tip yet");
    assert!(matches!(err, ChainBuildError::EmptyChain));
}

#[test]
fn spend_consumes_the_given_output() {
    let mut chain = builder();
    chain.next_block(0).expect("funding block");
    chain.save_spendable_output().expect("tip exists");
    let spend = chain.get_spendable_output().expect("queued output");
    let outpoint = spend.outpoint;

    let block = chain
        .next_block_with(
            1,
            NextBlockParams {
                spend: Some(spend),
                ..Default::default()
            },
        )
        .expect("spending block");

    assert!(block.txs().iter().any(|tx| matches!(
        tx,
        Transaction::Spend { input, .. } if *input == outpoint
    )));
}

#[test]
fn target_size_is_hit_exactly_when_padding_fits() {
    let mut chain = builder();
    for target in [512, 4096, 64 * 1024] {
        let block = chain
            .next_block_with(
                100 + target as u64,
                NextBlockParams {
                    target_size: Some(target),
                    ..Default::default()
                },
            )
            .expect("padded block");
        assert_eq!(block.serialized_size(), target);
    }
}

#[test]
fn tiny_pad_stays_within_filler_overhead_of_target() {
    let base = plain_block_base();
    let mut chain = builder();
    let target = base + FILLER_OVERHEAD - 1;
    let block = chain
        .next_block_with(
            1,
            NextBlockParams {
                target_size: Some(target),
                ..Default::default()
            },
        )
        .expect("block within tolerance");

    assert!(target - block.serialized_size() < FILLER_OVERHEAD);
}

#[test]
fn below_base_target_is_rejected() {
    let base = plain_block_base();
    assert!(base > HEADER_LEN);

    let mut chain = builder();
    let err = chain
        .next_block_with(
            1,
            NextBlockParams {
                target_size: Some(base - 1),
                ..Default::default()
            },
        )
        .expect_err("cannot shrink below base");
    assert!(matches!(
        err,
        ChainBuildError::Size(SizeConstraintError::BelowBase { .. })
    ));
}

#[test]
fn above_max_target_is_rejected() {
    let mut chain = builder();
    let err = chain
        .next_block_with(
            1,
            NextBlockParams {
                target_size: Some(MAX_BLOCK_SIZE + 1),
                ..Default::default()
            },
        )
        .expect_err("cannot exceed configured maximum");
    assert!(matches!(
        err,
        ChainBuildError::Size(SizeConstraintError::AboveMax { max: MAX_BLOCK_SIZE, .. })
    ));
}

#[test]
fn distinct_seeds_give_distinct_ids() {
    let mut chain = builder();
    let a = chain.next_block(1).expect("a").id();
    let b = chain
        .next_block_with(
            2,
            NextBlockParams {
                parent_height: Some(0),
                ..Default::default()
            },
        )
        .expect("b")
        .id();
    assert_ne!(a, b);
}
