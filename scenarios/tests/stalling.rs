use std::time::Duration;

use anyhow::Result;
use chain_harness_config::ONE_KILOBYTE;
use chain_harness_core::{
    chain::{BlockId, ChainBuilder},
    scenario::{ScenarioDriver, ScenarioScript as _, Step},
};
use chain_harness_scenarios::{STALL_LOG_PATTERN, StallingParams, StallingScript};

/// Small sizes so the offline shape test does not allocate gigabytes.
fn offline_params() -> StallingParams {
    StallingParams {
        chain_length: 5,
        big_block_size: 256 * ONE_KILOBYTE,
        small_block_size: 8 * ONE_KILOBYTE,
        sync_timeout: Duration::from_secs(30),
        log_assert_timeout: Duration::from_secs(5),
        ..StallingParams::default()
    }
}

/// Drives the script's step sequence against a chain builder alone, without
/// executing anything, and checks the shape the driver would consume.
#[tokio::test]
async fn script_yields_the_expected_step_sequence() -> Result<()> {
    let params = offline_params();
    let mut script = StallingScript::new(params);
    let mut chain = ChainBuilder::new(params.max_block_size());
    chain.set_genesis(BlockId::from_bytes([1; 32]))?;

    let mut steps = Vec::new();
    while let Some(step) = script.next_step(&mut chain).await.map_err(|e| anyhow::anyhow!(e))? {
        steps.push(step);
    }
    assert_eq!(steps.len(), 15);

    // Two seed nodes come up first.
    for step in &steps[..2] {
        let Step::LaunchNode { config, init_data_dir } = step else {
            panic!("expected seed launch, got {}", step.describe());
        };
        assert!(init_data_dir);
        assert!(config.ibd.min_download_speed.is_none());
    }

    // Genesis block, individually synced.
    let Step::SubmitInstance { targets, instance } = &steps[2] else {
        panic!("expected genesis submit");
    };
    assert_eq!(targets.len(), 2);
    assert!(instance.sync_every_block());
    assert_eq!(instance.len(), 1);

    // Maturity chain, batched.
    let Step::SubmitInstance { instance, .. } = &steps[3] else {
        panic!("expected maturity submit");
    };
    assert!(!instance.sync_every_block());
    assert_eq!(instance.len(), params.chain_length);

    // Oversized block padded to target.
    let Step::SubmitInstance { instance, .. } = &steps[4] else {
        panic!("expected big-block submit");
    };
    assert!(instance.sync_every_block());
    let (big, _) = &instance.entries()[0];
    assert_eq!(big.serialized_size(), params.big_block_size);

    // Fill chain of small spending blocks.
    let Step::SubmitInstance { instance, .. } = &steps[5] else {
        panic!("expected fill submit");
    };
    assert_eq!(instance.len(), params.chain_length);
    for (block, _) in instance.entries() {
        assert_eq!(block.serialized_size(), params.small_block_size);
    }

    // IBD nodes: the second one carries the bandwidth floor.
    let Step::LaunchNode { config, .. } = &steps[6] else {
        panic!("expected fast IBD launch");
    };
    assert_eq!(config.ibd.max_tip_age_secs, Some(0));
    assert!(config.ibd.min_download_speed.is_none());
    let Step::LaunchNode { config, .. } = &steps[7] else {
        panic!("expected slow IBD launch");
    };
    assert_eq!(config.ibd.min_download_speed, Some(params.min_download_speed));

    // Both IBD nodes dial both seeds.
    for step in &steps[8..12] {
        assert!(matches!(step, Step::ConnectNodes { .. }));
    }

    let Step::SyncAll { timeout } = &steps[12] else {
        panic!("expected sync barrier");
    };
    assert_eq!(*timeout, params.sync_timeout);

    Ok(())
}

#[tokio::test]
async fn script_ends_with_both_stall_assertions() -> Result<()> {
    let params = offline_params();
    let mut script = StallingScript::new(params);
    let mut chain = ChainBuilder::new(params.max_block_size());
    chain.set_genesis(BlockId::from_bytes([1; 32]))?;

    let mut steps = Vec::new();
    while let Some(step) = script.next_step(&mut chain).await.map_err(|e| anyhow::anyhow!(e))? {
        steps.push(step);
    }

    let log_steps: Vec<_> = steps
        .iter()
        .filter_map(|step| match step {
            Step::AssertLog { node, pattern, present, .. } => {
                Some((node.index(), pattern.as_str(), *present))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        log_steps,
        vec![(2, STALL_LOG_PATTERN, false), (3, STALL_LOG_PATTERN, true)]
    );

    // Every saved coinbase was spent; nothing dangles in the queue.
    assert_eq!(chain.saved_output_count(), 0);
    assert_eq!(chain.height() as usize, 2 + 2 * params.chain_length);

    Ok(())
}

#[tokio::test]
#[ignore = "requires a chain-node binary; run with CHAIN_HARNESS_NODE_BIN pointing at it"]
async fn stalling_scenario_end_to_end() -> Result<()> {
    chain_harness_scenarios::defaults::init_tracing();

    let params = StallingParams::from_env();
    let mut driver = ScenarioDriver::new(ChainBuilder::new(params.max_block_size()));
    let mut script = StallingScript::new(params);

    let report = driver.run(&mut script).await?;
    assert_eq!(report.steps_executed, 15);
    Ok(())
}
