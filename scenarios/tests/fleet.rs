use anyhow::Result;
use chain_harness_config::{NodeConfig, ONE_MEGABYTE, timeouts};
use chain_harness_core::{
    adjust_timeout,
    chain::ChainBuilder,
    nodes::{NodeFleet, NodeId},
    scenario::TestInstance,
};
use chain_harness_scenarios::defaults::init_tracing;

fn permissive_config() -> NodeConfig {
    NodeConfig::default()
        .with_whitelist(["127.0.0.1".to_owned()])
        .with_max_block_size((16 * ONE_MEGABYTE) as u64)
        .with_rpc_server_timeout(600)
}

fn ibd_config() -> NodeConfig {
    permissive_config().with_max_tip_age(0)
}

async fn start_node(fleet: &mut NodeFleet, config: NodeConfig) -> Result<NodeId> {
    let id = fleet.add_node(config, true)?;
    fleet.start_node(id).await?;
    Ok(id)
}

#[tokio::test]
#[ignore = "requires a chain-node binary; run with CHAIN_HARNESS_NODE_BIN pointing at it"]
async fn resubmitting_the_accepted_tip_is_idempotent() -> Result<()> {
    init_tracing();

    let mut fleet = NodeFleet::new();
    let id = start_node(&mut fleet, permissive_config()).await?;

    let mut chain = ChainBuilder::new(16 * ONE_MEGABYTE);
    chain.set_genesis(fleet.api(id)?.best_tip().await?)?;
    let block = chain.next_block(42)?.clone();

    let mut instance = TestInstance::new(true);
    instance.append(block.clone(), true);
    let outcomes = fleet.submit(id, &instance).await?;
    assert!(outcomes.iter().all(|outcome| outcome.accepted));

    // Same block again: no state change, no error.
    let mut again = TestInstance::new(true);
    again.append(block.clone(), true);
    let outcomes = fleet.submit(id, &again).await?;
    assert!(outcomes.iter().all(|outcome| outcome.accepted));
    assert_eq!(fleet.api(id)?.best_tip().await?, block.id());

    Ok(())
}

#[tokio::test]
#[ignore = "requires a chain-node binary; run with CHAIN_HARNESS_NODE_BIN pointing at it"]
async fn connecting_fresh_nodes_converges_on_the_tip() -> Result<()> {
    init_tracing();

    let mut fleet = NodeFleet::new();
    let seed_a = start_node(&mut fleet, permissive_config()).await?;
    let seed_b = start_node(&mut fleet, permissive_config()).await?;

    let mut chain = ChainBuilder::new(16 * ONE_MEGABYTE);
    chain.set_genesis(fleet.api(seed_a)?.best_tip().await?)?;

    let mut instance = TestInstance::new(false);
    for i in 0..8 {
        instance.append(chain.next_block(i)?.clone(), true);
    }
    for outcomes in fleet
        .submit_to_all(&[seed_a, seed_b], &instance)
        .await?
        .into_iter()
        .map(|(_, outcomes)| outcomes)
    {
        assert!(outcomes.iter().all(|outcome| outcome.accepted));
    }

    let fresh_a = start_node(&mut fleet, ibd_config()).await?;
    let fresh_b = start_node(&mut fleet, ibd_config()).await?;
    for fresh in [fresh_a, fresh_b] {
        fleet.connect(fresh, seed_a).await?;
        fleet.connect(fresh, seed_b).await?;
    }

    let tip = chain.tip_id().expect("chain was driven");
    fleet
        .sync_all(tip, adjust_timeout(timeouts::sync_all_timeout()))
        .await?;
    Ok(())
}
