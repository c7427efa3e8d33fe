use std::process;

use anyhow::{Context as _, Result};
use chain_harness_core::{chain::ChainBuilder, scenario::ScenarioDriver};
use chain_harness_scenarios::{StallingParams, StallingScript, defaults};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    defaults::init_tracing();

    let params = StallingParams::from_env();
    info!(
        chain_length = params.chain_length,
        big_block_size = params.big_block_size,
        min_download_speed = params.min_download_speed,
        sync_timeout_secs = params.sync_timeout.as_secs(),
        "starting stalling scenario"
    );

    if let Err(err) = run(params).await {
        warn!("stalling scenario failed: {err:#}");
        process::exit(1);
    }
}

async fn run(params: StallingParams) -> Result<()> {
    let chain = ChainBuilder::new(params.max_block_size());
    let mut driver = ScenarioDriver::new(chain);
    let mut script = StallingScript::new(params);

    let report = driver
        .run(&mut script)
        .await
        .context("running stalling scenario failed")?;

    info!(steps = report.steps_executed, "all assertions passed");
    Ok(())
}
