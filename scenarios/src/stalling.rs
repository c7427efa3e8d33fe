use std::time::Duration;

use async_trait::async_trait;
use chain_harness_config::{NodeConfig, ONE_GIGABYTE, ONE_KILOBYTE, timeouts};
use chain_harness_core::{
    chain::{ChainBuilder, NextBlockParams},
    nodes::NodeId,
    scenario::{DynError, ScenarioScript, Step, TestInstance},
};
use tracing::info;

/// Line the node emits when it flags a peer as stalling block download.
pub const STALL_LOG_PATTERN: &str = "stalling block download";

const SEED_NODES: [NodeId; 2] = [NodeId::new(0), NodeId::new(1)];
const FAST_IBD_NODE: NodeId = NodeId::new(2);
const SLOW_IBD_NODE: NodeId = NodeId::new(3);

const GENESIS_SEED: u64 = 0;
const BIG_BLOCK_SEED: u64 = 1;
// Distinct seed ranges for the maturity and fill phases keep regenerated
// chains from colliding on block ids.
const MATURE_SEED_BASE: u64 = 5000;
const FILL_SEED_BASE: u64 = 6000;

const DEFAULT_CHAIN_LENGTH: usize = 120;
const DEFAULT_MIN_DOWNLOAD_SPEED: u64 = 50_000_000;
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 6;
const DEFAULT_DOWNLOAD_WINDOW: u32 = 64;

/// Knobs of the stalling scenario.
///
/// The minimum download speed makes the stall assertion inherently
/// timing-based: on hosts where loopback moves blocks faster than the
/// threshold, the slow node never trips. Raise
/// `CHAIN_HARNESS_STALL_MIN_SPEED` before weakening the assertion.
#[derive(Clone, Copy, Debug)]
pub struct StallingParams {
    pub chain_length: usize,
    pub big_block_size: usize,
    pub small_block_size: usize,
    pub sync_timeout: Duration,
    pub log_assert_timeout: Duration,
    pub stall_timeout_secs: u64,
    pub download_window: u32,
    pub min_download_speed: u64,
}

impl Default for StallingParams {
    fn default() -> Self {
        Self {
            chain_length: DEFAULT_CHAIN_LENGTH,
            big_block_size: ONE_GIGABYTE,
            small_block_size: 64 * ONE_KILOBYTE,
            sync_timeout: timeouts::sync_all_timeout(),
            log_assert_timeout: timeouts::log_assert_timeout(),
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
            download_window: DEFAULT_DOWNLOAD_WINDOW,
            min_download_speed: DEFAULT_MIN_DOWNLOAD_SPEED,
        }
    }
}

impl StallingParams {
    /// Defaults with env overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut params = Self::default();
        if let Some(len) = chain_harness_env::harness_chain_length() {
            params.chain_length = len;
        }
        if let Some(size) = chain_harness_env::harness_big_block_size() {
            params.big_block_size = size;
        }
        if let Some(speed) = chain_harness_env::harness_stall_min_speed() {
            params.min_download_speed = speed;
        }
        if let Some(secs) = chain_harness_env::harness_sync_timeout_secs() {
            params.sync_timeout = Duration::from_secs(secs);
        }
        params
    }

    /// Largest block size this scenario will ask the chain builder for.
    #[must_use]
    pub const fn max_block_size(&self) -> usize {
        6 * ONE_GIGABYTE
    }
}

enum Phase {
    LaunchSeeds(usize),
    Genesis,
    Mature,
    BigBlock,
    SmallChain,
    LaunchFastIbd,
    LaunchSlowIbd,
    Connect(usize),
    Sync,
    AssertNoStall,
    AssertStall,
    Done,
}

/// Verifies the stalling detector does not fire merely because blocks are
/// large, and does fire when a peer's effective bandwidth falls below the
/// configured floor during IBD.
///
/// Two seed nodes are driven with a chain of one oversized block plus many
/// small ones; two fresh nodes then IBD from them, one with a generous
/// bandwidth floor and one with an impossible floor, and the stall log line
/// must appear only on the latter.
pub struct StallingScript {
    params: StallingParams,
    phase: Phase,
}

impl StallingScript {
    #[must_use]
    pub const fn new(params: StallingParams) -> Self {
        Self {
            params,
            phase: Phase::LaunchSeeds(0),
        }
    }

    #[must_use]
    pub const fn params(&self) -> &StallingParams {
        &self.params
    }

    /// Profile of the seed nodes: limits large enough that size policy never
    /// rejects what the scenario drives in.
    fn seed_config(&self) -> NodeConfig {
        NodeConfig::default()
            .with_whitelist(["127.0.0.1".to_owned()])
            .with_max_block_size(self.params.max_block_size() as u64)
            .with_max_tx_size((2 * ONE_GIGABYTE) as u64)
            .with_max_mempool((10 * ONE_GIGABYTE) as u64)
            .with_rpc_server_timeout(1000)
    }

    /// Profile of the IBD nodes: never consider the tip fresh, keep the
    /// download window small and the stall timeout short.
    fn ibd_config(&self) -> NodeConfig {
        self.seed_config()
            .with_max_tip_age(0)
            .with_download_window(self.params.download_window)
            .with_stall_timeout(self.params.stall_timeout_secs)
    }

    fn slow_ibd_config(&self) -> NodeConfig {
        self.ibd_config()
            .with_min_download_speed(self.params.min_download_speed)
    }

    /// IBD nodes dial both seed nodes.
    const CONNECT_EDGES: [(NodeId, NodeId); 4] = [
        (FAST_IBD_NODE, SEED_NODES[0]),
        (FAST_IBD_NODE, SEED_NODES[1]),
        (SLOW_IBD_NODE, SEED_NODES[0]),
        (SLOW_IBD_NODE, SEED_NODES[1]),
    ];
}

#[async_trait]
impl ScenarioScript for StallingScript {
    fn name(&self) -> &str {
        "block-download-stalling"
    }

    async fn next_step(
        &mut self,
        chain: &mut ChainBuilder,
    ) -> Result<Option<Step>, DynError> {
        let step = match self.phase {
            Phase::LaunchSeeds(i) => {
                self.phase = if i + 1 < SEED_NODES.len() {
                    Phase::LaunchSeeds(i + 1)
                } else {
                    Phase::Genesis
                };
                Step::LaunchNode {
                    config: self.seed_config(),
                    init_data_dir: true,
                }
            }
            Phase::Genesis => {
                // First block on top of the node's genesis; its coinbase is
                // the spend source for the oversized block later.
                let block = chain.next_block(GENESIS_SEED)?.clone();
                chain.save_spendable_output()?;
                let mut instance = TestInstance::new(true);
                instance.append(block, true);

                self.phase = Phase::Mature;
                Step::SubmitInstance {
                    targets: SEED_NODES.to_vec(),
                    instance,
                }
            }
            Phase::Mature => {
                // Bury every saved coinbase deep enough to be spendable.
                let mut instance = TestInstance::new(false);
                for i in 0..self.params.chain_length {
                    let block = chain.next_block(MATURE_SEED_BASE + i as u64)?.clone();
                    chain.save_spendable_output()?;
                    instance.append(block, true);
                }

                self.phase = Phase::BigBlock;
                Step::SubmitInstance {
                    targets: SEED_NODES.to_vec(),
                    instance,
                }
            }
            Phase::BigBlock => {
                let spend = chain.get_spendable_output()?;
                let block = chain
                    .next_block_with(
                        BIG_BLOCK_SEED,
                        NextBlockParams {
                            spend: Some(spend),
                            target_size: Some(self.params.big_block_size),
                            ..Default::default()
                        },
                    )?
                    .clone();
                info!(size = block.serialized_size(), "submitting oversized block");
                let mut instance = TestInstance::new(true);
                instance.append(block, true);

                self.phase = Phase::SmallChain;
                Step::SubmitInstance {
                    targets: SEED_NODES.to_vec(),
                    instance,
                }
            }
            Phase::SmallChain => {
                let mut instance = TestInstance::new(false);
                for i in 0..self.params.chain_length {
                    let spend = chain.get_spendable_output()?;
                    let block = chain
                        .next_block_with(
                            FILL_SEED_BASE + i as u64,
                            NextBlockParams {
                                spend: Some(spend),
                                target_size: Some(self.params.small_block_size),
                                ..Default::default()
                            },
                        )?
                        .clone();
                    instance.append(block, true);
                }

                self.phase = Phase::LaunchFastIbd;
                Step::SubmitInstance {
                    targets: SEED_NODES.to_vec(),
                    instance,
                }
            }
            Phase::LaunchFastIbd => {
                info!("launching IBD nodes");
                self.phase = Phase::LaunchSlowIbd;
                Step::LaunchNode {
                    config: self.ibd_config(),
                    init_data_dir: true,
                }
            }
            Phase::LaunchSlowIbd => {
                self.phase = Phase::Connect(0);
                Step::LaunchNode {
                    config: self.slow_ibd_config(),
                    init_data_dir: true,
                }
            }
            Phase::Connect(i) => {
                if i == 0 {
                    info!("starting IBD");
                }
                let (a, b) = Self::CONNECT_EDGES[i];
                self.phase = if i + 1 < Self::CONNECT_EDGES.len() {
                    Phase::Connect(i + 1)
                } else {
                    Phase::Sync
                };
                Step::ConnectNodes { a, b }
            }
            Phase::Sync => {
                self.phase = Phase::AssertNoStall;
                Step::SyncAll {
                    timeout: self.params.sync_timeout,
                }
            }
            Phase::AssertNoStall => {
                self.phase = Phase::AssertStall;
                Step::AssertLog {
                    node: FAST_IBD_NODE,
                    pattern: STALL_LOG_PATTERN.to_owned(),
                    present: false,
                    timeout: self.params.log_assert_timeout,
                }
            }
            Phase::AssertStall => {
                self.phase = Phase::Done;
                Step::AssertLog {
                    node: SLOW_IBD_NODE,
                    pattern: STALL_LOG_PATTERN.to_owned(),
                    present: true,
                    timeout: self.params.log_assert_timeout,
                }
            }
            Phase::Done => return Ok(None),
        };

        Ok(Some(step))
    }
}
