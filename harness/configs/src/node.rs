use serde::{Deserialize, Serialize};

use crate::constants::{ONE_GIGABYTE, ONE_MEGABYTE};

const DEFAULT_RPC_SERVER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_WINDOW: u32 = 1024;
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 2;

/// Full configuration handed to a node at start, written as YAML into its
/// data directory. Immutable once the node process is spawned; restarting
/// with different knobs means provisioning a new node.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NodeConfig {
    pub network: NetworkSection,
    pub rpc: RpcSection,
    pub limits: LimitsSection,
    pub ibd: IbdSection,
    pub log: LogSection,
}

/// P2P listener and peer policy.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkSection {
    pub listen_port: u16,
    /// Addresses exempt from ban/disconnect policy. The harness whitelists
    /// itself so large submissions are never throttled away.
    pub whitelist: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcSection {
    pub listen_port: u16,
    pub server_timeout_secs: u64,
}

/// Acceptance limits. Sized generously by scenarios that drive oversized
/// blocks so the limits themselves never reject a submission.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LimitsSection {
    pub max_block_size: u64,
    pub max_tx_size: u64,
    pub max_mempool_bytes: u64,
}

/// Initial-block-download behavior, including the stalling detector knobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IbdSection {
    /// When `Some(0)`, the node never considers itself up to date and IBD
    /// logic stays engaged regardless of tip freshness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tip_age_secs: Option<u64>,
    /// Number of blocks requested ahead of the validated tip.
    pub download_window: u32,
    /// Seconds a peer may deliver below the minimum speed before it is
    /// flagged as stalling.
    pub stall_timeout_secs: u64,
    /// Minimum acceptable download speed in bytes/second. `None` leaves the
    /// node's built-in floor in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_download_speed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogSection {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkSection {
                listen_port: 0,
                whitelist: Vec::new(),
            },
            rpc: RpcSection {
                listen_port: 0,
                server_timeout_secs: DEFAULT_RPC_SERVER_TIMEOUT_SECS,
            },
            limits: LimitsSection {
                max_block_size: ONE_MEGABYTE as u64,
                max_tx_size: ONE_MEGABYTE as u64,
                max_mempool_bytes: (ONE_GIGABYTE / 4) as u64,
            },
            ibd: IbdSection {
                max_tip_age_secs: None,
                download_window: DEFAULT_DOWNLOAD_WINDOW,
                stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
                min_download_speed: None,
            },
            log: LogSection {
                level: chain_harness_env::harness_log_level()
                    .unwrap_or_else(|| "info".to_owned()),
            },
        }
    }
}

impl NodeConfig {
    #[must_use]
    pub fn with_whitelist(mut self, addrs: impl IntoIterator<Item = String>) -> Self {
        self.network.whitelist = addrs.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn with_max_block_size(mut self, bytes: u64) -> Self {
        self.limits.max_block_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_tx_size(mut self, bytes: u64) -> Self {
        self.limits.max_tx_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_mempool(mut self, bytes: u64) -> Self {
        self.limits.max_mempool_bytes = bytes;
        self
    }

    #[must_use]
    pub const fn with_rpc_server_timeout(mut self, secs: u64) -> Self {
        self.rpc.server_timeout_secs = secs;
        self
    }

    /// Force IBD logic to stay engaged by overriding tip freshness.
    #[must_use]
    pub const fn with_max_tip_age(mut self, secs: u64) -> Self {
        self.ibd.max_tip_age_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn with_download_window(mut self, blocks: u32) -> Self {
        self.ibd.download_window = blocks;
        self
    }

    #[must_use]
    pub const fn with_stall_timeout(mut self, secs: u64) -> Self {
        self.ibd.stall_timeout_secs = secs;
        self
    }

    #[must_use]
    pub const fn with_min_download_speed(mut self, bytes_per_sec: u64) -> Self {
        self.ibd.min_download_speed = Some(bytes_per_sec);
        self
    }

    /// Assign the listener ports. Ports are chosen by the fleet at
    /// provisioning time so peers can be wired up before processes start.
    #[must_use]
    pub const fn with_ports(mut self, rpc_port: u16, p2p_port: u16) -> Self {
        self.rpc.listen_port = rpc_port;
        self.network.listen_port = p2p_port;
        self
    }
}
