use std::time::Duration;

use chain_harness_config::NodeConfig;

use super::instance::TestInstance;
use crate::nodes::NodeId;

/// One unit of scenario work, consumed strictly in order by the driver.
///
/// Steps are plain data: a script yields them and never touches the fleet
/// directly, so later steps can rely on the side effects (chain tip, saved
/// outputs, launched nodes) of every earlier one.
#[derive(Debug)]
pub enum Step {
    /// Drive an instance into each target node and assert the observed
    /// acceptance matches the instance's expectations.
    SubmitInstance {
        targets: Vec<NodeId>,
        instance: TestInstance,
    },
    /// Provision and start a node under the given config. Ids are assigned
    /// in launch order, so scripts can name nodes ahead of time.
    LaunchNode {
        config: NodeConfig,
        init_data_dir: bool,
    },
    /// Have `a` dial `b`.
    ConnectNodes { a: NodeId, b: NodeId },
    /// Barrier: every started node must reach the builder's current tip.
    SyncAll { timeout: Duration },
    /// Assert a literal pattern is (or is never) present in a node's log.
    AssertLog {
        node: NodeId,
        pattern: String,
        present: bool,
        timeout: Duration,
    },
}

impl Step {
    /// Short human-readable form for progress logs and failure reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::SubmitInstance { targets, instance } => format!(
                "submit {} block(s) ({} bytes, sync_every_block={}) to {:?}",
                instance.len(),
                instance.total_bytes(),
                instance.sync_every_block(),
                targets,
            ),
            Self::LaunchNode {
                config,
                init_data_dir,
            } => format!(
                "launch node (stall_timeout={}s, min_download_speed={:?}, init_data_dir={})",
                config.ibd.stall_timeout_secs, config.ibd.min_download_speed, init_data_dir,
            ),
            Self::ConnectNodes { a, b } => format!("connect {a} -> {b}"),
            Self::SyncAll { timeout } => format!("sync_all within {timeout:?}"),
            Self::AssertLog {
                node,
                pattern,
                present,
                ..
            } => format!(
                "assert log of {node} {} '{pattern}'",
                if *present { "contains" } else { "never contains" },
            ),
        }
    }
}
