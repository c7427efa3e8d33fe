use std::{fmt, mem, net::SocketAddr, path::PathBuf, time::Duration};

use chain_harness_config::{
    NodeConfig, constants::DEFAULT_TIP_POLL_INTERVAL, net::get_available_tcp_port, timeouts,
};
use futures::future::try_join_all;
use tempfile::TempDir;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    api_client::ApiClient,
    common::node::{NodeHandle, NodeStartError, init_state_paths, provision_data_dir, spawn_node},
    peer_client::{PeerChannel, PeerProtocolError},
};
use crate::{adjust_timeout, chain::BlockId, scenario::instance::TestInstance, scenario::wait::wait_until};

/// Index of a node within the fleet, assigned in `add_node` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Observed acceptance of one submitted block (or of a batch tip).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub block: BlockId,
    pub accepted: bool,
}

/// `sync_all` gave up before every node reached the expected tip.
#[derive(Debug, Error)]
#[error("nodes did not converge on tip {expected} within {timeout:?}; divergent: {divergent:?}")]
pub struct SyncTimeoutError {
    pub expected: BlockId,
    pub timeout: Duration,
    /// Names and last observed tips of the nodes that had not converged.
    pub divergent: Vec<(String, Option<BlockId>)>,
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
    #[error("node {0} has not been started")]
    NotStarted(NodeId),
    #[error("node {0} is already started")]
    AlreadyStarted(NodeId),
    #[error("failed to allocate a free TCP port for {node}")]
    PortAllocation { node: String },
    #[error(transparent)]
    Start(#[from] NodeStartError),
    #[error(transparent)]
    Peer(#[from] PeerProtocolError),
    #[error(transparent)]
    SyncTimeout(#[from] SyncTimeoutError),
    #[error("RPC request to {node} failed: {source}")]
    Rpc {
        node: String,
        #[source]
        source: reqwest::Error,
    },
}

enum NodeState {
    Provisioned { tempdir: TempDir, config: NodeConfig },
    Started(NodeHandle),
    Failed,
}

struct FleetEntry {
    name: String,
    state: NodeState,
}

/// Owns the lifecycle of every node in a scenario: provisioning, startup,
/// peer wiring, simulated-peer submission and the cross-node sync barrier.
/// Scripts refer to nodes only by `NodeId`.
#[derive(Default)]
pub struct NodeFleet {
    entries: Vec<FleetEntry>,
}

impl NodeFleet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a node: allocate its ports, create its data directory and
    /// stage its config. The config is immutable from here on.
    pub fn add_node(
        &mut self,
        config: NodeConfig,
        init_data_dir: bool,
    ) -> Result<NodeId, FleetError> {
        let id = NodeId(self.entries.len());
        let name = id.to_string();

        let rpc_port = get_available_tcp_port()
            .ok_or_else(|| FleetError::PortAllocation { node: name.clone() })?;
        let p2p_port = get_available_tcp_port()
            .ok_or_else(|| FleetError::PortAllocation { node: name.clone() })?;
        let config = config.with_ports(rpc_port, p2p_port);

        let tempdir = provision_data_dir(&name)?;
        if init_data_dir {
            init_state_paths(tempdir.path()).map_err(|source| NodeStartError::DataDir {
                name: name.clone(),
                source,
            })?;
        }

        info!(
            node = %name,
            rpc_port,
            p2p_port,
            dir = %tempdir.path().display(),
            "provisioned node"
        );
        self.entries.push(FleetEntry {
            name,
            state: NodeState::Provisioned { tempdir, config },
        });
        Ok(id)
    }

    /// Launch a provisioned node and wait for it to answer RPC.
    pub async fn start_node(&mut self, id: NodeId) -> Result<(), FleetError> {
        let entry = self
            .entries
            .get_mut(id.index())
            .ok_or(FleetError::UnknownNode(id))?;

        match mem::replace(&mut entry.state, NodeState::Failed) {
            NodeState::Provisioned { tempdir, config } => {
                let handle = spawn_node(&entry.name, config, tempdir).await?;
                entry.state = NodeState::Started(handle);
                Ok(())
            }
            NodeState::Started(handle) => {
                entry.state = NodeState::Started(handle);
                Err(FleetError::AlreadyStarted(id))
            }
            NodeState::Failed => Err(FleetError::NotStarted(id)),
        }
    }

    /// Make node `a` dial node `b`'s P2P listener.
    pub async fn connect(&self, a: NodeId, b: NodeId) -> Result<(), FleetError> {
        let dialer = self.started(a)?;
        let target = self.started(b)?;
        let address = target.p2p_addr().to_string();

        debug!(from = %dialer.name(), to = %target.name(), %address, "connecting nodes");
        dialer
            .api()
            .connect_peer(&address)
            .await
            .map_err(|source| FleetError::Rpc {
                node: dialer.name().to_owned(),
                source,
            })
    }

    /// Drive one instance into one node over the simulated-peer channel.
    ///
    /// With `sync_every_block` each block's acceptance is observed before the
    /// next is sent; otherwise the whole batch is streamed and only the final
    /// expected tip is observed, so the returned vector holds one outcome.
    pub async fn submit(
        &self,
        target: NodeId,
        instance: &TestInstance,
    ) -> Result<Vec<SubmitOutcome>, FleetError> {
        let handle = self.started(target)?;
        let api = handle.api().clone();
        let mut peer = PeerChannel::connect(handle.p2p_addr()).await?;
        let mut outcomes = Vec::new();

        if instance.sync_every_block() {
            for (block, expected) in instance.entries() {
                peer.send_block(block).await?;
                let accepted = if *expected {
                    let timeout = adjust_timeout(timeouts::submit_block_timeout());
                    wait_for_tip(&api, block.id(), timeout).await
                } else {
                    // Give the node a moment to (wrongly) adopt the block
                    // before reading the tip.
                    sleep(timeouts::reject_settle()).await;
                    self.best_tip_of(handle).await? == Some(block.id())
                };
                debug!(node = %handle.name(), block = %block.id(), accepted, "block outcome");
                outcomes.push(SubmitOutcome {
                    block: block.id(),
                    accepted,
                });
            }
        } else {
            for (block, _) in instance.entries() {
                peer.send_block(block).await?;
            }
            if let Some(expected_tip) = instance.final_expected_tip() {
                let timeout = adjust_timeout(timeouts::submit_block_timeout());
                let accepted = wait_for_tip(&api, expected_tip, timeout).await;
                debug!(node = %handle.name(), tip = %expected_tip, accepted, "batch outcome");
                outcomes.push(SubmitOutcome {
                    block: expected_tip,
                    accepted,
                });
            }
        }

        Ok(outcomes)
    }

    /// Submit one instance to several nodes concurrently. Submissions to a
    /// single node stay strictly ordered; across nodes there is no ordering
    /// guarantee.
    pub async fn submit_to_all(
        &self,
        targets: &[NodeId],
        instance: &TestInstance,
    ) -> Result<Vec<(NodeId, Vec<SubmitOutcome>)>, FleetError> {
        let submissions = targets.iter().map(|id| async move {
            self.submit(*id, instance).await.map(|outcomes| (*id, outcomes))
        });
        try_join_all(submissions).await
    }

    /// Block until every started node reports the expected best tip, or fail
    /// with the set of divergent nodes.
    pub async fn sync_all(
        &self,
        expected: BlockId,
        timeout: Duration,
    ) -> Result<(), FleetError> {
        let watched: Vec<(String, ApiClient)> = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.state {
                NodeState::Started(handle) => {
                    Some((entry.name.clone(), handle.api().clone()))
                }
                _ => None,
            })
            .collect();

        info!(nodes = watched.len(), tip = %expected, timeout_secs = timeout.as_secs(), "sync barrier");

        let converged = wait_until(
            || {
                let watched = watched.clone();
                async move {
                    for (_, api) in &watched {
                        if api.best_tip().await.ok() != Some(expected) {
                            return false;
                        }
                    }
                    true
                }
            },
            DEFAULT_TIP_POLL_INTERVAL,
            timeout,
        )
        .await;

        if converged {
            return Ok(());
        }

        let mut divergent = Vec::new();
        for (name, api) in &watched {
            let tip = api.best_tip().await.ok();
            if tip != Some(expected) {
                warn!(node = %name, tip = ?tip, "node diverged at sync barrier");
                divergent.push((name.clone(), tip));
            }
        }
        Err(SyncTimeoutError {
            expected,
            timeout,
            divergent,
        }
        .into())
    }

    pub fn api(&self, id: NodeId) -> Result<&ApiClient, FleetError> {
        Ok(self.started(id)?.api())
    }

    pub fn node_name(&self, id: NodeId) -> Result<&str, FleetError> {
        self.entries
            .get(id.index())
            .map(|entry| entry.name.as_str())
            .ok_or(FleetError::UnknownNode(id))
    }

    pub fn log_path(&self, id: NodeId) -> Result<PathBuf, FleetError> {
        Ok(self.started(id)?.log_path())
    }

    pub fn p2p_addr(&self, id: NodeId) -> Result<SocketAddr, FleetError> {
        Ok(self.started(id)?.p2p_addr())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detach every started node's data dir from cleanup and return the
    /// kept paths, for inclusion in a failure report.
    pub fn persist_data_dirs(&mut self) -> Vec<(String, PathBuf)> {
        let mut kept = Vec::new();
        for entry in &mut self.entries {
            if let NodeState::Started(handle) = &mut entry.state
                && let Ok(path) = handle.persist_data_dir()
            {
                kept.push((entry.name.clone(), path));
            }
        }
        kept
    }

    fn started(&self, id: NodeId) -> Result<&NodeHandle, FleetError> {
        match &self
            .entries
            .get(id.index())
            .ok_or(FleetError::UnknownNode(id))?
            .state
        {
            NodeState::Started(handle) => Ok(handle),
            _ => Err(FleetError::NotStarted(id)),
        }
    }

    async fn best_tip_of(&self, handle: &NodeHandle) -> Result<Option<BlockId>, FleetError> {
        handle
            .api()
            .best_tip()
            .await
            .map(Some)
            .map_err(|source| FleetError::Rpc {
                node: handle.name().to_owned(),
                source,
            })
    }
}

/// Poll the node's best tip until it matches, reporting the final verdict
/// rather than failing: acceptance is an observation, not an assertion.
async fn wait_for_tip(api: &ApiClient, expected: BlockId, timeout: Duration) -> bool {
    wait_until(
        || {
            let api = api.clone();
            async move { api.best_tip().await.ok() == Some(expected) }
        },
        DEFAULT_TIP_POLL_INTERVAL,
        timeout,
    )
    .await
}
