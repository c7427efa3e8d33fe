use std::{
    fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    time::Duration,
};

use chain_harness_config::{
    NodeConfig,
    constants::{DEFAULT_STARTUP_TIMEOUT, DEFAULT_TIP_POLL_INTERVAL, NODE_CONFIG_FILENAME,
        NODE_LOG_FILENAME},
};
use tempfile::TempDir;
use tokio::time;
use tracing::{debug, info};

use super::{
    binary::{BinaryConfig, BinaryResolver},
    lifecycle::{is_running, kill_child},
};
use crate::{
    adjust_timeout,
    nodes::{ApiClient, create_tempdir, persist_tempdir, should_persist_tempdir},
};

const BIN_PATH: &str = "target/debug/chain-node";

fn binary_path() -> PathBuf {
    let cfg = BinaryConfig {
        env_var: "CHAIN_HARNESS_NODE_BIN",
        binary_name: "chain-node",
        fallback_path: BIN_PATH,
    };
    BinaryResolver::resolve_path(&cfg)
}

#[derive(Debug, thiserror::Error)]
pub enum NodeStartError {
    #[error("failed to create data dir for node '{name}': {source}")]
    DataDir {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write node config at {path}: {source}")]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to render node config for '{name}': {source}")]
    RenderConfig {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to spawn node process '{binary}': {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("node '{name}' did not answer RPC within {timeout:?}")]
    Readiness { name: String, timeout: Duration },
}

/// A started node: the child process, its owned data directory and the
/// clients used to reach it.
pub struct NodeHandle {
    pub(crate) child: Child,
    pub(crate) tempdir: TempDir,
    pub(crate) persisted: bool,
    config: NodeConfig,
    api: ApiClient,
    p2p_addr: SocketAddr,
    name: String,
}

impl NodeHandle {
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub const fn p2p_addr(&self) -> SocketAddr {
        self.p2p_addr
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.tempdir.path()
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.tempdir.path().join(NODE_LOG_FILENAME)
    }

    pub fn is_running(&mut self) -> bool {
        is_running(&mut self.child)
    }

    /// Returns true if the process exited within the timeout.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        time::timeout(timeout, async {
            loop {
                if !is_running(&mut self.child) {
                    return;
                }
                time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Keep the data dir on disk and return its path.
    pub fn persist_data_dir(&mut self) -> io::Result<PathBuf> {
        self.persisted = true;
        persist_tempdir(&mut self.tempdir, &self.name)
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if !self.persisted
            && should_persist_tempdir()
            && let Err(e) = persist_tempdir(&mut self.tempdir, &self.name)
        {
            debug!(error = ?e, node = %self.name, "failed to persist node data dir");
        }

        debug!(node = %self.name, "stopping node process");
        kill_child(&mut self.child);
    }
}

/// Write the config file, spawn the node binary and wait until it answers
/// its first RPC.
pub async fn spawn_node(
    name: &str,
    config: NodeConfig,
    tempdir: TempDir,
) -> Result<NodeHandle, NodeStartError> {
    let config_path = tempdir.path().join(NODE_CONFIG_FILENAME);
    write_config(name, &config, &config_path)?;

    let binary = binary_path();
    debug!(
        node = name,
        config_file = %config_path.display(),
        binary = %binary.display(),
        "spawning node process"
    );

    let child = Command::new(&binary)
        .arg(&config_path)
        .current_dir(tempdir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| NodeStartError::Spawn {
            binary: binary.clone(),
            source,
        })?;

    let rpc_addr: SocketAddr = ([127, 0, 0, 1], config.rpc.listen_port).into();
    let p2p_addr: SocketAddr = ([127, 0, 0, 1], config.network.listen_port).into();
    let mut handle = NodeHandle {
        child,
        tempdir,
        persisted: false,
        api: ApiClient::new(rpc_addr),
        config,
        p2p_addr,
        name: name.to_owned(),
    };

    let timeout = adjust_timeout(DEFAULT_STARTUP_TIMEOUT);
    let ready = time::timeout(timeout, async {
        loop {
            if handle.api.chain_info().await.is_ok() {
                break;
            }
            time::sleep(DEFAULT_TIP_POLL_INTERVAL).await;
        }
    })
    .await;

    if ready.is_err() {
        // Keep the dir so a failed startup can be diagnosed.
        let _ = handle.persist_data_dir();
        return Err(NodeStartError::Readiness {
            name: name.to_owned(),
            timeout,
        });
    }

    info!(node = name, rpc = %rpc_addr, p2p = %p2p_addr, "node ready");
    Ok(handle)
}

/// Provision a fresh data directory for a node.
pub fn provision_data_dir(name: &str) -> Result<TempDir, NodeStartError> {
    create_tempdir().map_err(|source| NodeStartError::DataDir {
        name: name.to_owned(),
        source,
    })
}

/// Pre-create the on-disk layout a fresh node expects so state-persisting
/// services do not fail on first boot.
pub fn init_state_paths(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir.join("blocks"))?;
    fs::create_dir_all(dir.join("state"))
}

fn write_config(name: &str, config: &NodeConfig, path: &Path) -> Result<(), NodeStartError> {
    let rendered =
        serde_yaml::to_string(config).map_err(|source| NodeStartError::RenderConfig {
            name: name.to_owned(),
            source,
        })?;
    fs::write(path, rendered).map_err(|source| NodeStartError::WriteConfig {
        path: path.to_path_buf(),
        source,
    })
}
