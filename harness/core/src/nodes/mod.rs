pub mod api_client;
pub mod common;
pub mod fleet;
pub mod peer_client;

use std::{io, mem, path::PathBuf};

use tempfile::TempDir;
use tracing::info;

pub use api_client::{ApiClient, ChainInfo, NetworkInfo};
pub use common::node::{NodeHandle, NodeStartError};
pub use fleet::{FleetError, NodeFleet, NodeId, SubmitOutcome, SyncTimeoutError};
pub use peer_client::{PeerChannel, PeerProtocolError};

const TEMPDIR_PREFIX: &str = "chain-harness";

/// Create a fresh data directory for one node.
pub fn create_tempdir() -> io::Result<TempDir> {
    match chain_harness_env::harness_log_dir() {
        Some(base) => {
            std::fs::create_dir_all(&base)?;
            tempfile::Builder::new().prefix(TEMPDIR_PREFIX).tempdir_in(base)
        }
        None => tempfile::Builder::new().prefix(TEMPDIR_PREFIX).tempdir(),
    }
}

/// Detach a tempdir from deletion-on-drop and return its path, so node logs
/// and state survive for post-mortem inspection.
pub fn persist_tempdir(tempdir: &mut TempDir, label: &str) -> io::Result<PathBuf> {
    let replacement = create_tempdir()?;
    let path = mem::replace(tempdir, replacement).keep();
    info!(label, path = %path.display(), "persisted node data dir");
    Ok(path)
}

#[must_use]
pub fn should_persist_tempdir() -> bool {
    chain_harness_env::harness_keep_logs()
}
