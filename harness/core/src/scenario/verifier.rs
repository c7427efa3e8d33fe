use std::{fs, io, path::Path, path::PathBuf, time::Duration};

use chain_harness_config::constants::DEFAULT_LOG_POLL_INTERVAL;
use thiserror::Error;
use tracing::debug;

use super::wait::wait_until;
use crate::{
    chain::BlockId,
    nodes::ApiClient,
};

/// A bounded wait on an asynchronous condition elapsed. Carries the last
/// observed state so the failure can be diagnosed without re-running.
#[derive(Debug, Error)]
#[error("assertion on {node} timed out after {timeout:?} waiting for '{pattern}' ({last_observed})")]
pub struct AssertionTimeoutError {
    pub node: String,
    pub pattern: String,
    pub timeout: Duration,
    pub last_observed: String,
}

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error(transparent)]
    Timeout(#[from] AssertionTimeoutError),
    #[error("log of {node} unexpectedly contains '{pattern}'")]
    UnexpectedLogLine { node: String, pattern: String },
    #[error("failed to read log at {path}: {source}")]
    LogRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("node {node} best tip is {observed:?}, expected {expected}")]
    TipMismatch {
        node: String,
        expected: BlockId,
        observed: Option<BlockId>,
    },
}

/// Assert the node currently reports `expected` as its best tip.
pub async fn expect_accepted(
    api: &ApiClient,
    node: &str,
    expected: BlockId,
) -> Result<(), AssertionError> {
    let observed = api.best_tip().await.ok();
    if observed == Some(expected) {
        Ok(())
    } else {
        Err(AssertionError::TipMismatch {
            node: node.to_owned(),
            expected,
            observed,
        })
    }
}

/// Assert a literal pattern is (`present = true`) or is never
/// (`present = false`) in the node's log.
///
/// Presence is polled with a bounded wait, because the condition that emits
/// the line (a stall firing after its timeout) is asynchronous. Absence is a
/// single scan of the entire file as it stands; callers sequence it after
/// the sync barrier that ends the window in which the line could appear.
pub async fn expect_log_message(
    node: &str,
    log_path: &Path,
    pattern: &str,
    present: bool,
    timeout: Duration,
) -> Result<(), AssertionError> {
    if present {
        let found = wait_until(
            || async { matches!(scan_log(log_path, pattern), Ok(true)) },
            DEFAULT_LOG_POLL_INTERVAL,
            timeout,
        )
        .await;

        if found {
            debug!(node, pattern, "log line observed");
            return Ok(());
        }
        let last_observed = match fs::metadata(log_path) {
            Ok(meta) => format!("log is {} bytes, pattern absent", meta.len()),
            Err(_) => "log file does not exist".to_owned(),
        };
        return Err(AssertionTimeoutError {
            node: node.to_owned(),
            pattern: pattern.to_owned(),
            timeout,
            last_observed,
        }
        .into());
    }

    if scan_log(log_path, pattern)? {
        return Err(AssertionError::UnexpectedLogLine {
            node: node.to_owned(),
            pattern: pattern.to_owned(),
        });
    }
    debug!(node, pattern, "log line absent across full log");
    Ok(())
}

/// Substring-search the full log file. A missing file reads as empty when
/// probing for presence; surfacing that distinction is the caller's job via
/// `AssertionTimeoutError::last_observed`.
pub fn scan_log(path: &Path, pattern: &str) -> Result<bool, AssertionError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.contains(pattern)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(AssertionError::LogRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
