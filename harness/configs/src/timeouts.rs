use std::{env, time::Duration};

pub const SYNC_ALL_TIMEOUT_SECS: u64 = 120;
pub const SUBMIT_BLOCK_TIMEOUT_SECS: u64 = 120;
pub const LOG_ASSERT_TIMEOUT_SECS: u64 = 30;
pub const REJECT_SETTLE_SECS: u64 = 2;

fn env_duration(key: &str, default: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

/// Barrier timeout for `sync_all` when the scenario does not choose one.
pub fn sync_all_timeout() -> Duration {
    env_duration("CHAIN_HARNESS_SYNC_TIMEOUT_SECS", SYNC_ALL_TIMEOUT_SECS)
}

/// Per-block wait for a submitted block to become the node's best tip.
pub fn submit_block_timeout() -> Duration {
    env_duration(
        "CHAIN_HARNESS_SUBMIT_TIMEOUT_SECS",
        SUBMIT_BLOCK_TIMEOUT_SECS,
    )
}

/// Bounded wait for a log-presence assertion.
pub fn log_assert_timeout() -> Duration {
    env_duration("CHAIN_HARNESS_LOG_TIMEOUT_SECS", LOG_ASSERT_TIMEOUT_SECS)
}

/// Settle wait before concluding a block was not accepted.
pub fn reject_settle() -> Duration {
    env_duration("CHAIN_HARNESS_REJECT_SETTLE_SECS", REJECT_SETTLE_SECS)
}
