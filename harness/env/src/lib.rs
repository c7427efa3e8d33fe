use std::{env, path::PathBuf};

#[must_use]
pub fn slow_test_env() -> bool {
    env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true")
}

/// Path to the node binary under test.
#[must_use]
pub fn harness_node_bin() -> Option<PathBuf> {
    env::var("CHAIN_HARNESS_NODE_BIN").ok().map(PathBuf::from)
}

#[must_use]
pub fn harness_log_dir() -> Option<PathBuf> {
    env::var("CHAIN_HARNESS_LOG_DIR").ok().map(PathBuf::from)
}

#[must_use]
pub fn harness_log_level() -> Option<String> {
    env::var("CHAIN_HARNESS_LOG_LEVEL").ok()
}

#[must_use]
pub fn harness_keep_logs() -> bool {
    env::var("CHAIN_HARNESS_KEEP_LOGS").is_ok()
}

/// Override for the minimum download speed (bytes/s) used by the stalling
/// scenario. The stall assertion is bandwidth-sensitive, so CI environments
/// with unusual disk or loopback throughput can tune it here.
#[must_use]
pub fn harness_stall_min_speed() -> Option<u64> {
    parse_var("CHAIN_HARNESS_STALL_MIN_SPEED")
}

#[must_use]
pub fn harness_big_block_size() -> Option<usize> {
    parse_var("CHAIN_HARNESS_BIG_BLOCK_SIZE")
}

#[must_use]
pub fn harness_chain_length() -> Option<usize> {
    parse_var("CHAIN_HARNESS_CHAIN_LENGTH")
}

#[must_use]
pub fn harness_sync_timeout_secs() -> Option<u64> {
    parse_var("CHAIN_HARNESS_SYNC_TIMEOUT_SECS")
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
