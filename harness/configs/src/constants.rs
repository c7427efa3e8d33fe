use std::time::Duration;

pub const ONE_KILOBYTE: usize = 1024;
pub const ONE_MEGABYTE: usize = 1024 * ONE_KILOBYTE;
pub const ONE_GIGABYTE: usize = 1024 * ONE_MEGABYTE;

/// Default poll interval when watching a node's best tip.
pub const DEFAULT_TIP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default poll interval when watching a node's log file.
pub const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time allowed for a spawned node to answer its first RPC.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Config file written into each node's data directory.
pub const NODE_CONFIG_FILENAME: &str = "config.yaml";

/// Log file each node writes into its data directory.
pub const NODE_LOG_FILENAME: &str = "node.log";
