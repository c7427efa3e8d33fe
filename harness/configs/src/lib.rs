pub mod constants;
pub mod net;
pub mod node;
pub mod timeouts;

pub use constants::{ONE_GIGABYTE, ONE_KILOBYTE, ONE_MEGABYTE};
pub use node::{IbdSection, LimitsSection, LogSection, NetworkSection, NodeConfig, RpcSection};
