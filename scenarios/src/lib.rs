pub mod defaults;
pub mod stalling;

use std::{env, str::FromStr};

pub use stalling::{STALL_LOG_PATTERN, StallingParams, StallingScript};

/// First parseable value among the given env vars, else the default.
pub fn read_env_any<T>(keys: &[&str], default: T) -> T
where
    T: FromStr + Copy,
{
    keys.iter()
        .find_map(|key| env::var(key).ok().and_then(|raw| raw.parse::<T>().ok()))
        .unwrap_or(default)
}
