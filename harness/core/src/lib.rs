pub mod chain;
pub mod nodes;
pub mod scenario;

use std::{ops::Mul as _, sync::LazyLock, time::Duration};

static IS_SLOW_TEST_ENV: LazyLock<bool> = LazyLock::new(chain_harness_env::slow_test_env);

/// In slow test environments like shared CI runners, use 2x timeout.
#[must_use]
pub fn adjust_timeout(d: Duration) -> Duration {
    if *IS_SLOW_TEST_ENV { d.mul(2) } else { d }
}
