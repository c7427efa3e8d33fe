pub mod driver;
pub mod instance;
pub mod step;
pub mod verifier;
pub mod wait;

/// Boxed error used at the script seam, where concrete error types are the
/// script author's business.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use driver::{FailureReport, ScenarioDriver, ScenarioError, ScenarioReport, ScenarioScript,
    StepError};
pub use instance::TestInstance;
pub use step::Step;
pub use verifier::{AssertionError, AssertionTimeoutError};
pub use wait::wait_until;
