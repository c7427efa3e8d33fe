use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use super::{DynError, step::Step, verifier};
use crate::{
    adjust_timeout,
    chain::{BlockId, ChainBuildError, ChainBuilder},
    nodes::{FleetError, NodeFleet},
    scenario::verifier::AssertionError,
};

/// A failure of one executed step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Fleet(#[from] FleetError),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
    #[error(transparent)]
    Chain(#[from] ChainBuildError),
    #[error("{node} acceptance mismatch for block {block}: expected accepted={expected}, observed accepted={observed}")]
    AcceptanceMismatch {
        node: String,
        block: BlockId,
        expected: bool,
        observed: bool,
    },
    #[error("cannot {action} before any block or genesis exists")]
    TipUnavailable { action: &'static str },
}

/// Where to look after a failed run: every captured node data directory
/// (config, state, log) kept on disk past teardown.
#[derive(Debug, Default)]
pub struct FailureReport {
    pub node_dirs: Vec<(String, PathBuf)>,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node_dirs.is_empty() {
            return f.write_str("no node data dirs captured");
        }
        f.write_str("captured node data dirs:")?;
        for (name, path) in &self.node_dirs {
            write!(f, "\n  {name}: {}", path.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario '{name}' failed to produce step {index}")]
    Script {
        name: String,
        index: usize,
        source: DynError,
    },
    #[error("step {index} failed: {step}\n{report}")]
    StepFailed {
        index: usize,
        step: String,
        report: FailureReport,
        #[source]
        source: StepError,
    },
}

/// Summary of a completed run.
#[derive(Clone, Copy, Debug)]
pub struct ScenarioReport {
    pub steps_executed: usize,
}

#[async_trait]
/// Lazily yields the ordered steps of one scenario.
///
/// The driver hands the script mutable access to the chain builder so block
/// construction and output bookkeeping happen while the step is produced;
/// the next call only happens once the previous step fully resolved. The
/// sequence is finite and not restartable: chain state and saved outputs are
/// consumed in place.
pub trait ScenarioScript: Send {
    fn name(&self) -> &str;

    async fn next_step(&mut self, chain: &mut ChainBuilder)
    -> Result<Option<Step>, DynError>;
}

/// Executes a script's steps strictly in order against a fleet it owns.
///
/// The first failure aborts the remaining sequence, captures every node's
/// data directory and reports which step failed with expected vs observed
/// detail; nothing is retried.
pub struct ScenarioDriver {
    chain: ChainBuilder,
    fleet: NodeFleet,
}

impl ScenarioDriver {
    #[must_use]
    pub fn new(chain: ChainBuilder) -> Self {
        Self {
            chain,
            fleet: NodeFleet::new(),
        }
    }

    #[must_use]
    pub const fn chain(&self) -> &ChainBuilder {
        &self.chain
    }

    #[must_use]
    pub const fn fleet(&self) -> &NodeFleet {
        &self.fleet
    }

    #[must_use]
    pub const fn fleet_mut(&mut self) -> &mut NodeFleet {
        &mut self.fleet
    }

    pub async fn run(
        &mut self,
        script: &mut dyn ScenarioScript,
    ) -> Result<ScenarioReport, ScenarioError> {
        let mut index = 0;
        loop {
            let step = script.next_step(&mut self.chain).await.map_err(|source| {
                ScenarioError::Script {
                    name: script.name().to_owned(),
                    index,
                    source,
                }
            })?;
            let Some(step) = step else { break };

            info!(
                scenario = script.name(),
                index,
                step = %step.describe(),
                "executing step"
            );
            if let Err(source) = self.execute(&step).await {
                let report = FailureReport {
                    node_dirs: self.fleet.persist_data_dirs(),
                };
                error!(index, error = %source, "scenario step failed");
                return Err(ScenarioError::StepFailed {
                    index,
                    step: step.describe(),
                    report,
                    source,
                });
            }
            index += 1;
        }

        info!(scenario = script.name(), steps = index, "scenario complete");
        Ok(ScenarioReport {
            steps_executed: index,
        })
    }

    async fn execute(&mut self, step: &Step) -> Result<(), StepError> {
        match step {
            Step::SubmitInstance { targets, instance } => {
                let results = self.fleet.submit_to_all(targets, instance).await?;
                for (id, outcomes) in results {
                    let node = self.fleet.node_name(id)?.to_owned();
                    if instance.sync_every_block() {
                        for ((block, expected), outcome) in
                            instance.entries().iter().zip(&outcomes)
                        {
                            if *expected != outcome.accepted {
                                return Err(StepError::AcceptanceMismatch {
                                    node,
                                    block: block.id(),
                                    expected: *expected,
                                    observed: outcome.accepted,
                                });
                            }
                        }
                    } else if let Some(outcome) = outcomes.first()
                        && !outcome.accepted
                    {
                        return Err(StepError::AcceptanceMismatch {
                            node,
                            block: outcome.block,
                            expected: true,
                            observed: false,
                        });
                    }
                }
                Ok(())
            }
            Step::LaunchNode {
                config,
                init_data_dir,
            } => {
                let id = self.fleet.add_node(config.clone(), *init_data_dir)?;
                self.fleet.start_node(id).await?;

                // The external node owns genesis; pin the builder's ancestry
                // root from the first node that comes up.
                if self.chain.genesis().is_none() {
                    let tip = self.fleet.api(id)?.best_tip().await.map_err(|source| {
                        FleetError::Rpc {
                            node: id.to_string(),
                            source,
                        }
                    })?;
                    self.chain.set_genesis(tip)?;
                }
                Ok(())
            }
            Step::ConnectNodes { a, b } => Ok(self.fleet.connect(*a, *b).await?),
            Step::SyncAll { timeout } => {
                let tip = self
                    .chain
                    .tip_id()
                    .ok_or(StepError::TipUnavailable { action: "sync_all" })?;
                Ok(self.fleet.sync_all(tip, adjust_timeout(*timeout)).await?)
            }
            Step::AssertLog {
                node,
                pattern,
                present,
                timeout,
            } => {
                let name = self.fleet.node_name(*node)?.to_owned();
                let path = self.fleet.log_path(*node)?;
                verifier::expect_log_message(
                    &name,
                    &path,
                    pattern,
                    *present,
                    adjust_timeout(*timeout),
                )
                .await?;
                Ok(())
            }
        }
    }
}
