//! The bounded agent loop behind `coder run` and every sub-agent.

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use crate::agents::Agent;
use crate::core::budget::StepBudget;
use crate::core::transcript::Transcript;
use crate::io::gateway::ModelGateway;
use crate::step::StepReport;

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model reported completion. `steps` counts the finishing step.
    Done { result: String, steps: u32 },
    /// The step budget ran out first.
    MaxStepsExceeded { max_steps: u32 },
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Text reported to the user or folded into a parent transcript.
    pub fn message(&self) -> String {
        match self {
            Self::Done { result, .. } => result.clone(),
            Self::MaxStepsExceeded { max_steps } => {
                format!("Max steps ({max_steps}) reached without completion.")
            }
        }
    }
}

impl<G: ModelGateway + ?Sized> Agent<'_, G> {
    /// Run the loop for `goal` until DONE or the step budget is spent.
    pub fn run(&mut self, goal: &str) -> Result<RunOutcome> {
        self.run_with(goal, |_| {})
    }

    /// Like [`Agent::run`], calling `on_step` after every step.
    ///
    /// Each run starts with an empty transcript; tasks and touched files carry over.
    #[instrument(skip_all, fields(depth = self.depth, max_steps = self.settings.max_steps))]
    pub fn run_with<F: FnMut(&StepReport)>(
        &mut self,
        goal: &str,
        mut on_step: F,
    ) -> Result<RunOutcome> {
        let goal = goal.trim();
        if goal.is_empty() {
            bail!("goal must not be empty");
        }
        self.goal = goal.to_string();
        self.transcript = Transcript::new();

        let mut budget = StepBudget::new(self.settings.max_steps);
        info!(gateway = self.gateway.name(), "run started");
        while let Some(index) = budget.claim() {
            let report = self.run_step(index)?;
            on_step(&report);
            if let Some(result) = report.finished {
                info!(steps = report.step, "run finished");
                return Ok(RunOutcome::Done {
                    result,
                    steps: report.step,
                });
            }
        }
        warn!(used = budget.used(), "step budget exhausted");
        Ok(RunOutcome::MaxStepsExceeded {
            max_steps: budget.max_steps(),
        })
    }
}
