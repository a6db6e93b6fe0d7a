//! One turn of the agent loop: prompt, generate, parse, act.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::agents::Agent;
use crate::core::action::{Action, find_completion_sentinel, parse_action};
use crate::io::gateway::{ModelGateway, is_error_response};
use crate::io::prompt::TurnPrompt;
use crate::reflection::{REFLECTION_PREFIX, ReflectionSchedule};

/// First line of the tool entry appended after an unparsable response.
pub const JSON_ERROR_NOTICE: &str = "JSON parsing failed. Please provide valid JSON.";

/// What the model's response turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// A tool was dispatched (successfully or not).
    Tool { name: String },
    /// Structured `DONE` action.
    Done,
    /// `TASK_COMPLETE:` marker in raw text.
    Sentinel,
    /// No usable JSON action.
    ParseError,
}

/// Progress record handed to the loop's `on_step` callback.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based step number.
    pub step: u32,
    pub response: String,
    pub kind: StepKind,
    /// Tool result or parse diagnostic appended to the transcript.
    pub output: Option<String>,
    /// Whether a reflection entry was appended after this step.
    pub reflected: bool,
    /// Final result when this step ended the run.
    pub finished: Option<String>,
}

impl<G: ModelGateway + ?Sized> Agent<'_, G> {
    /// Execute step `index` (zero-based) of the current run.
    ///
    /// Errors are host-level only (prompt rendering); model and tool failures
    /// become transcript entries.
    #[instrument(skip_all, fields(step = index + 1, depth = self.depth))]
    pub(crate) fn run_step(&mut self, index: u32) -> Result<StepReport> {
        let step = index + 1;
        let prompt = self.prompts.turn_prompt(&TurnPrompt {
            system: &self.system_prompt,
            labels: self.settings.labels,
            goal: &self.goal,
            history: self.transcript.window(self.settings.window),
            first: index == 0,
        })?;
        let response = self.gateway.generate(&prompt, &self.params);
        if is_error_response(&response) {
            warn!(gateway = self.gateway.name(), "model gateway returned an error");
        }
        debug!(prompt_bytes = prompt.len(), response_bytes = response.len(), "model turn");

        let action = parse_action(&response);
        let sentinel = if self.settings.accept_sentinel {
            find_completion_sentinel(&response)
        } else {
            None
        };
        let (kind, output, checkpoint) = match (action, sentinel) {
            (Action::Done { result }, _) => {
                return Ok(self.finish(step, response, StepKind::Done, result));
            }
            (_, Some(result)) => {
                return Ok(self.finish(step, response, StepKind::Sentinel, result));
            }
            (Action::Tool { name, args }, None) => {
                let outcome = self.dispatch(&name, args);
                (StepKind::Tool { name }, outcome.output, outcome.checkpoint)
            }
            (Action::Error { message }, None) => {
                debug!(error = %message, "unparsable model response");
                (
                    StepKind::ParseError,
                    format!("{JSON_ERROR_NOTICE}\nDetails: {message}"),
                    false,
                )
            }
        };
        self.transcript.push_assistant(response.as_str());
        self.transcript.push_tool(output.as_str());

        let reflected =
            ReflectionSchedule::new(self.settings.reflection_interval).is_due(step, checkpoint);
        if reflected {
            let focus = if checkpoint { "checkpoint" } else { "overall" };
            let report = self.reflect(focus);
            self.transcript
                .push_tool(format!("{REFLECTION_PREFIX} {report}"));
        }

        Ok(StepReport {
            step,
            response,
            kind,
            output: Some(output),
            reflected,
            finished: None,
        })
    }

    fn finish(&mut self, step: u32, response: String, kind: StepKind, result: String) -> StepReport {
        self.transcript.push_assistant(response.as_str());
        StepReport {
            step,
            response,
            kind,
            output: None,
            reflected: false,
            finished: Some(result),
        }
    }
}
