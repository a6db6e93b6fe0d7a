//! Periodic status reports injected into the transcript.
//!
//! A reflection is not a model-chosen action when triggered by the loop: it is
//! appended as an extra `REFLECTION:` tool entry after scheduled steps and
//! checkpoint tools, and does not consume a step.

use std::fmt::Write as _;

use anyhow::Result;
use tracing::{debug, warn};

use crate::agents::Agent;
use crate::core::critic::{IssueKind, SourceLanguage};
use crate::core::types::{StatusCounts, Task};
use crate::io::export::FileQuality;
use crate::io::gateway::ModelGateway;

/// Prefix of the transcript entry carrying a loop-triggered reflection.
pub const REFLECTION_PREFIX: &str = "REFLECTION:";
const QUALITY_SAMPLE: usize = 3;
const PRIORITY_LIMIT: usize = 5;

/// When the loop injects a reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionSchedule {
    interval: u32,
}

impl ReflectionSchedule {
    /// `interval == 0` disables the periodic trigger; checkpoints still fire.
    pub fn new(interval: u32) -> Self {
        Self { interval }
    }

    /// `step` is 1-based.
    pub fn is_due(&self, step: u32, checkpoint: bool) -> bool {
        checkpoint || (self.interval > 0 && step % self.interval == 0)
    }
}

/// Critic result for one recently touched file.
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySample {
    pub path: String,
    pub score: f64,
    /// Whether the critique found any security issue.
    pub security: bool,
}

/// Everything a report is built from.
#[derive(Debug, Clone)]
pub struct ReflectionInputs<'a> {
    pub focus: &'a str,
    pub counts: StatusCounts,
    pub priorities: Vec<&'a Task>,
    pub requirements: Option<&'a str>,
    pub listing: &'a str,
    /// Recently touched source files, newest first.
    pub quality: Vec<QualitySample>,
    pub target_score: f64,
}

fn recommendations(input: &ReflectionInputs<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if input.requirements.is_none() {
        out.push("Load a requirements document with load_requirements to guide the work".to_string());
    }
    if input.counts.in_progress > 1 {
        out.push("Finish the in-progress tasks before starting new ones".to_string());
    } else if input.counts.open() == 0 {
        out.push("Create specific tasks for the remaining work".to_string());
    }
    for sample in &input.quality {
        if sample.security {
            out.push(format!("Fix the security issues in {}", sample.path));
        }
        if sample.score < input.target_score {
            out.push(format!(
                "Run improve_code on {} (score {:.1} below target {:.1})",
                sample.path, sample.score, input.target_score
            ));
        }
    }
    if out.is_empty() {
        out.push("Continue with the current plan".to_string());
    }
    out
}

/// Deterministic text report.
pub fn render_reflection(input: &ReflectionInputs<'_>) -> String {
    let mut out = String::new();
    let c = input.counts;
    let _ = writeln!(out, "REFLECTION AND ASSESSMENT (focus: {})", input.focus);
    let _ = writeln!(out, "{}", "=".repeat(40));

    out.push_str("\nTASK STATUS:\n");
    if c.total() == 0 {
        out.push_str("- No tasks created yet\n");
    } else {
        let _ = writeln!(
            out,
            "- {} total: {} pending, {} in progress, {} completed",
            c.total(),
            c.pending,
            c.in_progress,
            c.completed
        );
    }

    out.push_str("\nREQUIREMENTS:\n");
    match input.requirements {
        Some(path) => {
            let _ = writeln!(out, "- Loaded from {path}");
        }
        None => out.push_str("- No requirements loaded\n"),
    }

    let _ = writeln!(out, "\nPROJECT FILES:\n{}", input.listing.trim_end());

    out.push_str("\nNEXT PRIORITIES:\n");
    if input.priorities.is_empty() {
        out.push_str("- none\n");
    }
    for (i, task) in input.priorities.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. #{} {} [{}, {}]",
            i + 1,
            task.id,
            task.description,
            task.priority,
            task.status
        );
    }

    if !input.quality.is_empty() {
        out.push_str("\nCODE QUALITY (recently touched):\n");
        for sample in &input.quality {
            let _ = writeln!(out, "- {}: {:.1}/100", sample.path, sample.score);
        }
    }

    out.push_str("\nASSESSMENT QUESTIONS:\n");
    let _ = writeln!(
        out,
        "- Is the work moving toward the goal? {}",
        if input.requirements.is_some() {
            "Check it against the loaded requirements."
        } else {
            "No requirements loaded."
        }
    );
    out.push_str("- Are there blocking errors in recent tool results?\n");
    out.push_str("- Is the project structure in place?\n");
    out.push_str("- Are tests set up and passing?\n");
    out.push_str("- Is the current approach working?\n");

    out.push_str("\nRECOMMENDATIONS:\n");
    for line in recommendations(input) {
        let _ = writeln!(out, "- {line}");
    }
    out.push_str("\nREFLECTION COMPLETE - continue with the next action.");
    out
}

impl<G: ModelGateway + ?Sized> Agent<'_, G> {
    /// Build a reflection report. Failures are folded into the returned text.
    pub fn reflect(&self, focus: &str) -> String {
        match self.try_reflect(focus) {
            Ok(report) => report,
            Err(err) => {
                warn!(err = %err, "reflection failed");
                format!("ERROR during reflection: {err:#}")
            }
        }
    }

    fn try_reflect(&self, focus: &str) -> Result<String> {
        let focus = match focus.trim() {
            "" => "overall",
            other => other,
        };
        let listing = self.workspace.list_dir(".")?;
        let quality = self
            .critique_touched(Some(QUALITY_SAMPLE))
            .into_iter()
            .map(|file| QualitySample {
                security: file
                    .report
                    .issues()
                    .any(|issue| issue.kind == IssueKind::Security),
                score: file.report.quality_score,
                path: file.path,
            })
            .collect();
        Ok(render_reflection(&ReflectionInputs {
            focus,
            counts: self.tasks.counts(),
            priorities: self.tasks.next_priorities(PRIORITY_LIMIT),
            requirements: self.requirements.as_deref(),
            listing: &listing,
            quality,
            target_score: self.config.improve.target_score,
        }))
    }

    /// Critique recently touched files the critic understands, newest first.
    ///
    /// Files that can no longer be read are skipped.
    pub(crate) fn critique_touched(&self, limit: Option<usize>) -> Vec<FileQuality> {
        let candidates = self
            .touched
            .recent()
            .filter(|path| SourceLanguage::from_path(path).is_supported());
        let mut out = Vec::new();
        for path in candidates {
            if limit.is_some_and(|limit| out.len() >= limit) {
                break;
            }
            match self.workspace.read_file(path) {
                Ok(code) => out.push(FileQuality {
                    path: path.to_string(),
                    report: self.critic.critique(&code, path),
                }),
                Err(err) => debug!(path, err = %err, "skipping unreadable touched file"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::types::{TaskPriority, TaskStatus};
    use crate::test_support::{ScriptedGateway, TestWorkspace, test_config};

    fn inputs<'a>(priorities: Vec<&'a Task>) -> ReflectionInputs<'a> {
        ReflectionInputs {
            focus: "overall",
            counts: StatusCounts::default(),
            priorities,
            requirements: None,
            listing: "No files found",
            quality: Vec::new(),
            target_score: 80.0,
        }
    }

    #[test]
    fn schedule_fires_on_interval_and_checkpoints() {
        let schedule = ReflectionSchedule::new(3);
        let due: Vec<u32> = (1..=7).filter(|step| schedule.is_due(*step, false)).collect();
        assert_eq!(due, vec![3, 6]);
        assert!(schedule.is_due(1, true));

        let disabled = ReflectionSchedule::new(0);
        assert!(!(1..=10).any(|step| disabled.is_due(step, false)));
        assert!(disabled.is_due(4, true));
    }

    #[test]
    fn empty_state_recommends_requirements_and_tasks() {
        let report = render_reflection(&inputs(Vec::new()));
        assert!(report.starts_with("REFLECTION AND ASSESSMENT (focus: overall)"));
        assert!(report.contains("- No tasks created yet"));
        assert!(report.contains("- No requirements loaded"));
        assert!(report.contains("NEXT PRIORITIES:\n- none"));
        assert!(report.contains("- Load a requirements document"));
        assert!(report.contains("- Create specific tasks"));
        assert!(!report.contains("CODE QUALITY"));
        assert!(report.ends_with("REFLECTION COMPLETE - continue with the next action."));
    }

    #[test]
    fn multiple_in_progress_tasks_ask_for_focus() {
        let task = Task {
            id: 4,
            description: "build login".to_string(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
        };
        let mut input = inputs(vec![&task]);
        input.counts = StatusCounts {
            pending: 0,
            in_progress: 2,
            completed: 1,
        };
        input.requirements = Some("prd.md");
        input.quality = vec![
            QualitySample {
                path: "app.py".to_string(),
                score: 62.0,
                security: true,
            },
            QualitySample {
                path: "lib.py".to_string(),
                score: 95.0,
                security: false,
            },
        ];

        let report = render_reflection(&input);
        assert!(report.contains("- 3 total: 0 pending, 2 in progress, 1 completed"));
        assert!(report.contains("1. #4 build login [high, in_progress]"));
        assert!(report.contains("- Finish the in-progress tasks"));
        assert!(report.contains("- Run improve_code on app.py (score 62.0 below target 80.0)"));
        assert!(!report.contains("lib.py (score"));
        assert!(report.contains("- Fix the security issues in app.py"));
        assert!(!report.contains("security issues in lib.py"));
        assert!(!report.contains("Load a requirements document"));
        assert!(report.contains("- app.py: 62.0/100"));
    }

    #[test]
    fn agent_reflection_samples_touched_source_files() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let mut agent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");
        agent.dispatch("write_file", json!({"path": "notes.txt", "contents": "hello"}));
        agent.dispatch(
            "write_file",
            json!({"path": "app.py", "contents": "def f():\n    return 1\n"}),
        );

        let report = agent.reflect("");
        assert!(report.contains("(focus: overall)"), "{report}");
        assert!(report.contains("[FILE] app.py"), "{report}");
        assert!(report.contains("- app.py: "), "{report}");
        assert!(!report.contains("- notes.txt: "), "{report}");
    }

    #[test]
    fn reflection_failure_is_reported_as_text() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let agent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");
        std::fs::remove_dir_all(ws.root()).expect("remove root");

        let report = agent.reflect("overall");
        assert!(report.starts_with("ERROR during reflection:"), "{report}");
    }
}
