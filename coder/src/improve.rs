//! Code-quality tools: one-shot assessment and the iterative rewrite loop.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::Agent;
use crate::io::gateway::{ModelGateway, excerpt, is_error_response};
use crate::io::prompt::ImprovePrompt;

/// Code from the first fenced block of `reply`, or the whole reply when it has none.
///
/// An unterminated fence yields everything after the opening line.
pub fn extract_code_block(reply: &str) -> String {
    let Some(open) = reply.find("```") else {
        return reply.trim().to_string();
    };
    let after_fence = &reply[open + 3..];
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => return String::new(),
    };
    let code = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    code.trim_end().to_string()
}

impl<G: ModelGateway + ?Sized> Agent<'_, G> {
    /// Critique report for a workspace file, rendered for the model.
    pub fn assess_code_quality(&self, path: &str) -> Result<String> {
        let code = self.workspace.read_file(path)?;
        let report = self.critic.critique(&code, path);
        Ok(format!(
            "Code quality assessment for {path}\n\n{}",
            report.render().trim_end()
        ))
    }

    /// Ask the model for rewrites until `path` reaches the target score.
    ///
    /// A candidate is written only when it scores strictly higher than the
    /// current file. The loop stops early on a gateway error, an empty reply,
    /// or a candidate that does not improve.
    #[instrument(skip_all, fields(path))]
    pub fn improve_code(
        &mut self,
        path: &str,
        target_score: Option<f64>,
        max_iterations: Option<u32>,
    ) -> Result<String> {
        let target = target_score
            .unwrap_or(self.config.improve.target_score)
            .clamp(0.0, 100.0);
        let max_iterations = max_iterations.unwrap_or(self.config.improve.max_iterations);

        let mut code = self.workspace.read_file(path)?;
        let mut report = self.critic.critique(&code, path);
        let mut lines = vec![format!(
            "Initial score for {path}: {:.1}/100 (target {target:.1})",
            report.quality_score
        )];
        let mut accepted = 0u32;

        for iteration in 1..=max_iterations {
            if report.quality_score >= target {
                break;
            }
            let rendered = report.render();
            let prompt = self.prompts.improve_prompt(&ImprovePrompt {
                path,
                code: &code,
                report: &rendered,
                score: report.quality_score,
                target,
            })?;
            let reply = self.gateway.generate(&prompt, &self.params);
            if is_error_response(&reply) {
                warn!(iteration, "model error during improvement");
                lines.push(format!(
                    "Iteration {iteration}: model error, stopping ({})",
                    excerpt(&reply, 200)
                ));
                break;
            }

            let mut candidate = extract_code_block(&reply);
            if candidate.trim().is_empty() {
                lines.push(format!("Iteration {iteration}: empty reply, stopping"));
                break;
            }
            candidate.push('\n');
            let candidate_report = self.critic.critique(&candidate, path);
            if candidate_report.quality_score <= report.quality_score {
                lines.push(format!(
                    "Iteration {iteration}: candidate scored {:.1} (current {:.1}), rejected",
                    candidate_report.quality_score, report.quality_score
                ));
                break;
            }

            self.workspace.write_file(path, &candidate)?;
            self.touched.record(&self.workspace.relative(path)?);
            info!(
                iteration,
                from = report.quality_score,
                to = candidate_report.quality_score,
                "improvement accepted"
            );
            lines.push(format!(
                "Iteration {iteration}: {:.1} -> {:.1}, accepted",
                report.quality_score, candidate_report.quality_score
            ));
            code = candidate;
            report = candidate_report;
            accepted += 1;
        }

        let status = if report.quality_score >= target {
            "target reached"
        } else {
            "target not reached"
        };
        lines.push(format!(
            "Final score: {:.1}/100 ({status}, {accepted} rewrite(s) accepted)",
            report.quality_score
        ));
        Ok(lines.join("\n"))
    }
}
