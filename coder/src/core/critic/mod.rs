//! Heuristic static critic that scores source text.
//!
//! Three independent stages feed one issue list: a syntax-tree stage
//! ([`structure`], tree-sitter), a per-line pattern stage ([`lexical`]), and a
//! file-level stage that only runs when a path is supplied. The critic never
//! fails: a parse error becomes a critical `syntax` issue and an internal
//! grammar failure skips the structural stage. Identical input always yields
//! an identical report.

pub mod lexical;
pub mod report;
pub mod structure;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use report::{CodeIssue, CritiqueReport, IssueKind, Severity, SeverityBreakdown};

/// Thresholds for the structural and lexical checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CriticConfig {
    pub max_function_lines: usize,
    pub max_parameters: usize,
    pub max_nesting_depth: usize,
    pub max_line_length: usize,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            max_function_lines: 50,
            max_parameters: 7,
            max_nesting_depth: 4,
            max_line_length: 120,
        }
    }
}

/// Grammar used for the structural and file-level stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Python,
    Rust,
    Other,
}

impl SourceLanguage {
    /// Unnamed input is treated as Python.
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() {
            return Self::Python;
        }
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("py") => Self::Python,
            Some("rs") => Self::Rust,
            _ => Self::Other,
        }
    }

    pub fn is_supported(self) -> bool {
        self != Self::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeCritic {
    config: CriticConfig,
}

impl CodeCritic {
    pub fn new(config: CriticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CriticConfig {
        &self.config
    }

    /// Critique `code`. `path` selects the grammar and enables file-level checks.
    pub fn critique(&self, code: &str, path: &str) -> CritiqueReport {
        let language = SourceLanguage::from_path(path);
        let mut issues = match structure::analyze(code, language, &self.config) {
            Ok(issues) => issues,
            Err(err) => {
                warn!(err = %err, path, "structural analysis skipped");
                Vec::new()
            }
        };
        issues.extend(lexical::analyze_lines(code, language, &self.config));
        if !path.is_empty() {
            issues.extend(lexical::analyze_file(code, language));
        }
        CritiqueReport::from_issues(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "\"\"\"Math helpers.\"\"\"\n\nimport math\n\n\ndef area(r):\n    \"\"\"Circle area.\"\"\"\n    return math.pi * r * r\n";

    #[test]
    fn clean_module_scores_full_marks() {
        let report = CodeCritic::default().critique(CLEAN, "geometry.py");
        assert_eq!(report.total_issues, 0, "{}", report.render());
        assert_eq!(report.quality_score, 100.0);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn critique_is_deterministic() {
        let code = "def f(a,b,c,d,e,f,g,h):\n    print(a)\n    password = 'hunter2'\n";
        let critic = CodeCritic::default();
        assert_eq!(critic.critique(code, "f.py"), critic.critique(code, "f.py"));
    }

    #[test]
    fn one_critical_issue_costs_at_least_twenty_five_points() {
        let critic = CodeCritic::default();
        let base = critic.critique(CLEAN, "geometry.py");
        let augmented = format!("{CLEAN}TOKEN = \"abc\"\n");
        let worse = critic.critique(&augmented, "geometry.py");
        assert!(worse.quality_score <= (base.quality_score - 25.0).max(0.0));
        assert_eq!(worse.severity_breakdown.critical, 1);
    }

    #[test]
    fn syntax_error_skips_structure_but_keeps_lines() {
        let code = "def broken(:\n    print('x')\n";
        let report = CodeCritic::default().critique(code, "");
        assert_eq!(report.issues_by_category["syntax"].len(), 1);
        assert_eq!(report.issues_by_category["logging"].len(), 1);
        assert_eq!(report.quality_score, 70.0);
    }

    #[test]
    fn unnamed_input_skips_file_level_checks() {
        let report = CodeCritic::default().critique("x = 1\n", "");
        assert_eq!(report.total_issues, 0);
        let named = CodeCritic::default().critique("x = 1\n", "x.py");
        assert_eq!(named.issues_by_category["documentation"].len(), 1);
    }

    #[test]
    fn non_source_files_get_line_checks_only() {
        let code = format!("{}\n", "word ".repeat(30));
        let report = CodeCritic::default().critique(&code, "notes.md");
        assert_eq!(report.total_issues, 1);
        assert!(report.issues_by_category.contains_key("line_length"));
    }

    #[test]
    fn pathologically_deep_nesting_still_yields_a_report() {
        let depth = 20_000;
        let code = format!("x = {}1{}\n", "[".repeat(depth), "]".repeat(depth));
        let report = CodeCritic::default().critique(&code, "deep.py");
        assert!((0.0..=100.0).contains(&report.quality_score));
        assert!(report.issues_by_category.contains_key("line_length"));
    }

    #[test]
    fn language_detection() {
        assert_eq!(SourceLanguage::from_path("a/b.py"), SourceLanguage::Python);
        assert_eq!(SourceLanguage::from_path("src/lib.rs"), SourceLanguage::Rust);
        assert_eq!(SourceLanguage::from_path("index.html"), SourceLanguage::Other);
        assert_eq!(SourceLanguage::from_path(""), SourceLanguage::Python);
    }

    #[test]
    fn custom_thresholds_apply() {
        let critic = CodeCritic::new(CriticConfig {
            max_line_length: 10,
            ..CriticConfig::default()
        });
        let report = critic.critique("value = 1234567890\n", "");
        assert_eq!(report.issues_by_category["line_length"].len(), 1);
    }
}
