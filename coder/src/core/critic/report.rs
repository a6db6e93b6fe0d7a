//! Critique issues, scoring, and the aggregated report.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Style,
    Security,
    Performance,
    Maintainability,
    BestPractice,
    Syntax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Score deduction applied per issue.
    pub fn weight(self) -> f64 {
        match self {
            Self::Critical => -25.0,
            Self::High => -10.0,
            Self::Medium => -5.0,
            Self::Low => -2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One finding. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(rename = "line")]
    pub line_number: Option<usize>,
    pub message: String,
    pub suggestion: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityBreakdown {
    fn from_issues(issues: &[CodeIssue]) -> Self {
        let mut breakdown = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Critical => breakdown.critical += 1,
                Severity::High => breakdown.high += 1,
                Severity::Medium => breakdown.medium += 1,
                Severity::Low => breakdown.low += 1,
            }
        }
        breakdown
    }
}

/// Aggregated, deterministic result of one critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub quality_score: f64,
    pub total_issues: usize,
    pub severity_breakdown: SeverityBreakdown,
    /// Issues grouped by category, each group in discovery order.
    pub issues_by_category: BTreeMap<String, Vec<CodeIssue>>,
    pub recommendations: Vec<String>,
    pub overall_assessment: String,
}

/// `clamp(0, 100, 100 + sum(weights))`, rounded to one decimal.
pub fn quality_score(issues: &[CodeIssue]) -> f64 {
    let deduction: f64 = issues.iter().map(|issue| issue.severity.weight()).sum();
    let score = (100.0 + deduction).clamp(0.0, 100.0);
    (score * 10.0).round() / 10.0
}

pub fn overall_assessment(score: f64) -> &'static str {
    if score >= 90.0 {
        "Excellent code quality with minimal issues"
    } else if score >= 75.0 {
        "Good code quality with some minor improvements needed"
    } else if score >= 60.0 {
        "Acceptable code quality but requires attention to several issues"
    } else if score >= 40.0 {
        "Poor code quality requiring significant improvements"
    } else {
        "Critical code quality issues requiring immediate attention"
    }
}

fn recommendations(issues: &[CodeIssue]) -> Vec<String> {
    let has_severity = |severity: Severity| issues.iter().any(|issue| issue.severity == severity);
    let has_category = |category: &str| issues.iter().any(|issue| issue.category == category);

    let mut recommendations = Vec::new();
    if has_severity(Severity::Critical) {
        recommendations
            .push("CRITICAL: Address security vulnerabilities and syntax errors immediately".into());
    }
    if has_severity(Severity::High) {
        recommendations
            .push("HIGH: Reduce code complexity and fix major maintainability issues".into());
    }
    if issues.iter().any(|issue| issue.kind == IssueKind::Security) {
        recommendations.push("Security: Review and fix all security-related issues".into());
    }
    if has_category("complexity") {
        recommendations
            .push("Refactoring: Break down complex functions for better maintainability".into());
    }
    if has_category("documentation") {
        recommendations.push("Documentation: Add missing docstrings and comments".into());
    }
    recommendations
}

impl CritiqueReport {
    pub fn from_issues(issues: Vec<CodeIssue>) -> Self {
        let quality_score = quality_score(&issues);
        let severity_breakdown = SeverityBreakdown::from_issues(&issues);
        let recommendations = recommendations(&issues);
        let total_issues = issues.len();
        let mut issues_by_category: BTreeMap<String, Vec<CodeIssue>> = BTreeMap::new();
        for issue in issues {
            issues_by_category
                .entry(issue.category.clone())
                .or_default()
                .push(issue);
        }
        Self {
            quality_score,
            total_issues,
            severity_breakdown,
            issues_by_category,
            recommendations,
            overall_assessment: overall_assessment(quality_score).to_string(),
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &CodeIssue> {
        self.issues_by_category.values().flatten()
    }

    /// Plain-text rendering fed back to the model.
    pub fn render(&self) -> String {
        let b = &self.severity_breakdown;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Quality score: {:.1}/100 ({})",
            self.quality_score, self.overall_assessment
        );
        let _ = writeln!(
            out,
            "Issues: {} (critical {}, high {}, medium {}, low {})",
            self.total_issues, b.critical, b.high, b.medium, b.low
        );
        for (category, issues) in &self.issues_by_category {
            let _ = writeln!(out, "\n[{category}]");
            for issue in issues {
                let line = issue
                    .line_number
                    .map(|n| format!("line {n}: "))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "- {line}[{}] {} Suggestion: {}",
                    issue.severity.as_str(),
                    issue.message,
                    issue.suggestion
                );
            }
        }
        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "\nRecommendations:");
            for recommendation in &self.recommendations {
                let _ = writeln!(out, "- {recommendation}");
            }
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity, kind: IssueKind, category: &str) -> CodeIssue {
        CodeIssue {
            kind,
            severity,
            line_number: Some(1),
            message: "m".to_string(),
            suggestion: "s".to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn score_applies_weights_and_clamps() {
        assert_eq!(quality_score(&[]), 100.0);
        let issues = vec![
            issue(Severity::High, IssueKind::Maintainability, "complexity"),
            issue(Severity::Low, IssueKind::Style, "line_length"),
        ];
        assert_eq!(quality_score(&issues), 88.0);
        let many = vec![issue(Severity::Critical, IssueKind::Security, "secrets"); 5];
        assert_eq!(quality_score(&many), 0.0);
    }

    #[test]
    fn assessment_bands() {
        assert_eq!(overall_assessment(90.0), "Excellent code quality with minimal issues");
        assert!(overall_assessment(75.0).starts_with("Good"));
        assert!(overall_assessment(60.0).starts_with("Acceptable"));
        assert!(overall_assessment(40.0).starts_with("Poor"));
        assert!(overall_assessment(39.9).starts_with("Critical"));
    }

    #[test]
    fn recommendations_follow_tiers_then_categories() {
        let report = CritiqueReport::from_issues(vec![
            issue(Severity::Critical, IssueKind::Security, "secrets"),
            issue(Severity::High, IssueKind::Maintainability, "complexity"),
            issue(Severity::Medium, IssueKind::BestPractice, "documentation"),
        ]);
        let prefixes: Vec<&str> = report
            .recommendations
            .iter()
            .map(|r| r.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(
            prefixes,
            vec!["CRITICAL", "HIGH", "Security", "Refactoring", "Documentation"]
        );
    }

    #[test]
    fn report_groups_and_counts() {
        let report = CritiqueReport::from_issues(vec![
            issue(Severity::Low, IssueKind::Style, "line_length"),
            issue(Severity::Low, IssueKind::Style, "line_length"),
            issue(Severity::Medium, IssueKind::BestPractice, "logging"),
        ]);
        assert_eq!(report.total_issues, 3);
        assert_eq!(report.severity_breakdown.low, 2);
        assert_eq!(report.issues_by_category["line_length"].len(), 2);
        assert_eq!(report.issues().count(), 3);
        let rendered = report.render();
        assert!(rendered.starts_with("Quality score: 91.0/100"), "{rendered}");
        assert!(rendered.contains("[logging]"), "{rendered}");
    }

    #[test]
    fn issue_serializes_with_wire_names() {
        let value = serde_json::to_value(issue(Severity::High, IssueKind::BestPractice, "x"))
            .expect("serialize");
        assert_eq!(value["type"], "best_practice");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["line"], 1);
    }
}
