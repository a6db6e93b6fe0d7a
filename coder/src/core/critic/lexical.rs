//! Per-line pattern checks and file-level conventions.

use std::sync::LazyLock;

use regex::Regex;

use super::CriticConfig;
use super::SourceLanguage;
use super::report::{CodeIssue, IssueKind, Severity};

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)password\s*=\s*["'][^"']+["']"#,
        r#"(?i)api_key\s*=\s*["'][^"']+["']"#,
        r#"(?i)secret\s*=\s*["'][^"']+["']"#,
        r#"(?i)token\s*=\s*["'][^"']+["']"#,
        r#"["'][A-Za-z0-9+/]{20,}["']"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("secret pattern should compile"))
    .collect()
});

static SQL_CONCAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)execute\s*\([^)]*['"].*\+.*['"][^)]*\)"#).expect("sql pattern should compile")
});

static PYTHON_PRINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bprint\s*\(").expect("print pattern should compile"));

static RUST_PRINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:e?println|e?print|dbg)!\s*\(").expect("print pattern should compile")
});

static GENERIC_PRINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:print|console\.log)\s*\(").expect("print pattern should compile")
});

fn print_pattern(language: SourceLanguage) -> &'static Regex {
    match language {
        SourceLanguage::Python => &PYTHON_PRINT,
        SourceLanguage::Rust => &RUST_PRINT,
        SourceLanguage::Other => &GENERIC_PRINT,
    }
}

/// Scan each physical line independently.
pub fn analyze_lines(code: &str, language: SourceLanguage, config: &CriticConfig) -> Vec<CodeIssue> {
    let print = print_pattern(language);
    let mut issues = Vec::new();
    for (index, line) in code.split('\n').enumerate() {
        let line_number = Some(index + 1);
        let length = line.chars().count();
        if length > config.max_line_length {
            issues.push(CodeIssue {
                kind: IssueKind::Style,
                severity: Severity::Low,
                line_number,
                message: format!("Line too long ({length} characters)"),
                suggestion: "Break long lines for better readability".to_string(),
                category: "line_length".to_string(),
            });
        }

        let stripped = line.trim();
        if SECRET_PATTERNS.iter().any(|re| re.is_match(stripped)) {
            issues.push(CodeIssue {
                kind: IssueKind::Security,
                severity: Severity::Critical,
                line_number,
                message: "Potential hardcoded credential detected".to_string(),
                suggestion: "Use environment variables or secure configuration".to_string(),
                category: "secrets".to_string(),
            });
        }
        if SQL_CONCAT.is_match(stripped) {
            issues.push(CodeIssue {
                kind: IssueKind::Security,
                severity: Severity::High,
                line_number,
                message: "Potential SQL injection vulnerability".to_string(),
                suggestion: "Use parameterized queries or ORM".to_string(),
                category: "sql_injection".to_string(),
            });
        }
        if print.is_match(stripped) && !stripped.to_lowercase().contains("debug") {
            issues.push(CodeIssue {
                kind: IssueKind::BestPractice,
                severity: Severity::Medium,
                line_number,
                message: "Print statement found".to_string(),
                suggestion: "Use proper logging instead of print statements".to_string(),
                category: "logging".to_string(),
            });
        }
    }
    issues
}

/// File-level conventions: leading documentation and import placement.
pub fn analyze_file(code: &str, language: SourceLanguage) -> Vec<CodeIssue> {
    let conventions = match language {
        SourceLanguage::Python => &PYTHON,
        SourceLanguage::Rust => &RUST,
        SourceLanguage::Other => return Vec::new(),
    };

    let mut issues = Vec::new();
    let head = code.trim_start();
    if !conventions.doc_prefixes.iter().any(|prefix| head.starts_with(prefix)) {
        issues.push(CodeIssue {
            kind: IssueKind::BestPractice,
            severity: Severity::Medium,
            line_number: Some(1),
            message: conventions.missing_doc_message.to_string(),
            suggestion: "Add a module-level docstring describing the file's purpose".to_string(),
            category: "documentation".to_string(),
        });
    }
    if let Some(line) = import_after_code(code, conventions) {
        issues.push(CodeIssue {
            kind: IssueKind::Style,
            severity: Severity::Medium,
            line_number: Some(line),
            message: "Imports should be at the top of the file".to_string(),
            suggestion: "Move all imports to the beginning of the file".to_string(),
            category: "import_order".to_string(),
        });
    }
    issues
}

struct Conventions {
    doc_prefixes: &'static [&'static str],
    missing_doc_message: &'static str,
    import_prefixes: &'static [&'static str],
    /// Lines that are neither imports nor code.
    neutral_prefixes: &'static [&'static str],
    /// Multi-line string or comment blocks as (open, close) delimiters.
    blocks: &'static [(&'static str, &'static str)],
    /// Only unindented lines take part in the import-order check.
    top_level_only: bool,
}

static PYTHON: Conventions = Conventions {
    doc_prefixes: &["\"\"\"", "'''"],
    missing_doc_message: "Missing module docstring",
    import_prefixes: &["import ", "from "],
    neutral_prefixes: &["#"],
    blocks: &[("\"\"\"", "\"\"\""), ("'''", "'''")],
    top_level_only: false,
};

static RUST: Conventions = Conventions {
    doc_prefixes: &["//!", "/*!"],
    missing_doc_message: "Missing module documentation comment",
    import_prefixes: &["use ", "pub use ", "pub(crate) use ", "extern crate "],
    neutral_prefixes: &["//", "#!["],
    blocks: &[("/*", "*/")],
    top_level_only: true,
};

/// Line number (1-based) of the last import, if any import follows code.
fn import_after_code(code: &str, conventions: &Conventions) -> Option<usize> {
    let mut first_code: Option<usize> = None;
    let mut last_import: Option<usize> = None;
    let mut import_after = false;
    let mut open_block: Option<&str> = None;

    for (index, line) in code.split('\n').enumerate() {
        let stripped = line.trim();
        if let Some(close) = open_block {
            if stripped.contains(close) {
                open_block = None;
            }
            continue;
        }
        if let Some((open, close)) = conventions
            .blocks
            .iter()
            .find(|(open, _)| stripped.starts_with(open))
        {
            if !stripped[open.len()..].contains(close) {
                open_block = Some(*close);
            }
            continue;
        }
        if conventions.top_level_only && line.starts_with(char::is_whitespace) {
            continue;
        }
        if stripped.is_empty() {
            continue;
        }
        if conventions
            .import_prefixes
            .iter()
            .any(|prefix| stripped.starts_with(prefix))
        {
            last_import = Some(index);
            if first_code.is_some() {
                import_after = true;
            }
            continue;
        }
        if conventions
            .neutral_prefixes
            .iter()
            .any(|prefix| stripped.starts_with(prefix))
        {
            continue;
        }
        first_code.get_or_insert(index);
    }

    if import_after {
        last_import.map(|index| index + 1)
    } else {
        None
    }
}
