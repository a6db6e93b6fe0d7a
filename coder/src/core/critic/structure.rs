//! Syntax-tree checks: parse errors, long functions, wide signatures, deep nesting.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use tree_sitter::{Language, Node, Parser};

use super::CriticConfig;
use super::SourceLanguage;
use super::report::{CodeIssue, IssueKind, Severity};

/// Node kinds that drive the structural checks for one grammar.
struct Grammar {
    language: Language,
    functions: &'static [&'static str],
    /// Control structures whose nesting depth is reported.
    flagged: &'static [&'static str],
    /// Control structures that add a nesting level.
    nesting: &'static [&'static str],
    count_parameters: fn(Node<'_>) -> usize,
}

impl Grammar {
    fn for_language(language: SourceLanguage) -> Option<Self> {
        match language {
            SourceLanguage::Python => Some(Self {
                language: tree_sitter_python::LANGUAGE.into(),
                functions: &["function_definition"],
                flagged: &["for_statement", "while_statement", "if_statement"],
                nesting: &[
                    "for_statement",
                    "while_statement",
                    "if_statement",
                    "with_statement",
                    "try_statement",
                ],
                count_parameters: python_parameters,
            }),
            SourceLanguage::Rust => Some(Self {
                language: tree_sitter_rust::LANGUAGE.into(),
                functions: &["function_item"],
                flagged: &[
                    "for_expression",
                    "while_expression",
                    "loop_expression",
                    "if_expression",
                    "match_expression",
                ],
                nesting: &[
                    "for_expression",
                    "while_expression",
                    "loop_expression",
                    "if_expression",
                    "match_expression",
                ],
                count_parameters: rust_parameters,
            }),
            SourceLanguage::Other => None,
        }
    }
}

/// Run the structural stage. Languages without a grammar yield no issues.
///
/// A parse failure produces a single critical `syntax` issue and skips the
/// remaining checks.
pub fn analyze(code: &str, language: SourceLanguage, config: &CriticConfig) -> Result<Vec<CodeIssue>> {
    let Some(grammar) = Grammar::for_language(language) else {
        return Ok(Vec::new());
    };
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language)
        .map_err(|e| anyhow!("failed to load grammar: {e}"))?;
    let Some(tree) = parser.parse(code, None) else {
        return Ok(vec![syntax_issue(None, "parser produced no syntax tree".to_string())]);
    };

    let root = tree.root_node();
    if root.has_error() {
        let issue = match first_error(root) {
            Some(node) if node.is_missing() => syntax_issue(
                Some(node.start_position().row + 1),
                format!("missing `{}`", node.kind()),
            ),
            Some(node) => syntax_issue(
                Some(node.start_position().row + 1),
                "invalid syntax".to_string(),
            ),
            None => syntax_issue(None, "invalid syntax".to_string()),
        };
        return Ok(vec![issue]);
    }

    let mut issues = Vec::new();
    walk(root, code.as_bytes(), &grammar, config, &mut issues);
    Ok(issues)
}

fn syntax_issue(line: Option<usize>, detail: String) -> CodeIssue {
    CodeIssue {
        kind: IssueKind::Syntax,
        severity: Severity::Critical,
        line_number: line,
        message: format!("Syntax error: {detail}"),
        suggestion: "Fix syntax error before proceeding".to_string(),
        category: "syntax".to_string(),
    }
}

fn first_error<'t>(root: Node<'t>) -> Option<Node<'t>> {
    let mut found = None;
    traverse(root, |event| match event {
        Event::Enter(node) if found.is_none() => {
            if node.is_error() || node.is_missing() {
                found = Some(node);
                return false;
            }
            node.has_error()
        }
        _ => false,
    });
    found
}

enum Event<'t> {
    Enter(Node<'t>),
    Leave(Node<'t>),
}

/// Depth-first walk driven by a tree cursor, so nesting depth never grows
/// the call stack. `visit` returns whether to descend on `Enter`; its return
/// value is ignored on `Leave`.
fn traverse<'t>(root: Node<'t>, mut visit: impl FnMut(Event<'t>) -> bool) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if visit(Event::Enter(node)) && cursor.goto_first_child() {
            continue;
        }
        visit(Event::Leave(node));
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
            visit(Event::Leave(cursor.node()));
        }
    }
}

fn walk(root: Node<'_>, source: &[u8], grammar: &Grammar, config: &CriticConfig, issues: &mut Vec<CodeIssue>) {
    let depths = nesting_depths(root, grammar);
    traverse(root, |event| {
        let Event::Enter(node) = event else {
            return false;
        };
        let kind = node.kind();
        if grammar.functions.contains(&kind) {
            check_function(node, source, grammar, config, issues);
        }
        let depth = depths.get(&node.id()).copied();
        if let Some(depth) = depth.filter(|&depth| depth > config.max_nesting_depth) {
            issues.push(CodeIssue {
                kind: IssueKind::Maintainability,
                severity: Severity::High,
                line_number: Some(node.start_position().row + 1),
                message: format!("High nesting depth ({depth} levels)"),
                suggestion: "Extract nested logic into separate functions".to_string(),
                category: "complexity".to_string(),
            });
        }
        true
    });
}

fn check_function(
    node: Node<'_>,
    source: &[u8],
    grammar: &Grammar,
    config: &CriticConfig,
    issues: &mut Vec<CodeIssue>,
) {
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("<anonymous>");
    let line = node.start_position().row + 1;

    let length = node.end_position().row - node.start_position().row;
    if length > config.max_function_lines {
        issues.push(CodeIssue {
            kind: IssueKind::Maintainability,
            severity: Severity::Medium,
            line_number: Some(line),
            message: format!("Function '{name}' is too long ({length} lines)"),
            suggestion: "Consider breaking this function into smaller, more focused functions"
                .to_string(),
            category: "function_length".to_string(),
        });
    }

    let parameters = node
        .child_by_field_name("parameters")
        .map(grammar.count_parameters)
        .unwrap_or(0);
    if parameters > config.max_parameters {
        issues.push(CodeIssue {
            kind: IssueKind::Maintainability,
            severity: Severity::Medium,
            line_number: Some(line),
            message: format!("Function '{name}' has too many parameters ({parameters})"),
            suggestion: "Consider using a configuration object or reducing parameters".to_string(),
            category: "parameter_count".to_string(),
        });
    }
}

/// Plain positional parameters, `self` included.
///
/// Positional-only parameters before `/` are dropped, and counting stops at
/// `*`, `*args` or `**kwargs`, so keyword-only parameters never count.
fn python_parameters(params: Node<'_>) -> usize {
    let mut count = 0;
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "positional_separator" => count = 0,
            "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => break,
            "typed_parameter" if is_splat(child) => break,
            "identifier" | "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                count += 1
            }
            _ => {}
        }
    }
    count
}

/// `*args: T` and `**kwargs: T` parse as typed parameters around a splat.
fn is_splat(typed: Node<'_>) -> bool {
    let mut cursor = typed.walk();
    let first = typed.named_children(&mut cursor).next();
    first.is_some_and(|inner| {
        matches!(inner.kind(), "list_splat_pattern" | "dictionary_splat_pattern")
    })
}

fn rust_parameters(params: Node<'_>) -> usize {
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "parameter" | "self_parameter"))
        .count()
}

/// Deepest chain of nested control structures below each flagged node, keyed
/// by node id.
///
/// Nested function bodies start a fresh scope and do not count toward the
/// enclosing structure.
fn nesting_depths(root: Node<'_>, grammar: &Grammar) -> HashMap<usize, usize> {
    let mut depths = HashMap::new();
    // One running maximum per open node on the current path.
    let mut open: Vec<usize> = Vec::new();
    traverse(root, |event| match event {
        Event::Enter(_) => {
            open.push(0);
            true
        }
        Event::Leave(node) => {
            let below = open.pop().unwrap_or(0);
            let kind = node.kind();
            if grammar.flagged.contains(&kind) {
                depths.insert(node.id(), below);
            }
            if !grammar.functions.contains(&kind) {
                let reach = below + usize::from(grammar.nesting.contains(&kind));
                if let Some(parent) = open.last_mut() {
                    *parent = (*parent).max(reach);
                }
            }
            false
        }
    });
    depths
}
