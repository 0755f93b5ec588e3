//! Coarse, lexical type inference for assignment expressions.
//!
//! The tags produced here approximate runtime types from the surface text
//! alone. They are hints for presentation, not a type system.

use crate::blocks::indent_of;
use regex::Regex;
use std::sync::LazyLock;

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^("[^"]*"|'[^']*')$"#).unwrap());

static INT_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

static FLOAT_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d*\.\d+$").unwrap());

/// `Identifier(...)` call form; the identifier doubles as a nominal tag.
static CALL_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

/// Conditional expression `A if C else B`; the fallback arm carries the
/// interesting type (this is what `default` declarations rewrite into).
static CONDITIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+\s+if\s+.+\s+else\s+(.+)$").unwrap());

/// Infer a coarse type tag for an expression, or `None` when the text
/// matches no recognized shape.
pub fn infer_expr(expr: &str) -> Option<String> {
    let expr = expr.trim();

    if STRING_LITERAL.is_match(expr) {
        return Some("str".to_string());
    }
    if let Some(caps) = CONDITIONAL.captures(expr) {
        return infer_expr(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
    }
    if INT_LITERAL.is_match(expr) {
        return Some("int".to_string());
    }
    if FLOAT_LITERAL.is_match(expr) {
        return Some("float".to_string());
    }
    if expr == "True" || expr == "False" {
        return Some("bool".to_string());
    }
    if expr == "None" {
        return Some("None".to_string());
    }
    if expr.starts_with('[') {
        return Some("list".to_string());
    }
    if expr.starts_with('{') {
        let tag = if expr.contains(':') { "dict" } else { "set" };
        return Some(tag.to_string());
    }
    if expr.starts_with('(') {
        return Some("tuple".to_string());
    }
    if let Some(caps) = CALL_FORM.captures(expr) {
        return Some(caps[1].to_string());
    }

    None
}

/// Infer a function's return type from the `return` statements in its
/// direct body.
///
/// Scans lines strictly deeper than `def_indent`, stopping at the first
/// substantive line back at or above it. Distinct tags are collected in
/// first-seen order: no returns at all means the function yields `None`,
/// one tag stands alone, several are joined into a union string. Returns
/// whose expression resolves to no tag contribute nothing.
pub fn infer_return_type(lines: &[&str], def_line: usize, def_indent: usize) -> Option<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut saw_return = false;

    for line in lines.iter().skip(def_line + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if indent_of(line) <= def_indent {
            break;
        }

        let Some(rest) = trimmed.strip_prefix("return") else {
            continue;
        };
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('(')) {
            continue;
        }
        saw_return = true;

        let tag = if rest.trim().is_empty() {
            Some("None".to_string())
        } else {
            infer_expr(rest.trim())
        };
        if let Some(tag) = tag {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }

    if !saw_return {
        return Some("None".to_string());
    }
    if tags.is_empty() {
        return None;
    }
    Some(tags.join(" | "))
}
