//! Scope-aware symbol parsing for extracted Python blocks.
//!
//! Declarations are recognized line by line at the block's minimal
//! indentation, with an explicit stack of class/function frames tracking
//! where each symbol lives. This is structural recognition, not a Python
//! parser: unrecognized lines simply produce no symbols.

use crate::blocks::{PythonBlock, indent_of};
use crate::types::{infer_expr, infer_return_type};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CLASS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\([^)]*\))?\s*:").unwrap()
});

static FUNC_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

static SELF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^self\.([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([^=].*)$").unwrap()
});

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([^=].*)$").unwrap()
});

/// `#: <type>` annotation comment, inline or on the following line.
static TYPE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:\s*(\S+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

/// Where a symbol is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub kind: ScopeKind,
    pub owner: Option<String>,
}

impl Scope {
    pub fn module() -> Self {
        Self {
            kind: ScopeKind::Module,
            owner: None,
        }
    }

    pub fn in_class(owner: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Class,
            owner: Some(owner.into()),
        }
    }

    pub fn in_function(owner: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Function,
            owner: Some(owner.into()),
        }
    }
}

/// Host-document span of a symbol's name (0-based lines and columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub docstring: Option<String>,
    pub inferred_type: Option<String>,
    pub span: Span,
    pub scope: Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Class,
    Function,
}

struct Frame {
    kind: FrameKind,
    name: String,
    indent: usize,
}

pub struct SymbolParser;

impl SymbolParser {
    /// Parse one block into the symbols it declares, in source order.
    pub fn parse(block: &PythonBlock) -> Vec<Symbol> {
        let lines: Vec<&str> = block.code.split('\n').collect();

        if block.line_map.len() == 1 {
            if let Some(symbol) = parse_single_assignment(block, lines[0]) {
                return vec![symbol];
            }
        }

        parse_multi_line(block, &lines)
    }
}

/// One-line fragments (`$`, `define`, `default`) are plain assignments with
/// no scope to track.
fn parse_single_assignment(block: &PythonBlock, line: &str) -> Option<Symbol> {
    let (stmt, comment) = split_comment(line);
    let caps = ASSIGNMENT.captures(stmt.trim_end())?;

    let name = caps[1].to_string();
    let inferred_type = comment
        .and_then(annotation_type)
        .or_else(|| infer_expr(&caps[2]));

    let name_start = caps.get(1).map(|m| m.start()).unwrap_or(0);
    Some(Symbol {
        span: name_span(block, 0, name_start, name.len()),
        name,
        kind: SymbolKind::Variable,
        docstring: None,
        inferred_type,
        scope: Scope::module(),
    })
}

fn parse_multi_line(block: &PythonBlock, lines: &[&str]) -> Vec<Symbol> {
    let min_indent = lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|line| indent_of(line))
        .min()
        .unwrap_or(0);

    let mut symbols = Vec::new();
    let mut scopes: Vec<Frame> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indent_of(line);

        // A frame ends when indentation returns to or below its header.
        // Popping happens before the line is classified so a dedented
        // header opens its new scope at the right depth.
        while scopes.last().is_some_and(|frame| frame.indent >= indent) {
            scopes.pop();
        }

        if let Some(caps) = CLASS_DEF.captures(trimmed) {
            let name = caps[1].to_string();
            symbols.push(Symbol {
                span: name_span(block, idx, caps.get(1).map(|m| m.start()).unwrap_or(0), name.len()),
                name: name.clone(),
                kind: SymbolKind::Class,
                docstring: scan_docstring(lines, idx, indent),
                inferred_type: None,
                scope: enclosing_scope(&scopes),
            });
            scopes.push(Frame {
                kind: FrameKind::Class,
                name,
                indent,
            });
            continue;
        }

        if let Some(caps) = FUNC_DEF.captures(trimmed) {
            let name = caps[1].to_string();
            let scope = match scopes.last() {
                Some(frame) if frame.kind == FrameKind::Class => {
                    Scope::in_class(frame.name.clone())
                }
                _ => Scope::module(),
            };
            symbols.push(Symbol {
                span: name_span(block, idx, caps.get(1).map(|m| m.start()).unwrap_or(0), name.len()),
                name: name.clone(),
                kind: SymbolKind::Function,
                docstring: scan_docstring(lines, idx, indent),
                inferred_type: infer_return_type(lines, idx, indent),
                scope,
            });
            scopes.push(Frame {
                kind: FrameKind::Function,
                name,
                indent,
            });
            continue;
        }

        if let Some(caps) = SELF_ATTR.captures(split_comment(trimmed).0.trim_end()) {
            let name = caps[1].to_string();
            let in_method = scopes
                .last()
                .is_some_and(|frame| frame.kind == FrameKind::Function);
            let owner = scopes
                .iter()
                .rev()
                .find(|frame| frame.kind == FrameKind::Class)
                .map(|frame| frame.name.clone());
            let scope = match owner {
                Some(owner) if in_method => Scope::in_class(owner),
                _ => Scope::module(),
            };
            symbols.push(Symbol {
                span: name_span(block, idx, caps.get(1).map(|m| m.start()).unwrap_or(0), name.len()),
                name,
                kind: SymbolKind::Variable,
                docstring: None,
                inferred_type: infer_expr(&caps[2]),
                scope,
            });
            continue;
        }

        if indent == min_indent {
            let (stmt, inline_comment) = split_comment(trimmed);
            if let Some(caps) = ASSIGNMENT.captures(stmt.trim_end()) {
                let name = caps[1].to_string();
                let inferred_type = inline_comment
                    .and_then(annotation_type)
                    .or_else(|| next_line_annotation(lines, idx))
                    .or_else(|| infer_expr(&caps[2]));
                symbols.push(Symbol {
                    span: name_span(block, idx, caps.get(1).map(|m| m.start()).unwrap_or(0), name.len()),
                    name,
                    kind: SymbolKind::Variable,
                    docstring: None,
                    inferred_type,
                    scope: Scope::module(),
                });
            }
        }
    }

    symbols
}

fn enclosing_scope(scopes: &[Frame]) -> Scope {
    match scopes.last() {
        Some(frame) => match frame.kind {
            FrameKind::Class => Scope::in_class(frame.name.clone()),
            FrameKind::Function => Scope::in_function(frame.name.clone()),
        },
        None => Scope::module(),
    }
}

/// Span of a name, mapped back to host coordinates through the line map.
/// `name_start` is the offset within the line's trimmed content.
fn name_span(block: &PythonBlock, block_line: usize, name_start: usize, name_len: usize) -> Span {
    let line = block.host_line(block_line);
    let col = block.host_col(block_line, name_start);
    Span {
        start_line: line,
        start_col: col,
        end_line: line,
        end_col: col + name_len,
    }
}

fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.find('#') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

fn annotation_type(comment: &str) -> Option<String> {
    TYPE_ANNOTATION
        .captures(comment.trim_start())
        .map(|caps| caps[1].to_string())
}

fn next_line_annotation(lines: &[&str], idx: usize) -> Option<String> {
    let next = lines.get(idx + 1)?.trim();
    let comment = next.strip_prefix('#')?;
    annotation_type(comment)
}

/// Docstring look-ahead: the next non-blank line must open a triple-quoted
/// string deeper than the header. Consumed to the closing delimiter,
/// bounded by the block's end; an unterminated opener attaches nothing.
fn scan_docstring(lines: &[&str], header_idx: usize, header_indent: usize) -> Option<String> {
    let mut i = header_idx + 1;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    let first = lines.get(i)?;
    if indent_of(first) <= header_indent {
        return None;
    }

    let trimmed = first.trim();
    let delim = if trimmed.starts_with("\"\"\"") {
        "\"\"\""
    } else if trimmed.starts_with("'''") {
        "'''"
    } else {
        return None;
    };

    let rest = &trimmed[3..];
    if let Some(end) = rest.find(delim) {
        let doc = rest[..end].trim();
        return (!doc.is_empty()).then(|| doc.to_string());
    }

    let mut parts: Vec<String> = Vec::new();
    if !rest.trim().is_empty() {
        parts.push(rest.trim().to_string());
    }
    i += 1;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if let Some(end) = trimmed.find(delim) {
            let tail = trimmed[..end].trim();
            if !tail.is_empty() {
                parts.push(tail.to_string());
            }
            let doc = parts.join("\n");
            return (!doc.is_empty()).then_some(doc);
        }
        parts.push(trimmed.to_string());
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockExtractor;

    fn parse_all(text: &str) -> Vec<Symbol> {
        BlockExtractor::extract(text)
            .iter()
            .flat_map(SymbolParser::parse)
            .collect()
    }

    #[test]
    fn test_class_with_method_and_docstring() {
        let text = "init python:\n    class Foo:\n        def bar(self):\n            \"\"\"does bar\"\"\"\n            return 1\n";
        let symbols = parse_all(text);

        assert_eq!(symbols.len(), 2);

        let class = &symbols[0];
        assert_eq!(class.name, "Foo");
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.scope, Scope::module());

        let method = &symbols[1];
        assert_eq!(method.name, "bar");
        assert_eq!(method.kind, SymbolKind::Function);
        assert_eq!(method.scope, Scope::in_class("Foo"));
        assert_eq!(method.docstring.as_deref(), Some("does bar"));
        assert_eq!(method.inferred_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_self_attr_scoped_to_enclosing_class() {
        let text = "init python:\n    class C:\n        def __init__(self):\n            self.count = 0\n";
        let symbols = parse_all(text);

        let attr = symbols.iter().find(|s| s.name == "count").unwrap();
        assert_eq!(attr.kind, SymbolKind::Variable);
        assert_eq!(attr.scope, Scope::in_class("C"));
        assert_eq!(attr.inferred_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_self_attr_outside_class_is_module_level() {
        let text = "init python:\n    def setup():\n        self.count = 0\n";
        let symbols = parse_all(text);

        let attr = symbols.iter().find(|s| s.name == "count").unwrap();
        assert_eq!(attr.scope, Scope::module());
    }

    #[test]
    fn test_dollar_statement_variable() {
        let symbols = parse_all("$ score = 0\n");

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "score");
        assert_eq!(symbols[0].kind, SymbolKind::Variable);
        assert_eq!(symbols[0].scope, Scope::module());
        assert_eq!(symbols[0].inferred_type.as_deref(), Some("int"));
        assert_eq!(symbols[0].span.start_line, 0);
        assert_eq!(symbols[0].span.start_col, 2);
        assert_eq!(symbols[0].span.end_col, 7);
    }

    #[test]
    fn test_define_and_default_variables() {
        let symbols = parse_all("define e = Character(\"Eileen\")\ndefault points = 0\n");

        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "e");
        assert_eq!(symbols[0].inferred_type.as_deref(), Some("Character"));
        assert_eq!(symbols[1].name, "points");
        assert_eq!(symbols[1].inferred_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_inline_annotation_overrides_inference() {
        let symbols = parse_all("$ e = make_sprite()  #: Sprite\n");
        assert_eq!(symbols[0].inferred_type.as_deref(), Some("Sprite"));
    }

    #[test]
    fn test_next_line_annotation_in_block() {
        let text = "init python:\n    flags = load_flags()\n    #: dict\n";
        let symbols = parse_all(text);

        let flags = symbols.iter().find(|s| s.name == "flags").unwrap();
        assert_eq!(flags.inferred_type.as_deref(), Some("dict"));
    }

    #[test]
    fn test_module_assignment_below_min_indent_is_ignored() {
        let text = "init python:\n    def f():\n        local = 1\n";
        let symbols = parse_all(text);

        assert!(symbols.iter().all(|s| s.name != "local"));
    }

    #[test]
    fn test_dedent_pops_scope_before_classifying() {
        let text = "init python:\n    class A:\n        def inside(self):\n            pass\n    def outside():\n        pass\n";
        let symbols = parse_all(text);

        let inside = symbols.iter().find(|s| s.name == "inside").unwrap();
        assert_eq!(inside.scope, Scope::in_class("A"));

        let outside = symbols.iter().find(|s| s.name == "outside").unwrap();
        assert_eq!(outside.scope, Scope::module());
    }

    #[test]
    fn test_nested_class_scope() {
        let text = "init python:\n    class Outer:\n        class Inner:\n            pass\n";
        let symbols = parse_all(text);

        let inner = symbols.iter().find(|s| s.name == "Inner").unwrap();
        assert_eq!(inner.scope, Scope::in_class("Outer"));
    }

    #[test]
    fn test_multi_line_docstring_is_joined() {
        let text = "init python:\n    def f():\n        \"\"\"first line\n        second line\n        \"\"\"\n        pass\n";
        let symbols = parse_all(text);

        assert_eq!(
            symbols[0].docstring.as_deref(),
            Some("first line\nsecond line")
        );
    }

    #[test]
    fn test_unterminated_docstring_attaches_nothing() {
        let text = "init python:\n    def f():\n        \"\"\"never closed\n        pass\n";
        let symbols = parse_all(text);

        assert_eq!(symbols[0].docstring, None);
    }

    #[test]
    fn test_class_inherits_base_list() {
        let symbols = parse_all("init python:\n    class Dog(Animal):\n        pass\n");

        assert_eq!(symbols[0].name, "Dog");
        assert_eq!(symbols[0].kind, SymbolKind::Class);
    }

    #[test]
    fn test_comparison_is_not_an_assignment() {
        let symbols = parse_all("$ done == True\n");
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "init python:\n    class A:\n        def m(self):\n            return \"x\"\n    count = 0\n";
        assert_eq!(parse_all(text), parse_all(text));
    }

    #[test]
    fn test_spans_map_back_to_host_lines() {
        let text = "label start:\n    pass\ninit python:\n    version = \"1.0\"\n";
        let symbols = parse_all(text);

        let version = symbols.iter().find(|s| s.name == "version").unwrap();
        assert_eq!(version.span.start_line, 3);
        assert_eq!(version.span.start_col, 4);
    }
}
