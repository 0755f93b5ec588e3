//! Extraction of embedded Python blocks from Ren'Py script text.
//!
//! Recognition is structural: trimmed-prefix patterns for block headers and
//! indentation tracking for block bodies. The surrounding Ren'Py grammar is
//! never parsed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// `python:`-family header: optional `init` prefix with an optional signed
/// priority, optional `in <store>` namespace clause.
static PYTHON_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:init(?:\s+(-?\d+))?\s+)?python(?:\s+in\s+([A-Za-z_][A-Za-z0-9_.]*))?\s*:")
        .unwrap()
});

/// `define name = expr` / `default name = expr`.
static DEFINE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(define|default)\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// `python:`
    Bare,
    /// `init python:` / `init <N> python:`
    Init { priority: i32 },
    /// `python in <store>:`
    Store { name: String },
    /// Single-line `$ <statement>`.
    Statement,
    /// Single-line `define <name> = <expr>`.
    Define,
    /// Single-line `default <name> = <expr>`, rewritten to a guarded
    /// assignment so downstream parsing sees plain assignment syntax.
    Default,
}

/// One line of correspondence between a block's `code` and the host script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMapEntry {
    /// Line in the host document (0-based).
    pub host_line: usize,
    /// Line within `code` (0-based, contiguous from 0).
    pub block_line: usize,
    /// Host column at which the line's trimmed content starts.
    pub host_col_base: usize,
}

/// A contiguous fragment of embedded Python with its host correspondence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonBlock {
    pub code: String,
    /// Host line of the first body line (the line itself for one-line forms).
    pub start_line: usize,
    /// Indentation of the block header.
    pub base_indent: usize,
    pub kind: BlockKind,
    pub line_map: Vec<LineMapEntry>,
}

impl PythonBlock {
    /// Host line for a line of `code`.
    pub fn host_line(&self, block_line: usize) -> usize {
        self.line_map
            .get(block_line)
            .map(|entry| entry.host_line)
            .unwrap_or(self.start_line)
    }

    /// Host column for a column within the trimmed content of a code line.
    pub fn host_col(&self, block_line: usize, col_in_trimmed: usize) -> usize {
        self.line_map
            .get(block_line)
            .map(|entry| entry.host_col_base + col_in_trimmed)
            .unwrap_or(col_in_trimmed)
    }
}

pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

struct OpenBlock {
    kind: BlockKind,
    start_line: usize,
    base_indent: usize,
    lines: Vec<String>,
    line_map: Vec<LineMapEntry>,
}

impl OpenBlock {
    fn new(kind: BlockKind, header_line: usize, base_indent: usize) -> Self {
        Self {
            kind,
            start_line: header_line + 1,
            base_indent,
            lines: Vec::new(),
            line_map: Vec::new(),
        }
    }

    /// Blank lines and dedented comment lines keep their slot in the map so
    /// block lines stay aligned with host lines.
    fn push_placeholder(&mut self, host_line: usize, indent: usize) {
        self.line_map.push(LineMapEntry {
            host_line,
            block_line: self.lines.len(),
            host_col_base: indent,
        });
        self.lines.push(String::new());
    }

    fn push_line(&mut self, host_line: usize, line: &str) {
        self.line_map.push(LineMapEntry {
            host_line,
            block_line: self.lines.len(),
            host_col_base: indent_of(line),
        });
        self.lines.push(line.to_string());
    }

    fn finish(self) -> PythonBlock {
        PythonBlock {
            code: self.lines.join("\n"),
            start_line: self.start_line,
            base_indent: self.base_indent,
            kind: self.kind,
            line_map: self.line_map,
        }
    }
}

pub struct BlockExtractor;

impl BlockExtractor {
    /// Scan host text and return every embedded Python fragment in order.
    pub fn extract(text: &str) -> Vec<PythonBlock> {
        let normalized = normalize_newlines(text);
        let lines: Vec<&str> = normalized.split('\n').collect();

        let mut blocks = Vec::new();
        let mut open: Option<OpenBlock> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            let indent = indent_of(line);

            if let Some(mut block) = open.take() {
                let blank = trimmed.is_empty();
                let comment = trimmed.starts_with('#');

                // A dedent ends the block and the line is re-offered as
                // Ren'Py; a nested header flushes the open block first.
                if !blank
                    && !comment
                    && (indent <= block.base_indent || PYTHON_HEADER.is_match(trimmed))
                {
                    flush(block, &mut blocks);
                    continue;
                }

                // Blank lines and dedented comments become placeholders;
                // indented comments are body text (they can carry `#:`
                // type annotations).
                if blank || (comment && indent <= block.base_indent) {
                    block.push_placeholder(i, indent);
                } else {
                    block.push_line(i, line);
                }
                open = Some(block);
                i += 1;
                continue;
            }

            if let Some(caps) = PYTHON_HEADER.captures(trimmed) {
                let kind = if let Some(store) = caps.get(2) {
                    BlockKind::Store {
                        name: store.as_str().to_string(),
                    }
                } else if trimmed.starts_with("init") {
                    let priority = caps
                        .get(1)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    BlockKind::Init { priority }
                } else {
                    BlockKind::Bare
                };
                open = Some(OpenBlock::new(kind, i, indent));
                i += 1;
                continue;
            }

            if let Some(stmt) = trimmed.strip_prefix("$ ") {
                blocks.push(one_line_block(
                    BlockKind::Statement,
                    stmt.to_string(),
                    i,
                    indent,
                    indent + 2,
                ));
                i += 1;
                continue;
            }

            if let Some(caps) = DEFINE_HEADER.captures(trimmed) {
                let name = &caps[2];
                let expr = caps[3].trim_end();
                let (kind, code) = match &caps[1] {
                    "define" => (BlockKind::Define, format!("{name} = {expr}")),
                    _ => (
                        BlockKind::Default,
                        format!("{name} = {name} if hasattr(store, '{name}') else {expr}"),
                    ),
                };
                let name_col = indent + caps.get(2).map(|m| m.start()).unwrap_or(0);
                blocks.push(one_line_block(kind, code, i, indent, name_col));
                i += 1;
                continue;
            }

            i += 1;
        }

        if let Some(block) = open {
            flush(block, &mut blocks);
        }
        blocks
    }
}

fn one_line_block(
    kind: BlockKind,
    code: String,
    host_line: usize,
    indent: usize,
    host_col_base: usize,
) -> PythonBlock {
    PythonBlock {
        code,
        start_line: host_line,
        base_indent: indent,
        kind,
        line_map: vec![LineMapEntry {
            host_line,
            block_line: 0,
            host_col_base,
        }],
    }
}

/// Blocks that collected no lines at all are dropped.
fn flush(block: OpenBlock, blocks: &mut Vec<PythonBlock>) {
    if block.line_map.is_empty() {
        debug!("Discarding empty block at line {}", block.start_line);
    } else {
        blocks.push(block.finish());
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Whether `line` of `text` sits inside a `python:`-family block body.
///
/// Walks upward from the line, tracking the smallest indentation seen among
/// substantive lines. When a header is reached, the position is inside the
/// block exactly when every line in between stayed deeper than the header.
pub fn in_python_block(text: &str, line: usize) -> bool {
    let normalized = normalize_newlines(text);
    let lines: Vec<&str> = normalized.split('\n').collect();
    if line >= lines.len() {
        return false;
    }

    let mut min_indent = usize::MAX;
    for i in (0..=line).rev() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indent_of(lines[i]);
        if i < line && PYTHON_HEADER.is_match(trimmed) {
            return indent < min_indent;
        }
        min_indent = min_indent.min(indent);
    }
    false
}
