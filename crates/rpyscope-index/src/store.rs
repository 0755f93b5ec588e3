//! The in-memory symbol index.
//!
//! Symbols are stored per owning document, keyed by name within each
//! document's table. The map is sharded (`DashMap`), so lookups proceed
//! concurrently with re-indexing of unrelated documents and writes to one
//! document's table exclude each other without a global lock.

use dashmap::DashMap;
use rpyscope_parser::Symbol;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct DocumentTable {
    /// Stamp of the write that installed this table; cross-document name
    /// collisions resolve to the highest stamp (most recently indexed
    /// document wins).
    revision: u64,
    symbols: HashMap<String, Symbol>,
}

/// A successful name lookup: the symbol and the document declaring it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolHit {
    pub document_id: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub symbol_count: usize,
}

pub struct SymbolIndex {
    documents: DashMap<String, DocumentTable>,
    revision: AtomicU64,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            revision: AtomicU64::new(0),
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert one symbol into a document's table. Within a document the
    /// last write for a name wins.
    pub fn add(&self, document_id: &str, symbol: Symbol) {
        let revision = self.next_revision();
        let mut table = self
            .documents
            .entry(document_id.to_string())
            .or_insert_with(|| DocumentTable {
                revision: 0,
                symbols: HashMap::new(),
            });
        table.revision = revision;
        table.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Replace a document's whole table in one step. The new table is
    /// staged before the swap, so a concurrent `get` sees either the old
    /// symbols or the new ones, never a half-cleared document.
    pub fn replace_document(&self, document_id: &str, symbols: Vec<Symbol>) {
        let mut staged = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            staged.insert(symbol.name.clone(), symbol);
        }
        let revision = self.next_revision();
        self.documents.insert(
            document_id.to_string(),
            DocumentTable {
                revision,
                symbols: staged,
            },
        );
    }

    /// Look a name up across every document. When several documents
    /// declare it, the most recently indexed document wins. A miss is a
    /// plain `None`, never an error.
    pub fn get(&self, name: &str) -> Option<SymbolHit> {
        let mut best: Option<(u64, SymbolHit)> = None;
        for entry in self.documents.iter() {
            if let Some(symbol) = entry.value().symbols.get(name) {
                let revision = entry.value().revision;
                if best.as_ref().is_none_or(|(rev, _)| revision > *rev) {
                    best = Some((
                        revision,
                        SymbolHit {
                            document_id: entry.key().clone(),
                            symbol: symbol.clone(),
                        },
                    ));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    /// All of one document's symbols, ordered by position.
    pub fn symbols_in(&self, document_id: &str) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .documents
            .get(document_id)
            .map(|table| table.symbols.values().cloned().collect())
            .unwrap_or_default();
        symbols.sort_by_key(|s| (s.span.start_line, s.span.start_col));
        symbols
    }

    pub fn clear_document(&self, document_id: &str) {
        self.documents.remove(document_id);
    }

    pub fn clear_all(&self) {
        self.documents.clear();
    }

    pub fn stats(&self) -> IndexStats {
        let mut symbol_count = 0;
        for entry in self.documents.iter() {
            symbol_count += entry.value().symbols.len();
        }
        IndexStats {
            document_count: self.documents.len(),
            symbol_count,
        }
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}
