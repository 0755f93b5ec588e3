//! Orchestration: document text in, blocks and symbols out, index kept
//! consistent across edits, bulk scans, and deletions.

use crate::error::IndexError;
use crate::store::SymbolIndex;
use rpyscope_parser::{BlockExtractor, SymbolParser};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Language tag a document must carry to be indexed.
pub const LANGUAGE_TAG: &str = "renpy";

/// A document owned by the editing/session layer. The core only ever reads
/// it.
pub trait SourceDocument {
    fn id(&self) -> &str;
    fn text(&self) -> String;
    fn language_tag(&self) -> &str;
}

/// Filesystem read access, supplied by the host.
pub trait FileReader {
    fn read_all(&self, path: &Path) -> Result<String, IndexError>;
}

/// Filesystem enumeration, used only by bulk rebuilds.
pub trait FileEnumerator {
    fn list(&self, roots: &[PathBuf], pattern: &str) -> Vec<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RebuildReport {
    /// Open documents indexed.
    pub documents: usize,
    /// On-disk files indexed.
    pub files: usize,
    /// Files skipped because they could not be read.
    pub skipped: usize,
    /// Symbols indexed in total.
    pub symbols: usize,
}

pub struct IndexManager {
    index: Arc<SymbolIndex>,
}

impl IndexManager {
    pub fn new(index: Arc<SymbolIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    /// Recompute a document's symbols wholesale and swap them in. Documents
    /// that are not Ren'Py script are left untouched.
    pub fn reindex_document(&self, document: &dyn SourceDocument) -> usize {
        if document.language_tag() != LANGUAGE_TAG {
            return 0;
        }
        self.reindex_from_text(document.id(), &document.text())
    }

    /// Same, for content read out-of-band (files not open in any editor).
    pub fn reindex_from_text(&self, document_id: &str, text: &str) -> usize {
        let mut symbols = Vec::new();
        for block in BlockExtractor::extract(text) {
            symbols.extend(SymbolParser::parse(&block));
        }
        let count = symbols.len();
        self.index.replace_document(document_id, symbols);
        debug!("Indexed {document_id}: {count} symbols");
        count
    }

    pub fn remove_document(&self, document_id: &str) {
        self.index.clear_document(document_id);
    }

    /// Clear the index and rebuild it: open documents first, then files on
    /// disk not already covered by an open document. Unreadable files are
    /// skipped with a diagnostic, never fatal to the batch.
    pub fn rebuild_all(
        &self,
        open_documents: &[&dyn SourceDocument],
        files: &[PathBuf],
        reader: &dyn FileReader,
    ) -> RebuildReport {
        self.index.clear_all();

        let mut report = RebuildReport::default();
        let mut covered: HashSet<&str> = HashSet::new();

        for document in open_documents {
            if document.language_tag() != LANGUAGE_TAG {
                continue;
            }
            report.symbols += self.reindex_from_text(document.id(), &document.text());
            report.documents += 1;
            covered.insert(document.id());
        }

        for path in files {
            let id = path.to_string_lossy();
            if covered.contains(id.as_ref()) {
                continue;
            }
            match reader.read_all(path) {
                Ok(text) => {
                    report.symbols += self.reindex_from_text(&id, &text);
                    report.files += 1;
                }
                Err(e) => {
                    warn!("Skipping {id}: {e}");
                    report.skipped += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpyscope_parser::{ScopeKind, SymbolKind};

    struct StaticDocument {
        id: String,
        text: String,
        language_tag: String,
    }

    impl StaticDocument {
        fn renpy(id: &str, text: &str) -> Self {
            Self {
                id: id.to_string(),
                text: text.to_string(),
                language_tag: LANGUAGE_TAG.to_string(),
            }
        }
    }

    impl SourceDocument for StaticDocument {
        fn id(&self) -> &str {
            &self.id
        }

        fn text(&self) -> String {
            self.text.clone()
        }

        fn language_tag(&self) -> &str {
            &self.language_tag
        }
    }

    struct UnreadableFs;

    impl FileReader for UnreadableFs {
        fn read_all(&self, path: &Path) -> Result<String, IndexError> {
            Err(IndexError::NotReadable {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    struct MapFs(std::collections::HashMap<PathBuf, String>);

    impl FileReader for MapFs {
        fn read_all(&self, path: &Path) -> Result<String, IndexError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| IndexError::NotReadable {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
        }
    }

    fn manager() -> IndexManager {
        IndexManager::new(Arc::new(SymbolIndex::new()))
    }

    #[test]
    fn test_end_to_end_class_method_lookup() {
        let manager = manager();
        let doc = StaticDocument::renpy(
            "game/script.rpy",
            "init python:\n    class Foo:\n        def bar(self):\n            \"\"\"does bar\"\"\"\n            return 1\n",
        );

        manager.reindex_document(&doc);

        let hit = manager.index().get("bar").unwrap();
        assert_eq!(hit.document_id, "game/script.rpy");
        assert_eq!(hit.symbol.kind, SymbolKind::Function);
        assert_eq!(hit.symbol.scope.kind, ScopeKind::Class);
        assert_eq!(hit.symbol.scope.owner.as_deref(), Some("Foo"));
        assert_eq!(hit.symbol.docstring.as_deref(), Some("does bar"));
        assert_eq!(hit.symbol.inferred_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_dollar_statement_end_to_end() {
        let manager = manager();
        manager.reindex_from_text("game/start.rpy", "label start:\n    $ score = 0\n");

        let hit = manager.index().get("score").unwrap();
        assert_eq!(hit.symbol.kind, SymbolKind::Variable);
        assert_eq!(hit.symbol.scope.kind, ScopeKind::Module);
        assert_eq!(hit.symbol.inferred_type.as_deref(), Some("int"));
        assert_eq!(hit.symbol.span.start_line, 1);
    }

    #[test]
    fn test_non_renpy_document_is_ignored() {
        let manager = manager();
        let doc = StaticDocument {
            id: "notes.txt".to_string(),
            text: "$ score = 0".to_string(),
            language_tag: "plaintext".to_string(),
        };

        assert_eq!(manager.reindex_document(&doc), 0);
        assert!(manager.index().get("score").is_none());
    }

    #[test]
    fn test_reindex_replaces_previous_symbols() {
        let manager = manager();
        manager.reindex_from_text("a.rpy", "$ old_name = 1\n");
        manager.reindex_from_text("a.rpy", "$ new_name = 1\n");

        assert!(manager.index().get("old_name").is_none());
        assert!(manager.index().get("new_name").is_some());
    }

    #[test]
    fn test_remove_document_clears_its_names() {
        let manager = manager();
        manager.reindex_from_text("a.rpy", "$ score = 0\n");
        manager.remove_document("a.rpy");

        assert!(manager.index().get("score").is_none());
    }

    #[test]
    fn test_rebuild_prefers_open_documents_over_disk() {
        let manager = manager();
        let open = StaticDocument::renpy("game/a.rpy", "$ hp = 100\n");

        let mut files = std::collections::HashMap::new();
        files.insert(PathBuf::from("game/a.rpy"), "$ hp = \"stale\"\n".to_string());
        files.insert(PathBuf::from("game/b.rpy"), "$ mp = 50\n".to_string());

        let report = manager.rebuild_all(
            &[&open],
            &[PathBuf::from("game/a.rpy"), PathBuf::from("game/b.rpy")],
            &MapFs(files),
        );

        assert_eq!(report.documents, 1);
        assert_eq!(report.files, 1);
        assert_eq!(report.skipped, 0);

        // The open buffer's content won, not the stale on-disk copy.
        let hp = manager.index().get("hp").unwrap();
        assert_eq!(hp.symbol.inferred_type.as_deref(), Some("int"));
        assert!(manager.index().get("mp").is_some());
    }

    #[test]
    fn test_rebuild_skips_unreadable_files() {
        let manager = manager();
        let report = manager.rebuild_all(
            &[],
            &[PathBuf::from("game/broken.rpy")],
            &UnreadableFs,
        );

        assert_eq!(report.files, 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_rebuild_clears_stale_documents() {
        let manager = manager();
        manager.reindex_from_text("gone.rpy", "$ ghost = 1\n");

        manager.rebuild_all(&[], &[], &UnreadableFs);
        assert!(manager.index().get("ghost").is_none());
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let manager = manager();
        let text = "init python:\n    class A:\n        def m(self):\n            return \"x\"\n";

        manager.reindex_from_text("a.rpy", text);
        let first = manager.index().symbols_in("a.rpy");
        manager.reindex_from_text("a.rpy", text);
        let second = manager.index().symbols_in("a.rpy");

        assert_eq!(first, second);
    }
}
