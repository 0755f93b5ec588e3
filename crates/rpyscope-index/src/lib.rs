pub mod auto;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod store;
pub mod watcher;

pub use auto::{AutoIndexer, ProcessResult};
pub use discovery::{EXCLUDED_DIRS, FsEnumerator, FsReader, SCRIPT_PATTERN, should_exclude_path};
pub use error::IndexError;
pub use manager::{
    FileEnumerator, FileReader, IndexManager, LANGUAGE_TAG, RebuildReport, SourceDocument,
};
pub use store::{IndexStats, SymbolHit, SymbolIndex};
pub use watcher::{FileEvent, ScriptWatcher};
