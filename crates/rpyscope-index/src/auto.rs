//! Keeps the index in step with a project tree on disk.

use crate::discovery::{FsEnumerator, FsReader, SCRIPT_PATTERN};
use crate::manager::{FileEnumerator, FileReader, IndexManager, RebuildReport};
use crate::watcher::{FileEvent, ScriptWatcher};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

pub struct AutoIndexer {
    manager: Arc<IndexManager>,
    watcher: Mutex<ScriptWatcher>,
    project_root: PathBuf,
    reader: FsReader,
}

#[derive(Debug, Default)]
pub struct ProcessResult {
    pub indexed: usize,
    pub removed: usize,
    pub errors: usize,
}

impl AutoIndexer {
    pub fn new(manager: Arc<IndexManager>, project_root: PathBuf) -> Result<Self> {
        let mut watcher = ScriptWatcher::new()?;
        watcher.watch(&project_root)?;

        info!("AutoIndexer initialized for {:?}", project_root);

        Ok(Self {
            manager,
            watcher: Mutex::new(watcher),
            project_root,
            reader: FsReader,
        })
    }

    /// Walk the project once and index every script file found.
    pub fn initial_scan(&self) -> RebuildReport {
        let files = FsEnumerator.list(&[self.project_root.clone()], SCRIPT_PATTERN);
        let report = self.manager.rebuild_all(&[], &files, &self.reader);
        info!(
            "Initial scan: {} files indexed, {} skipped, {} symbols",
            report.files, report.skipped, report.symbols
        );
        report
    }

    /// Process pending file events and reindex what changed.
    pub fn process_events(&self) -> ProcessResult {
        let events = match self.watcher.lock() {
            Ok(watcher) => watcher.poll_events(),
            Err(poisoned) => poisoned.into_inner().poll_events(),
        };

        let mut result = ProcessResult::default();

        for event in events {
            match event {
                FileEvent::Created(path) | FileEvent::Modified(path) => {
                    match self.index_file(&path) {
                        Ok(()) => result.indexed += 1,
                        Err(e) => {
                            error!("Failed to index {:?}: {}", path, e);
                            result.errors += 1;
                        }
                    }
                }
                FileEvent::Deleted(path) => {
                    self.manager.remove_document(&path.to_string_lossy());
                    result.removed += 1;
                }
            }
        }

        if result.indexed > 0 || result.removed > 0 {
            info!(
                "Auto-indexed: {} files updated, {} files removed, {} errors",
                result.indexed, result.removed, result.errors
            );
        }

        result
    }

    fn index_file(&self, path: &Path) -> Result<()> {
        let text = self.reader.read_all(path)?;
        self.manager
            .reindex_from_text(&path.to_string_lossy(), &text);
        Ok(())
    }
}
