//! Filesystem watching for script files.

use crate::discovery::should_exclude_path;
use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use tracing::{debug, error, info};

pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

/// Watches a project tree and surfaces script-file events on demand.
pub struct ScriptWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<Result<Event, notify::Error>>,
}

impl ScriptWatcher {
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
        })
    }

    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!("Watching directory: {:?}", path);
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        Ok(())
    }

    /// Drain pending notifications into script-file events.
    pub fn poll_events(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();

        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => {
                    debug!("File event: {:?}", event);
                    events.extend(Self::convert_event(event));
                }
                Err(e) => {
                    error!("Watch error: {:?}", e);
                }
            }
        }

        events
    }

    fn convert_event(event: Event) -> Vec<FileEvent> {
        let mut file_events = Vec::new();

        for path in event.paths {
            if !is_script(&path) || should_exclude_path(&path) {
                continue;
            }

            match event.kind {
                EventKind::Create(_) => file_events.push(FileEvent::Created(path)),
                EventKind::Modify(_) => file_events.push(FileEvent::Modified(path)),
                EventKind::Remove(_) => file_events.push(FileEvent::Deleted(path)),
                _ => {}
            }
        }

        file_events
    }
}

fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rpy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_creation() {
        assert!(ScriptWatcher::new().is_ok());
    }

    #[test]
    fn test_is_script() {
        assert!(is_script(Path::new("game/script.rpy")));
        assert!(!is_script(Path::new("game/script.rpyc")));
        assert!(!is_script(Path::new("game/image.png")));
    }
}
