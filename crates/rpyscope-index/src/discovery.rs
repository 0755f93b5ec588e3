//! Filesystem collaborators: reading script sources and enumerating them.

use crate::error::IndexError;
use crate::manager::{FileEnumerator, FileReader};
use glob::Pattern;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories of a Ren'Py project tree that never hold script sources.
pub const EXCLUDED_DIRS: &[&str] = &["cache", "saves", "log", "tmp", ".git"];

/// File-name glob matched by bulk rebuilds when no other pattern is given.
pub const SCRIPT_PATTERN: &str = "*.rpy";

/// Whether any path component is hidden or one of the excluded directories.
pub fn should_exclude_path(path: &Path) -> bool {
    for component in path.components() {
        if let std::path::Component::Normal(name) = component {
            let name = name.to_string_lossy();
            if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref()) {
                return true;
            }
        }
    }
    false
}

/// Reads script files straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read_all(&self, path: &Path) -> Result<String, IndexError> {
        fs::read_to_string(path).map_err(|source| IndexError::NotReadable {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Walks project roots for script files, honoring `.gitignore`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEnumerator;

impl FileEnumerator for FsEnumerator {
    fn list(&self, roots: &[PathBuf], pattern: &str) -> Vec<PathBuf> {
        let matcher = Pattern::new(pattern).ok();

        let mut out = Vec::new();
        for root in roots {
            let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();
            for entry in walker.filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() || should_exclude_path(path) {
                    continue;
                }
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                let matched = match &matcher {
                    Some(pattern) => pattern.matches(name),
                    None => name.ends_with(".rpy"),
                };
                if matched {
                    out.push(path.to_path_buf());
                }
            }
        }
        out.sort();
        out
    }
}
