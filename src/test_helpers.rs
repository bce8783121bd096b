//! Shared test utilities for the sitestage test suite.
//!
//! Fixture builders and filesystem helpers used by the in-module tests of
//! the builder and the filesystem primitives.

use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Create a temp directory containing the given `(relative path, content)`
/// files. Parent directories are created as needed.
pub fn site_fixture(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (path, content) in files {
        let file = tmp.path().join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file, content).unwrap();
    }
    tmp
}

// =========================================================================
// Filesystem lookups
// =========================================================================

/// Read a file under `root` to a string. Panics with the full path if the
/// file is missing or unreadable.
pub fn read_page(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("could not read {}: {e}", path.display()))
}

/// All file paths under `root`, relative and sorted, for whole-tree
/// comparisons.
pub fn tree(root: &Path) -> Vec<String> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap();
            paths.push(rel.display().to_string());
        }
    }
    paths.sort();
    paths
}
