//! The filesystem primitives the site builder is allowed to use.
//!
//! The build pipeline restricts itself to three operations: write a file
//! (creating parents), copy a directory tree, and delete a directory tree.
//! Every file the builder produces and the whole promote step go through
//! these helpers, which keeps the dangerous part of a build reviewable in
//! one place.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Write `bytes` to `path`, creating missing parent directories first.
pub fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// Recursively copy the tree rooted at `src` into `dst`.
///
/// Directories are created as encountered, so empty directories survive the
/// copy. Existing files under `dst` are overwritten; files that exist only
/// under `dst` are left alone.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Delete the tree rooted at `path`. A path that does not exist is fine;
/// any other failure is reported.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
