//! TOML frontmatter: detect it, strip it, parse it.
//!
//! A document carries frontmatter when it *starts* with the line `---` and a
//! later line is exactly `---`. Everything between the two delimiter lines
//! is the frontmatter text; the parsers here never look past the closing
//! delimiter.
//!
//! ```text
//! ---
//! title = "Reading list"
//! draft = false
//! ---
//! The document content starts here.
//! ```
//!
//! The split and the parse are separate on purpose: [`content`] never fails
//! (malformed TOML is still strippable), while [`metadata`] surfaces TOML
//! errors only when the caller actually asked for metadata.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Return the raw frontmatter text when `document` carries a frontmatter
/// block, trailing newline included.
///
/// `None` when the document does not begin with `---` on its own line, or
/// when no closing `---` line follows. The first closing delimiter wins.
pub fn extract(document: &str) -> Option<&str> {
    let rest = document.strip_prefix("---\n")?;
    let mut offset = 0;
    for line in rest.split('\n') {
        if line == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len() + 1;
    }
    None
}

/// The document with its frontmatter block removed, delimiters included.
///
/// Documents without frontmatter come back unchanged, so this is safe to
/// apply unconditionally before parsing content.
pub fn content(document: &str) -> &str {
    match extract(document) {
        Some(inner) => {
            // "---\n" + inner + "---", then the closing line's newline if any.
            let end = 4 + inner.len() + 3;
            let rest = &document[end..];
            rest.strip_prefix('\n').unwrap_or(rest)
        }
        None => document,
    }
}

/// Parse the frontmatter into a [`toml::Table`].
///
/// A document without frontmatter yields an empty table; only malformed
/// TOML inside an existing block is an error.
pub fn metadata(document: &str) -> Result<toml::Table, MetadataError> {
    match extract(document) {
        Some(raw) => Ok(raw.parse::<toml::Table>()?),
        None => Ok(toml::Table::new()),
    }
}
