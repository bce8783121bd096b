//! Route paths and the path-normalization rules behind them.
//!
//! Every path that enters the registry (route paths, asset paths, dynamic
//! page keys) passes through the same two normalizers before it is used to
//! name anything on disk:
//!
//! - [`slug`] collapses whitespace runs to single dashes and lowercases, so
//!   `"Reading  List"` → `"reading-list"`.
//! - [`routify`] slugs and then pins the shape of a route path: no trailing
//!   slash, exactly one leading slash. `"/blog/"`, `"blog"` and `"  /blog"`
//!   all become `"/blog"`.
//!
//! Both are idempotent, which is what lets the registry normalize on entry
//! and the builder re-derive file names from stored paths without drift.

/// A registered route: a URL path bound to the content served under it.
///
/// `Static` binds one pre-rendered view to one path. `Dynamic` binds a list
/// of `(key, view)` pages to a common parent path; each page is written as
/// `<path>/<slug(key)>.html` at build time. Keys keep whatever form the
/// caller gave them and are slugged only when the file name is computed.
#[derive(Debug, Clone)]
pub enum Route<V> {
    Static { path: String, content: V },
    Dynamic { path: String, pages: Vec<(String, V)> },
}

impl<V> Route<V> {
    /// The routified URL path this route was registered under.
    pub fn path(&self) -> &str {
        match self {
            Route::Static { path, .. } => path,
            Route::Dynamic { path, .. } => path,
        }
    }
}

/// Lowercase `input` and collapse every whitespace run to a single `-`.
///
/// - `"Reading List"` → `"reading-list"`
/// - `"  lots   of space "` → `"-lots-of-space-"` (edge whitespace becomes
///   edge dashes; [`routify`] trims route paths afterwards)
/// - `"already-a-slug"` → `"already-a-slug"`
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_whitespace = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Normalize a route path: slug it, trim `/` from both ends, and add back a
/// single leading `/`.
///
/// - `"blog"` → `"/blog"`
/// - `"/Blog/Posts/"` → `"/blog/posts"`
/// - `"/"` and `""` → `"/"`
pub fn routify(path: &str) -> String {
    let trimmed = slug(path);
    let trimmed = trimmed.trim_matches('/');
    format!("/{trimmed}")
}

/// Split a routified path into `(parent, last_segment)`, both without
/// slashes at the ends.
///
/// - `"/blog/post"` → `("blog", "post")`
/// - `"/blog"` → `("", "blog")`
/// - `"/"` → `("", "")`
pub fn split_last(path: &str) -> (&str, &str) {
    let trimmed = path.trim_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    }
}
