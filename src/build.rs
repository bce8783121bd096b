//! The site builder: stage everything in a workspace, then promote it.
//!
//! A build never writes into the output directory directly. All files are
//! produced in a disposable workspace first; only after every seed copy,
//! asset, and route page was written does the promote step replace the
//! published tree:
//!
//! ```text
//! static dir ──copy──▶ ┌─────────────────┐
//! assets ────write───▶ │    workspace    │ ──delete out_dir──▶ ┌─────────┐
//! routes ────write───▶ │ (<out>.staging) │ ──copy────────────▶ │ out_dir │
//!                      └─────────────────┘ ──delete workspace  └─────────┘
//! ```
//!
//! The promote is delete-then-copy, not a rename, so `out_dir` may live on a
//! different filesystem than the workspace. The window in which `out_dir` is
//! missing is as small as the copy; a *failed* build never reaches the
//! promote step at all, so the previously published tree stays untouched and
//! the half-written workspace is left behind for inspection.
//!
//! Two builds driving the same workspace or output path at the same time are
//! not supported; run builds for a given site one at a time.
//!
//! ## File naming
//!
//! | Route                          | File written                       |
//! |--------------------------------|------------------------------------|
//! | static `"/"`                   | `index.html`                       |
//! | static `"/about"` (default)    | `about.html`                       |
//! | static `"/about"` (index mode) | `about/index.html`                 |
//! | dynamic `"/blog"`, key `k`     | `blog/<slug(k)>.html`              |
//! | asset `"/feed.xml"`            | `feed.xml` (name kept verbatim)    |
//!
//! Routes are written in lexicographic path order, so output is identical
//! across builds of the same registry.

use std::fs;
use std::path::{Path, PathBuf};

use maud::Render;
use thiserror::Error;

use crate::config::{Config, HasRoutes};
use crate::fsops;
use crate::route::{self, Route};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl<V: Render, D> Config<V, HasRoutes, D> {
    /// Build the site into `out_dir`, staging in `<out_dir>.staging`.
    pub fn build(&self) -> Result<(), BuildError> {
        let workspace = PathBuf::from(format!("{}.staging", self.out_dir.trim_end_matches('/')));
        self.build_with_workspace(&workspace)
    }

    /// Build the site into `out_dir`, staging in an explicit `workspace`.
    ///
    /// The workspace is deleted and recreated at the start of the build and
    /// removed again after a successful promote. After a failed build it is
    /// left in place, holding whatever had been staged up to the failure.
    pub fn build_with_workspace(&self, workspace: &Path) -> Result<(), BuildError> {
        let out_dir = Path::new(self.out_dir.trim_end_matches('/'));

        // Stage: a fresh workspace, seeded from the static dir when one is
        // configured.
        fsops::remove_dir_if_exists(workspace)?;
        match &self.static_dir {
            Some(dir) => fsops::copy_dir(Path::new(dir), workspace)?,
            None => fs::create_dir_all(workspace)?,
        }
        tracing::debug!(workspace = %workspace.display(), "Staged workspace");

        // Assets overwrite same-named seeded files.
        for (path, bytes) in &self.static_assets {
            fsops::write_file(&join_route(workspace, path), bytes)?;
        }
        tracing::debug!(count = self.static_assets.len(), "Wrote static assets");

        // Routes in lexicographic path order. The sort is stable, so routes
        // registered under the same path keep registration-stack order and
        // the earliest-registered one is written last.
        let mut routes: Vec<&Route<V>> = self.routes.iter().collect();
        routes.sort_by(|a, b| a.path().cmp(b.path()));
        for route in routes {
            self.write_route(workspace, route)?;
        }
        tracing::debug!(count = self.routes.len(), "Wrote routes");

        // Promote: replace the published tree with the staged one.
        fsops::remove_dir_if_exists(out_dir)?;
        fsops::copy_dir(workspace, out_dir)?;
        fsops::remove_dir_if_exists(workspace)?;
        tracing::debug!(out_dir = %out_dir.display(), "Promoted site");
        Ok(())
    }

    fn write_route(&self, workspace: &Path, route: &Route<V>) -> Result<(), BuildError> {
        match route {
            Route::Static { path, content } => {
                let html = content.render().into_string();
                let file = if path == "/" {
                    // The root route is index.html regardless of naming mode.
                    workspace.join("index.html")
                } else if self.use_index_routes {
                    join_route(workspace, path).join("index.html")
                } else {
                    let (parent, name) = route::split_last(path);
                    join_route(workspace, parent).join(format!("{name}.html"))
                };
                fsops::write_file(&file, html.as_bytes())?;
            }
            Route::Dynamic { path, pages } => {
                // The directory exists even for a route with no pages; a
                // creation failure surfaces on the first page write.
                let dir = join_route(workspace, path);
                let _ = fs::create_dir_all(&dir);
                for (key, content) in pages {
                    let html = content.render().into_string();
                    let file = dir.join(format!("{}.html", route::slug(key)));
                    fsops::write_file(&file, html.as_bytes())?;
                }
            }
        }
        Ok(())
    }
}

fn join_route(base: &Path, path: &str) -> PathBuf {
    base.join(path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{read_page, site_fixture, tree};
    use maud::html;

    #[test]
    fn static_route_default_naming() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/about", html! { p { "About" } })
            .build()
            .unwrap();
        let page = fs::read_to_string(out.join("about.html")).unwrap();
        assert_eq!(page, "<p>About</p>");
    }

    #[test]
    fn static_route_index_naming() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/about", html! { p { "About" } })
            .use_index_routes()
            .build()
            .unwrap();
        assert!(out.join("about/index.html").is_file());
        assert!(!out.join("about.html").exists());
    }

    #[test]
    fn root_route_is_always_index_html() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { h1 { "Home" } })
            .build()
            .unwrap();
        assert!(out.join("index.html").is_file());

        // Same result with index naming switched on.
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { h1 { "Home" } })
            .use_index_routes()
            .build()
            .unwrap();
        assert!(out.join("index.html").is_file());
    }

    #[test]
    fn nested_static_route_writes_into_parent_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/docs/guide/install", html! { p { "How to" } })
            .build()
            .unwrap();
        assert!(out.join("docs/guide/install.html").is_file());
    }

    #[test]
    fn dynamic_route_slugs_page_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .add_dynamic_route(
                "/blog",
                vec![
                    ("Hello World".to_string(), "Hello"),
                    ("Second Post".to_string(), "Second"),
                ],
                |body| html! { p { (body) } },
            )
            .build()
            .unwrap();
        assert!(out.join("blog/hello-world.html").is_file());
        assert!(out.join("blog/second-post.html").is_file());

        // The index-routes flag changes nothing for dynamic pages.
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .add_dynamic_route("/blog", vec![("Hello World".to_string(), "Hello")], |body| {
                html! { p { (body) } }
            })
            .use_index_routes()
            .build()
            .unwrap();
        assert!(out.join("blog/hello-world.html").is_file());
        assert!(!out.join("blog/hello-world/index.html").exists());
    }

    #[test]
    fn assets_are_written_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .add_static_asset("/feed.xml", "<feed/>")
            .build()
            .unwrap();
        assert_eq!(fs::read_to_string(out.join("feed.xml")).unwrap(), "<feed/>");
    }

    #[test]
    fn successful_build_removes_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .build()
            .unwrap();
        assert!(!tmp.path().join("site.staging").exists());
    }

    #[test]
    fn trailing_slash_on_out_dir_is_trimmed() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(format!("{}/", out.display()))
            .add_static_route("/", html! { "home" })
            .build()
            .unwrap();
        assert!(out.join("index.html").is_file());
    }

    #[test]
    fn explicit_workspace_is_used_for_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        let workspace = tmp.path().join("scratch");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .build_with_workspace(&workspace)
            .unwrap();
        assert!(out.join("index.html").is_file());
        assert!(!workspace.exists());
    }

    #[test]
    fn static_dir_seeds_the_output() {
        let fixture = site_fixture(&[("style.css", "body {}"), ("img/logo.svg", "<svg/>")]);
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_dir(fixture.path().to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .build()
            .unwrap();
        assert_eq!(read_page(&out, "style.css"), "body {}");
        assert_eq!(read_page(&out, "img/logo.svg"), "<svg/>");
    }

    #[test]
    fn assets_overlay_seeded_files() {
        let fixture = site_fixture(&[("robots.txt", "seeded")]);
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_dir(fixture.path().to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .add_static_asset("/robots.txt", "declared")
            .build()
            .unwrap();
        assert_eq!(read_page(&out, "robots.txt"), "declared");
    }

    #[test]
    fn republish_removes_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("site");
        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .add_static_route("/old", html! { "old" })
            .build()
            .unwrap();
        assert_eq!(tree(&out), vec!["index.html", "old.html"]);

        Config::new(out.to_str().unwrap())
            .add_static_route("/", html! { "home" })
            .build()
            .unwrap();
        assert_eq!(tree(&out), vec!["index.html"]);
    }
}
