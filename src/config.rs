//! The route registry: what gets published, and where.
//!
//! [`Config`] is a by-value builder. Every call consumes the registry and
//! returns it with one more fact recorded, so a site definition reads as a
//! single chain:
//!
//! ```text
//! Config::new("dist")
//!     .add_static_dir("static")
//!     .add_static_route("/", index)
//!     .add_static_route("/about", about)
//!     .add_dynamic_route("/blog", posts, render_post)
//!     .add_static_asset("/feed.xml", feed)
//!     .build()?;
//! ```
//!
//! ## Phase parameters
//!
//! Two preconditions are enforced by the type system instead of at runtime:
//!
//! - `build` exists only on `Config<V, HasRoutes, D>`, so a registry with no
//!   routes cannot reach the builder at all.
//! - `add_static_dir` exists only on `Config<V, R, NoStaticDir>`, so a
//!   second static dir has nowhere to go and the call does not typecheck.
//!
//! The phase enums are uninhabited. They are never constructed and exist
//! purely as type arguments behind a `PhantomData`.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::route::{self, Route};

/// Phase: no route registered yet. `build` is unavailable.
pub enum NoRoutes {}
/// Phase: at least one static route registered.
pub enum HasRoutes {}
/// Phase: no static dir configured; [`Config::add_static_dir`] is available.
pub enum NoStaticDir {}
/// Phase: a static dir is configured.
pub enum HasStaticDir {}

/// A complete description of one site build: output directory, routes,
/// static assets, and the naming policy for static routes.
///
/// `V` is the view type routes carry. It stays opaque to the registry and is
/// only serialized (via [`maud::Render`]) when [`build`](Config::build)
/// runs. `R` and `D` are the phase parameters described in the module docs.
pub struct Config<V, R = NoRoutes, D = NoStaticDir> {
    pub(crate) out_dir: String,
    pub(crate) static_dir: Option<String>,
    pub(crate) static_assets: BTreeMap<String, Vec<u8>>,
    pub(crate) routes: Vec<Route<V>>,
    pub(crate) use_index_routes: bool,
    _phase: PhantomData<(R, D)>,
}

impl<V> Config<V> {
    /// Start an empty registry publishing into `out_dir`.
    ///
    /// A trailing `/` on `out_dir` is tolerated; the builder trims it.
    pub fn new(out_dir: impl Into<String>) -> Self {
        Config {
            out_dir: out_dir.into(),
            static_dir: None,
            static_assets: BTreeMap::new(),
            routes: Vec::new(),
            use_index_routes: false,
            _phase: PhantomData,
        }
    }
}

impl<V, R, D> Config<V, R, D> {
    // Phase changes move fields, nothing else.
    fn into_phase<R2, D2>(self) -> Config<V, R2, D2> {
        Config {
            out_dir: self.out_dir,
            static_dir: self.static_dir,
            static_assets: self.static_assets,
            routes: self.routes,
            use_index_routes: self.use_index_routes,
            _phase: PhantomData,
        }
    }

    /// Register `content` to be served at `path` (routified on entry).
    ///
    /// Registering the same path twice is allowed; the route registered
    /// first is the one that survives in the published tree.
    pub fn add_static_route(mut self, path: &str, content: V) -> Config<V, HasRoutes, D> {
        let path = route::routify(path);
        self.routes.insert(0, Route::Static { path, content });
        self.into_phase()
    }

    /// Register one page per `(key, value)` pair under a common parent
    /// `path`, rendering each value through `render` immediately.
    ///
    /// At build time each page lands at `<path>/<slug(key)>.html`, in the
    /// order the iterator produced them. A dynamic route on its own does not
    /// unlock `build`; at least one static route is still required.
    pub fn add_dynamic_route<T>(
        mut self,
        path: &str,
        pages: impl IntoIterator<Item = (String, T)>,
        mut render: impl FnMut(T) -> V,
    ) -> Config<V, R, D> {
        let path = route::routify(path);
        let pages = pages
            .into_iter()
            .map(|(key, value)| (key, render(value)))
            .collect();
        self.routes.insert(0, Route::Dynamic { path, pages });
        self
    }

    /// Register raw bytes to be written verbatim at `path` (routified on
    /// entry; the `.html` naming for routes never applies to assets).
    ///
    /// Assets live in a map: a second asset at the same path replaces the
    /// first, and assets overwrite same-named files seeded from the static
    /// dir.
    pub fn add_static_asset(mut self, path: &str, content: impl Into<Vec<u8>>) -> Config<V, R, D> {
        self.static_assets.insert(route::routify(path), content.into());
        self
    }

    /// Switch static-route naming from `<parent>/<name>.html` to
    /// `<path>/index.html`.
    ///
    /// The flag is read once at build time, so it applies to every static
    /// route no matter when it was registered.
    pub fn use_index_routes(mut self) -> Config<V, R, D> {
        self.use_index_routes = true;
        self
    }
}

impl<V, R> Config<V, R, NoStaticDir> {
    /// Seed the build from a directory tree copied verbatim before any
    /// route or asset is written.
    pub fn add_static_dir(self, path: impl Into<String>) -> Config<V, R, HasStaticDir> {
        let mut config = self.into_phase();
        config.static_dir = Some(path.into());
        config
    }
}
