//! # sitestage
//!
//! A library for building static sites: declare routes against a registry,
//! render documents through pluggable per-dialect renderers, and publish the
//! whole site in one staged, all-or-nothing build.
//!
//! # Architecture: Stage, Then Promote
//!
//! A build never writes into the published site directly. Everything is
//! assembled in a scratch workspace first and promoted only once every route
//! has been written:
//!
//! ```text
//! 1. Seed      static dir  →  <out_dir>.staging   (recursive copy, or empty dir)
//! 2. Overlay   asset map   →  workspace           (declared files win over seeded ones)
//! 3. Routes    registry    →  workspace           (sorted by path, .html naming rules)
//! 4. Promote   workspace   →  out_dir             (delete old site, copy, drop workspace)
//! ```
//!
//! A failure in steps 1–3 aborts before the published site is touched: readers
//! of `out_dir` see either the previous complete site or the new complete
//! site, never a half-written one. The workspace is left behind on failure so
//! the wreckage can be inspected.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | The route registry — a typestate builder collecting routes, assets, and naming policy |
//! | [`build`] | The staged builder — turns a registry into files on disk |
//! | [`route`] | Route values and the path helpers (`slug`, `routify`) everything else leans on |
//! | [`markdown`] | CommonMark + GFM-extras dialect: tree, `Renderer<V>` fold, default HTML renderer |
//! | [`djot`] | djot dialect: built-in minimal reader, same fold-based rendering model |
//! | [`frontmatter`] | TOML frontmatter detection, stripping, and parsing |
//! | [`atom`] | Atom 1.0 feed generation, published through the asset map |
//! | [`fsops`] | The three filesystem primitives the builder is allowed to use |
//!
//! # Design Decisions
//!
//! ## Typestate Registry
//!
//! A registry with no routes has nothing to build, and a registry with two
//! static directories has no well-defined seed. Both are compile errors here,
//! not runtime checks: [`config::Config`] tracks "has at least one route" and
//! "has a static dir" in marker type parameters, so `build` simply does not
//! exist on an empty registry and `add_static_dir` disappears after the first
//! call. Misuse fails at `cargo build`, with no error variant left over to
//! handle at runtime.
//!
//! ## Renderers Are Values, Not Traits
//!
//! Document rendering is a post-order fold driven by a struct of boxed
//! callbacks, one per node kind, generic over the output type `V`. Swapping
//! a callback is plain struct update syntax — take the default HTML renderer,
//! replace `heading`, keep the rest. A trait with two dozen required methods
//! would force an impl block per variation; a struct of closures makes each
//! variation one field assignment, and lets a renderer close over request
//! state (like frontmatter metadata) for free.
//!
//! ## Maud Over Template Engines
//!
//! The default renderers emit HTML through [Maud](https://maud.lambda.xyz/)
//! rather than a runtime template engine: templates are checked at compile
//! time, interpolation is escaped unless explicitly opted out, and there is
//! no template directory to ship alongside the binary. Custom renderers are
//! not tied to this choice — `V` can be any type; only the final build step
//! requires `maud::Render` to serialize page values.
//!
//! ## Render-Time Reference Resolution
//!
//! Reference-style links keep their reference *name* in the parsed tree and
//! resolve against the document's reference table only during the fold. An
//! unresolved name is not an error: it degrades to a same-page anchor pair
//! (`#<slug>` plus an element id of `back-to-<slug>`), so two occurrences of
//! the same dangling reference link to each other. Documents get forward and
//! backward in-page links without any dedicated anchor syntax.

pub mod atom;
pub mod build;
pub mod config;
pub mod djot;
pub mod frontmatter;
pub mod fsops;
pub mod markdown;
pub mod route;

#[cfg(test)]
pub(crate) mod test_helpers;
