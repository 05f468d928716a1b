//! The cooking pipeline: plugins, inline virtualization, compile cache
//! and the build driver.
//!
//! A [`Kitchen`] owns one graph session. Cooking a URL runs it through
//! the plugin registry (resolve → load → transform) and recursively
//! cooks everything it references; the build driver adds the
//! bundle/finalize stages on top and flattens the graph into an output
//! tree. Dev-facing machinery (watcher, hot reload, client push) lives
//! in `galley-dev` and drives this crate through [`Kitchen::recook`].

pub mod build;
pub mod bundle;
pub mod cache;
pub mod context;
pub mod error;
pub mod inline;
pub mod kitchen;
#[cfg(feature = "logging")]
pub mod logging;
pub mod plugin;
pub mod plugins;
pub mod scan;

pub use build::{BuildArtifact, BuildManifest, BuildOptions, build};
pub use bundle::{BundlerAdapterPlugin, ModuleBundler};
pub use cache::{CacheOutcome, CachedArtifact, CompileCache, CompileOutput};
pub use context::{CookContext, SpecifierPatch};
pub use error::{CookError, CookErrorKind, CookResult, KitchenError, Result};
pub use inline::{InlineEntry, InlineRegistry, InlineTag, inline_specifier};
pub use kitchen::{Kitchen, KitchenBuilder};
pub use plugin::{
    AppliesDuring, BundledChunk, Loaded, Plugin, PluginRegistry, SharedPlugin, Transformed,
    TypeFilter,
};
