//! # galley-graph
//!
//! Pure data structures for the galley asset graph.
//!
//! This crate holds the node and edge model (`Asset`, `Reference`) and the
//! mutable [`UrlGraph`] the pipeline cooks into. No I/O, no async: the
//! kitchen (`galley-kitchen`) drives all mutation, the dev engine
//! (`galley-dev`) walks the result.
//!
//! ## Overview
//!
//! - [`AssetUrl`] — canonical absolute URL keying every node (fragment
//!   stripped, query kept, paths normalized).
//! - [`Asset`] — one node: content, content type, sourcemap, metadata.
//! - [`Reference`] / [`Mention`] — one recorded mention of a URL from
//!   another, with source position and hot-reload markers.
//! - [`UrlGraph`] — the store: create-on-demand nodes, dependency diffing
//!   with an always-consistent inverse index, idempotent reference
//!   registration, inline-node pruning.
//! - [`SourceMap`] — source map v3 with mappings codec and transitive
//!   composition for multi-plugin transform chains.
//!
//! ## Thread safety
//!
//! `UrlGraph` is `Arc`-based and internally locked; clones share state.
//! Assets returned from queries are snapshots, cheap to clone because
//! heavy fields are `Arc`-backed.

pub mod asset;
pub mod asset_url;
pub mod content_type;
pub mod graph;
pub mod position;
pub mod reference;
pub mod sourcemap;

pub use asset::{Asset, AssetContent, AssetMeta};
pub use asset_url::{AssetUrl, UrlError};
pub use content_type::{AssetSubtype, AssetType, ContentType};
pub use graph::{DependencyDiff, UrlGraph};
pub use position::{LineIndex, Position};
pub use reference::{HotPolicy, Mention, Reference, ReferenceId, ReferenceKind};
pub use sourcemap::{SourceMap, SourceMapError, decode_mappings, encode_mappings};

/// Error type for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL parsing or resolution failed.
    #[error(transparent)]
    Url(#[from] UrlError),

    /// Source map decode/encode/compose failed.
    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    /// Operation referred to a URL the graph has never seen.
    #[error("unknown url: {0}")]
    UnknownUrl(AssetUrl),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
