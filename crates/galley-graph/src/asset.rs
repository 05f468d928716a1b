//! Graph nodes: one [`Asset`] per canonical URL.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::asset_url::AssetUrl;
use crate::content_type::{AssetSubtype, AssetType, ContentType};
use crate::sourcemap::SourceMap;

/// Node content, text or binary.
///
/// Both variants are Arc-backed so cloning an asset out of the graph is
/// cheap regardless of content size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetContent {
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl AssetContent {
    pub fn text(content: impl Into<Arc<str>>) -> Self {
        Self::Text(content.into())
    }

    pub fn bytes(content: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(content.into())
    }

    pub fn empty() -> Self {
        Self::Text(Arc::from(""))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Blake3 digest of the raw bytes, hex encoded.
    pub fn digest(&self) -> String {
        blake3::hash(self.as_bytes()).to_hex().to_string()
    }
}

impl Default for AssetContent {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<String> for AssetContent {
    fn from(content: String) -> Self {
        Self::Text(Arc::from(content))
    }
}

impl From<&str> for AssetContent {
    fn from(content: &str) -> Self {
        Self::Text(Arc::from(content))
    }
}

impl From<Vec<u8>> for AssetContent {
    fn from(content: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(content))
    }
}

/// Plugin-visible metadata bag on a node.
///
/// Well-known flags are plain fields; anything plugin-private goes into
/// `extras` under the plugin's own key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMeta {
    /// Node is synthetic, extracted from a container document.
    pub is_inline: bool,
    /// Node was submitted as a top-level entry, not discovered.
    pub is_entry_point: bool,
    /// Module format tag for JS nodes (`esm`, `cjs`, `iife`, ...).
    pub format: Option<String>,
    /// Node declared it can hot-patch itself (`import.meta.hot.accept()`).
    pub hot_accept_self: bool,
    /// Node declared no hot update may touch it; forces full reloads.
    pub hot_decline: bool,
    pub extras: Map<String, Value>,
}

/// One graph node.
///
/// Created empty on first resolution, then filled in by cooking. Identity
/// (the URL) is stable across re-cooks; everything else is replaced in
/// place when the source changes.
#[derive(Debug, Clone)]
pub struct Asset {
    pub url: AssetUrl,
    pub asset_type: AssetType,
    pub subtype: Option<AssetSubtype>,
    pub content_type: ContentType,
    pub content: AssetContent,
    /// Hex blake3 of `content`, refreshed on every content write.
    pub content_digest: String,
    pub sourcemap: Option<SourceMap>,
    pub meta: AssetMeta,
    /// Post-transform identity, used by sourcemap tooling. `None` until
    /// a build assigns output URLs.
    pub generated_url: Option<AssetUrl>,
}

impl Asset {
    /// An empty, uncooked node for a URL.
    pub fn new(url: AssetUrl) -> Self {
        let content = AssetContent::empty();
        let content_digest = content.digest();
        Self {
            url,
            asset_type: AssetType::Other,
            subtype: None,
            content_type: ContentType::default(),
            content,
            content_digest,
            sourcemap: None,
            meta: AssetMeta::default(),
            generated_url: None,
        }
    }

    /// Replaces content, refreshing the digest.
    pub fn set_content(&mut self, content: AssetContent) {
        self.content_digest = content.digest();
        self.content = content;
    }

    pub fn is_cooked(&self) -> bool {
        !self.content.is_empty() || self.asset_type != AssetType::Other
    }
}
