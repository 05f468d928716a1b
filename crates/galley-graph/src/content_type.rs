//! Media types and the graph-level asset type derived from them.

use serde::{Deserialize, Serialize};

/// Graph-level node type driving transform dispatch and hot-reload policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Html,
    Css,
    JsModule,
    JsClassic,
    Json,
    Importmap,
    Webmanifest,
    Text,
    Image,
    Font,
    Wasm,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Html => "html",
            AssetType::Css => "css",
            AssetType::JsModule => "js_module",
            AssetType::JsClassic => "js_classic",
            AssetType::Json => "json",
            AssetType::Importmap => "importmap",
            AssetType::Webmanifest => "webmanifest",
            AssetType::Text => "text",
            AssetType::Image => "image",
            AssetType::Font => "font",
            AssetType::Wasm => "wasm",
            AssetType::Other => "other",
        }
    }

    pub fn is_js(&self) -> bool {
        matches!(self, AssetType::JsModule | AssetType::JsClassic)
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution-context subtype of a node, `worker`-family scripts mostly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSubtype {
    Worker,
    ServiceWorker,
    SharedWorker,
}

/// A media type. Well-known types are interned; anything else is carried
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Html,
    Css,
    JavaScript,
    Json,
    ImportmapJson,
    WebManifest,
    Svg,
    Png,
    Jpeg,
    Gif,
    Webp,
    Ico,
    Woff2,
    Woff,
    Ttf,
    Otf,
    Wasm,
    PlainText,
    OctetStream,
    Other(String),
}

impl ContentType {
    /// Derives the media type from a file extension string.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Self::JavaScript,
            "json" => Self::Json,
            "importmap" => Self::ImportmapJson,
            "webmanifest" => Self::WebManifest,
            "svg" => Self::Svg,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "ico" => Self::Ico,
            "woff2" => Self::Woff2,
            "woff" => Self::Woff,
            "ttf" => Self::Ttf,
            "otf" => Self::Otf,
            "wasm" => Self::Wasm,
            "txt" | "md" => Self::PlainText,
            _ => Self::OctetStream,
        }
    }

    /// Parses a MIME string, parameters stripped.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence {
            "text/html" => Self::Html,
            "text/css" => Self::Css,
            "text/javascript" | "application/javascript" => Self::JavaScript,
            "application/json" => Self::Json,
            "application/importmap+json" => Self::ImportmapJson,
            "application/manifest+json" => Self::WebManifest,
            "image/svg+xml" => Self::Svg,
            "image/png" => Self::Png,
            "image/jpeg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            "image/x-icon" => Self::Ico,
            "font/woff2" => Self::Woff2,
            "font/woff" => Self::Woff,
            "font/ttf" => Self::Ttf,
            "font/otf" => Self::Otf,
            "application/wasm" => Self::Wasm,
            "text/plain" => Self::PlainText,
            "application/octet-stream" => Self::OctetStream,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_mime(&self) -> &str {
        match self {
            Self::Html => "text/html",
            Self::Css => "text/css",
            Self::JavaScript => "text/javascript",
            Self::Json => "application/json",
            Self::ImportmapJson => "application/importmap+json",
            Self::WebManifest => "application/manifest+json",
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Ico => "image/x-icon",
            Self::Woff2 => "font/woff2",
            Self::Woff => "font/woff",
            Self::Ttf => "font/ttf",
            Self::Otf => "font/otf",
            Self::Wasm => "application/wasm",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
            Self::Other(inner) => inner,
        }
    }

    /// Whether content of this type is handled as UTF-8 text.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::Html
                | Self::Css
                | Self::JavaScript
                | Self::Json
                | Self::ImportmapJson
                | Self::WebManifest
                | Self::Svg
                | Self::PlainText
        ) || matches!(self, Self::Other(inner) if inner.starts_with("text/"))
    }

    /// The node type content of this media type gets, absent an explicit
    /// expectation on the reference. Scripts default to modules; a
    /// `js_classic` expectation comes from the reference that mentioned
    /// the URL (script tags without `type="module"`, workers, ...).
    pub fn default_asset_type(&self) -> AssetType {
        match self {
            Self::Html => AssetType::Html,
            Self::Css => AssetType::Css,
            Self::JavaScript => AssetType::JsModule,
            Self::Json => AssetType::Json,
            Self::ImportmapJson => AssetType::Importmap,
            Self::WebManifest => AssetType::Webmanifest,
            Self::Svg | Self::Png | Self::Jpeg | Self::Gif | Self::Webp | Self::Ico => {
                AssetType::Image
            }
            Self::Woff2 | Self::Woff | Self::Ttf | Self::Otf => AssetType::Font,
            Self::Wasm => AssetType::Wasm,
            Self::PlainText => AssetType::Text,
            Self::OctetStream => AssetType::Other,
            Self::Other(inner) => {
                if inner.starts_with("text/") {
                    AssetType::Text
                } else if inner.starts_with("image/") {
                    AssetType::Image
                } else if inner.starts_with("font/") {
                    AssetType::Font
                } else {
                    AssetType::Other
                }
            }
        }
    }

    /// Extension used when materializing a synthetic URL of this type.
    pub fn preferred_extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::JavaScript => "js",
            Self::Json => "json",
            Self::ImportmapJson => "importmap",
            Self::WebManifest => "webmanifest",
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Ico => "ico",
            Self::Woff2 => "woff2",
            Self::Woff => "woff",
            Self::Ttf => "ttf",
            Self::Otf => "otf",
            Self::Wasm => "wasm",
            _ => "txt",
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::OctetStream
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}
