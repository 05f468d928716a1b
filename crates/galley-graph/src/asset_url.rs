//! Canonical asset URLs.
//!
//! Every graph node is keyed by an [`AssetUrl`]: an absolute URL with the
//! fragment stripped and the path normalized. The query string is kept,
//! it is a meaningful pipeline input (`?raw`, `?inline`, ...).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("invalid url {url:?}: {source}")]
    Parse {
        url: String,
        source: url::ParseError,
    },

    #[error("cannot resolve {specifier:?} against {base}: {source}")]
    Resolve {
        specifier: String,
        base: String,
        source: url::ParseError,
    },

    #[error("url has no usable path: {0}")]
    NoPath(String),

    #[error("not a local file url: {0}")]
    NotFileUrl(String),
}

/// A canonical, absolute URL identifying one graph node.
///
/// Cheap to clone (`Arc<str>` inside). Equality and hashing are on the
/// normalized string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUrl(Arc<str>);

impl AssetUrl {
    /// Parses an absolute URL, normalizing it to its canonical form.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let mut parsed = url::Url::parse(input).map_err(|source| UrlError::Parse {
            url: input.to_string(),
            source,
        })?;
        parsed.set_fragment(None);
        Ok(Self(Arc::from(parsed.as_str())))
    }

    /// Resolves a specifier against a base URL, WHATWG join semantics.
    ///
    /// Handles `./x`, `../x`, root-relative `/x` and absolute specifiers.
    pub fn resolve(base: &AssetUrl, specifier: &str) -> Result<Self, UrlError> {
        let base_url = url::Url::parse(base.as_str()).map_err(|source| UrlError::Parse {
            url: base.to_string(),
            source,
        })?;
        let mut joined = base_url
            .join(specifier)
            .map_err(|source| UrlError::Resolve {
                specifier: specifier.to_string(),
                base: base.to_string(),
                source,
            })?;
        joined.set_fragment(None);
        Ok(Self(Arc::from(joined.as_str())))
    }

    /// Builds a `file:` URL from a filesystem path.
    pub fn from_file_path(path: impl AsRef<Path>) -> Result<Self, UrlError> {
        let path = path.as_ref();
        let parsed = url::Url::from_file_path(path)
            .map_err(|()| UrlError::NoPath(path.display().to_string()))?;
        Ok(Self(Arc::from(parsed.as_str())))
    }

    /// Builds a directory `file:` URL (trailing slash, joins keep it as base).
    pub fn from_dir_path(path: impl AsRef<Path>) -> Result<Self, UrlError> {
        let path = path.as_ref();
        let parsed = url::Url::from_directory_path(path)
            .map_err(|()| UrlError::NoPath(path.display().to_string()))?;
        Ok(Self(Arc::from(parsed.as_str())))
    }

    /// The filesystem path of a `file:` URL.
    pub fn to_file_path(&self) -> Result<PathBuf, UrlError> {
        let parsed = url::Url::parse(self.as_str()).map_err(|source| UrlError::Parse {
            url: self.to_string(),
            source,
        })?;
        if parsed.scheme() != "file" {
            return Err(UrlError::NotFileUrl(self.to_string()));
        }
        parsed
            .to_file_path()
            .map_err(|()| UrlError::NotFileUrl(self.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        let s = self.as_str();
        &s[..s.find(':').unwrap_or(0)]
    }

    /// Last path segment, without query string.
    pub fn filename(&self) -> &str {
        let s = self.path_part();
        s.rsplit('/').next().unwrap_or("")
    }

    /// Extension of the last path segment (no leading dot).
    pub fn extension(&self) -> Option<&str> {
        let name = self.filename();
        match name.rfind('.') {
            Some(idx) if idx > 0 => Some(&name[idx + 1..]),
            _ => None,
        }
    }

    /// Replaces the last path segment, dropping the query string.
    ///
    /// Used to derive synthetic sibling URLs such as `main.html@0.css`.
    pub fn sibling(&self, filename: &str) -> Result<Self, UrlError> {
        let path = self.path_part();
        let dir_end = path.rfind('/').map(|idx| idx + 1).unwrap_or(path.len());
        let mut out = String::with_capacity(dir_end + filename.len());
        out.push_str(&path[..dir_end]);
        out.push_str(filename);
        Self::parse(&out)
    }

    /// The URL without its query string.
    fn path_part(&self) -> &str {
        let s = self.as_str();
        match s.find('?') {
            Some(idx) => &s[..idx],
            None => s,
        }
    }

    /// The query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let s = self.as_str();
        s.find('?').map(|idx| &s[idx + 1..])
    }
}

impl std::fmt::Display for AssetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for AssetUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for AssetUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AssetUrl::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_fragment_keeps_query() {
        let url = AssetUrl::parse("file:///src/app.js?raw#section").unwrap();
        assert_eq!(url.as_str(), "file:///src/app.js?raw");
        assert_eq!(url.query(), Some("raw"));
    }

    #[test]
    fn test_parse_normalizes_dot_segments() {
        let url = AssetUrl::parse("file:///src/pages/../app.js").unwrap();
        assert_eq!(url.as_str(), "file:///src/app.js");
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(AssetUrl::parse("./app.js").is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let base = AssetUrl::parse("file:///src/pages/index.html").unwrap();
        let url = AssetUrl::resolve(&base, "../shared/app.js").unwrap();
        assert_eq!(url.as_str(), "file:///src/shared/app.js");
    }

    #[test]
    fn test_resolve_root_relative() {
        let base = AssetUrl::parse("file:///src/pages/index.html").unwrap();
        let url = AssetUrl::resolve(&base, "/favicon.ico").unwrap();
        assert_eq!(url.as_str(), "file:///favicon.ico");
    }

    #[test]
    fn test_resolve_absolute_specifier_wins() {
        let base = AssetUrl::parse("file:///src/index.html").unwrap();
        let url = AssetUrl::resolve(&base, "https://cdn.example.com/lib.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/lib.js");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let base = AssetUrl::parse("file:///src/index.html").unwrap();
        let first = AssetUrl::resolve(&base, "./main.css").unwrap();
        let second = AssetUrl::resolve(&base, "./main.css").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filename_and_extension() {
        let url = AssetUrl::parse("file:///src/main.html?v=2").unwrap();
        assert_eq!(url.filename(), "main.html");
        assert_eq!(url.extension(), Some("html"));

        let none = AssetUrl::parse("file:///src/").unwrap();
        assert_eq!(none.filename(), "");
        assert_eq!(none.extension(), None);
    }

    #[test]
    fn test_sibling() {
        let url = AssetUrl::parse("file:///src/main.html").unwrap();
        let inline = url.sibling("main.html@0.css").unwrap();
        assert_eq!(inline.as_str(), "file:///src/main.html@0.css");
    }

    #[test]
    fn test_file_path_round_trip() {
        let url = AssetUrl::from_file_path("/tmp/project/app.js").unwrap();
        assert_eq!(url.as_str(), "file:///tmp/project/app.js");
        assert_eq!(
            url.to_file_path().unwrap(),
            PathBuf::from("/tmp/project/app.js")
        );
    }

    #[test]
    fn test_dir_path_joins_as_base() {
        let root = AssetUrl::from_dir_path("/tmp/project").unwrap();
        let child = AssetUrl::resolve(&root, "src/app.js").unwrap();
        assert_eq!(child.as_str(), "file:///tmp/project/src/app.js");
    }

    #[test]
    fn test_serde_round_trip() {
        let url = AssetUrl::parse("file:///src/app.js").unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"file:///src/app.js\"");
        let back: AssetUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, url);
    }
}
