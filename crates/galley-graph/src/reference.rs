//! References: recorded mentions of one URL from another.

use serde::{Deserialize, Serialize};

use crate::asset_url::AssetUrl;
use crate::content_type::{AssetSubtype, AssetType};
use crate::position::Position;

/// Stable identifier of one reference within a graph session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ReferenceId(pub u64);

/// Where in the parent a specifier was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `import`/`export ... from`, static or dynamic (see subtype).
    JsImportExport,
    /// `<script src>`.
    ScriptSrc,
    /// Inline `<script>` body, virtualized.
    ScriptText,
    /// `<link href>`, rel carried in the subtype.
    LinkHref,
    /// Inline `<style>` body, virtualized.
    StyleText,
    /// `url(...)` inside a stylesheet.
    CssUrl,
    /// `@import` inside a stylesheet.
    CssImport,
    /// `<img src>` and friends.
    ImgSrc,
    /// `new URL(specifier, import.meta.url)`.
    NewUrl,
    /// `navigator.serviceWorker.register(...)` / `new Worker(...)`.
    ServiceWorkerRegistration,
    /// Top-level submission, no parent document.
    EntryPoint,
}

/// Edge-level hot-reload marker, written by transform hooks that detect
/// `import.meta.hot` usage (or equivalent) at the importing site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotPolicy {
    Accept,
    Decline,
}

/// A mention of a URL before resolution: what a scanner found, where.
///
/// Built with the builder-lite pattern; scanners set only the fields
/// they know about.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub specifier: String,
    pub kind: ReferenceKind,
    /// Kind refinement: `static`/`dynamic` for imports, the `rel` value
    /// for links.
    pub subtype: Option<String>,
    /// Overrides content-sniffed node typing (e.g. a worker script tag
    /// forces `js_classic`).
    pub expected_type: Option<AssetType>,
    pub expected_subtype: Option<AssetSubtype>,
    pub position: Position,
    pub is_inline: bool,
    /// Position refers to the original source, not already-transformed
    /// content.
    pub is_original: bool,
    pub hot: Option<HotPolicy>,
}

impl Mention {
    pub fn new(kind: ReferenceKind, specifier: impl Into<String>, position: Position) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            subtype: None,
            expected_type: None,
            expected_subtype: None,
            position,
            is_inline: false,
            is_original: true,
            hot: None,
        }
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn expected_type(mut self, expected: AssetType) -> Self {
        self.expected_type = Some(expected);
        self
    }

    pub fn expected_subtype(mut self, expected: AssetSubtype) -> Self {
        self.expected_subtype = Some(expected);
        self
    }

    pub fn inline(mut self) -> Self {
        self.is_inline = true;
        self
    }

    pub fn transformed_position(mut self) -> Self {
        self.is_original = false;
        self
    }

    pub fn hot(mut self, policy: HotPolicy) -> Self {
        self.hot = Some(policy);
        self
    }
}

/// A resolved mention: one edge of the graph, owned by the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub id: ReferenceId,
    pub parent_url: AssetUrl,
    /// The node this reference resolved to.
    pub url: AssetUrl,
    /// The specifier as written in the parent.
    pub specifier: String,
    /// The specifier as emitted in output, once finalize rewrote it.
    pub generated_specifier: Option<String>,
    pub kind: ReferenceKind,
    pub subtype: Option<String>,
    pub expected_type: Option<AssetType>,
    pub expected_subtype: Option<AssetSubtype>,
    pub position: Position,
    pub is_inline: bool,
    pub is_original: bool,
    pub hot: Option<HotPolicy>,
    /// Set when `update_specifier` replaced this reference; the old edge
    /// stays recorded for traces but no longer counts as a dependency.
    pub superseded_by: Option<ReferenceId>,
}

impl Reference {
    /// Two references describe the same logical mention when parent,
    /// specifier, kind and position all coincide. Used for idempotent
    /// registration.
    pub fn same_mention(&self, parent_url: &AssetUrl, mention: &Mention) -> bool {
        self.parent_url == *parent_url
            && self.specifier == mention.specifier
            && self.kind == mention.kind
            && self.position == mention.position
    }

    /// Trace line for error reports: `parent:line:column`.
    pub fn trace(&self) -> String {
        if self.kind == ReferenceKind::EntryPoint {
            format!("entry point {}", self.specifier)
        } else {
            format!("{}:{}", self.parent_url, self.position)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(specifier: &str, line: u32, column: u32) -> Reference {
        Reference {
            id: ReferenceId(1),
            parent_url: AssetUrl::parse("file:///src/main.html").unwrap(),
            url: AssetUrl::parse("file:///src/app.js").unwrap(),
            specifier: specifier.to_string(),
            generated_specifier: None,
            kind: ReferenceKind::ScriptSrc,
            subtype: None,
            expected_type: None,
            expected_subtype: None,
            position: Position::new(line, column),
            is_inline: false,
            is_original: true,
            hot: None,
            superseded_by: None,
        }
    }

    #[test]
    fn test_same_mention_matches_on_position() {
        let parent = AssetUrl::parse("file:///src/main.html").unwrap();
        let existing = reference("./app.js", 4, 10);

        let same = Mention::new(ReferenceKind::ScriptSrc, "./app.js", Position::new(4, 10));
        assert!(existing.same_mention(&parent, &same));

        let moved = Mention::new(ReferenceKind::ScriptSrc, "./app.js", Position::new(5, 10));
        assert!(!existing.same_mention(&parent, &moved));

        let other_kind = Mention::new(ReferenceKind::LinkHref, "./app.js", Position::new(4, 10));
        assert!(!existing.same_mention(&parent, &other_kind));
    }

    #[test]
    fn test_trace_renders_parent_and_position() {
        let trace = reference("./app.js", 4, 10).trace();
        assert_eq!(trace, "file:///src/main.html:5:11");
    }
}
