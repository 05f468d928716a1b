//! Inline resource virtualization.
//!
//! Inline `<style>`/`<script>` bodies become synthetic graph nodes so
//! they flow through the same resolve/transform/cache machinery as real
//! files. The synthetic URL is derived from the owner and the node's
//! ordinal among inlineable siblings, never from the content: editing
//! the body keeps the URL, which is what makes caches and devtools
//! mappings survive edits.
//!
//! The registry is state of one kitchen instance. Parallel sessions each
//! own theirs; there is no module-global map to cross-talk through.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use galley_graph::AssetUrl;

/// How an inline node is physically written back into its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineTag {
    Style,
    /// `is_module` decides whether the restored tag carries
    /// `type="module"`.
    Script { is_module: bool },
}

/// One virtualized inline region of an owner document.
#[derive(Debug, Clone)]
pub struct InlineEntry {
    /// Synthetic node URL, e.g. `file:///src/main.html@0.css`.
    pub url: AssetUrl,
    /// The specifier spliced into the owner, e.g. `main.html@0.css`.
    pub specifier: String,
    pub tag: InlineTag,
    pub ordinal: u32,
}

/// Per-owner table of live inline entries.
#[derive(Debug, Default)]
pub struct InlineRegistry {
    entries: Mutex<FxHashMap<AssetUrl, Vec<InlineEntry>>>,
}

impl InlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry previously registered for an owner. Called
    /// before the owner is re-scanned so removed inline blocks do not
    /// leave stale synthetic URLs behind. Returns the dropped entries so
    /// the caller can diff them out of the graph.
    pub fn begin(&self, owner: &AssetUrl) -> Vec<InlineEntry> {
        self.entries.lock().remove(owner).unwrap_or_default()
    }

    pub fn register(&self, owner: &AssetUrl, entry: InlineEntry) {
        self.entries
            .lock()
            .entry(owner.clone())
            .or_default()
            .push(entry);
    }

    pub fn entries_of(&self, owner: &AssetUrl) -> Vec<InlineEntry> {
        self.entries
            .lock()
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Looks up the entry an owner registered under a given specifier.
    pub fn find(&self, owner: &AssetUrl, specifier: &str) -> Option<InlineEntry> {
        self.entries
            .lock()
            .get(owner)?
            .iter()
            .find(|entry| entry.specifier == specifier)
            .cloned()
    }
}

/// Synthetic specifier for an owner's inline region:
/// `filename(owner) + "@" + ordinal + "." + extension`.
pub fn inline_specifier(owner: &AssetUrl, ordinal: u32, extension: &str) -> String {
    format!("{}@{}.{}", owner.filename(), ordinal, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> AssetUrl {
        AssetUrl::parse("file:///src/main.html").unwrap()
    }

    fn entry(ordinal: u32) -> InlineEntry {
        let specifier = inline_specifier(&owner(), ordinal, "css");
        InlineEntry {
            url: owner().sibling(&specifier).unwrap(),
            specifier,
            tag: InlineTag::Style,
            ordinal,
        }
    }

    #[test]
    fn test_inline_specifier_shape() {
        assert_eq!(inline_specifier(&owner(), 0, "css"), "main.html@0.css");
        assert_eq!(inline_specifier(&owner(), 2, "js"), "main.html@2.js");
    }

    #[test]
    fn test_specifier_is_position_stable() {
        // same ordinal, any content: same URL
        let a = inline_specifier(&owner(), 0, "css");
        let b = inline_specifier(&owner(), 0, "css");
        assert_eq!(a, b);
    }

    #[test]
    fn test_begin_clears_previous_entries() {
        let registry = InlineRegistry::new();
        registry.register(&owner(), entry(0));
        registry.register(&owner(), entry(1));
        assert_eq!(registry.entries_of(&owner()).len(), 2);

        let dropped = registry.begin(&owner());
        assert_eq!(dropped.len(), 2);
        assert!(registry.entries_of(&owner()).is_empty());
    }

    #[test]
    fn test_find_by_specifier() {
        let registry = InlineRegistry::new();
        registry.register(&owner(), entry(0));
        let found = registry.find(&owner(), "main.html@0.css").unwrap();
        assert_eq!(found.ordinal, 0);
        assert!(registry.find(&owner(), "main.html@9.css").is_none());
    }
}
