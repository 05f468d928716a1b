//! The mutable URL graph: asset store, dependency edges, reference table.
//!
//! `UrlGraph` is cheaply clonable (`Arc` inside); the kitchen and the
//! hot-reload engine share one instance. All mutation goes through graph
//! methods so the dependents index can never drift from the dependency
//! sets.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::asset::Asset;
use crate::asset_url::{AssetUrl, UrlError};
use crate::reference::{Mention, Reference, ReferenceId};

/// Result of diffing a node's dependency set against its previous state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDiff {
    pub added: Vec<AssetUrl>,
    pub removed: Vec<AssetUrl>,
    /// Inline nodes deleted because the diff left them with no dependents.
    /// Feeds hot-reload `cleanup` notifications.
    pub pruned: Vec<AssetUrl>,
}

#[derive(Default)]
struct GraphInner {
    assets: FxHashMap<AssetUrl, Asset>,
    // insertion-ordered so re-cooking walks dependencies deterministically
    dependencies: FxHashMap<AssetUrl, IndexSet<AssetUrl>>,
    dependents: FxHashMap<AssetUrl, FxHashSet<AssetUrl>>,
    references: FxHashMap<AssetUrl, Vec<Reference>>,
    entry_points: IndexSet<AssetUrl>,
    next_reference_id: u64,
}

/// Node store keyed by canonical URL.
#[derive(Clone, Default)]
pub struct UrlGraph {
    inner: Arc<RwLock<GraphInner>>,
}

impl UrlGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the asset for a URL, creating an empty one on first use.
    pub fn ensure_asset(&self, url: &AssetUrl) -> Asset {
        let mut inner = self.inner.write();
        inner
            .assets
            .entry(url.clone())
            .or_insert_with(|| Asset::new(url.clone()))
            .clone()
    }

    /// Snapshot of one node, if present.
    pub fn get(&self, url: &AssetUrl) -> Option<Asset> {
        self.inner.read().assets.get(url).cloned()
    }

    pub fn contains(&self, url: &AssetUrl) -> bool {
        self.inner.read().assets.contains_key(url)
    }

    /// Applies a mutation to one node under the graph lock.
    ///
    /// Returns `false` if the URL is unknown (nothing ran).
    pub fn update_asset(&self, url: &AssetUrl, mutate: impl FnOnce(&mut Asset)) -> bool {
        let mut inner = self.inner.write();
        match inner.assets.get_mut(url) {
            Some(asset) => {
                mutate(asset);
                true
            }
            None => false,
        }
    }

    /// WHATWG join of a specifier against a base, fragment stripped.
    pub fn resolve_url(&self, specifier: &str, base: &AssetUrl) -> Result<AssetUrl, UrlError> {
        AssetUrl::resolve(base, specifier)
    }

    pub fn add_entry_point(&self, url: AssetUrl) {
        let mut inner = self.inner.write();
        inner
            .assets
            .entry(url.clone())
            .or_insert_with(|| Asset::new(url.clone()))
            .meta
            .is_entry_point = true;
        inner.entry_points.insert(url);
    }

    pub fn entry_points(&self) -> Vec<AssetUrl> {
        self.inner.read().entry_points.iter().cloned().collect()
    }

    pub fn urls(&self) -> Vec<AssetUrl> {
        self.inner.read().assets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().assets.is_empty()
    }

    pub fn dependencies(&self, url: &AssetUrl) -> Vec<AssetUrl> {
        self.inner
            .read()
            .dependencies
            .get(url)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dependents(&self, url: &AssetUrl) -> Vec<AssetUrl> {
        self.inner
            .read()
            .dependents
            .get(url)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces a node's dependency set, updating the inverse index.
    ///
    /// Symmetric diff against the current set: removed edges decrement
    /// the target's dependents; an inline target left with zero
    /// dependents is deleted (cascading through its own dependencies).
    /// Real files are never pruned here, a session keeps them queryable.
    pub fn update_dependencies(
        &self,
        url: &AssetUrl,
        new_deps: impl IntoIterator<Item = AssetUrl>,
    ) -> DependencyDiff {
        let mut inner = self.inner.write();
        let new_set: IndexSet<AssetUrl> = new_deps.into_iter().collect();
        let old_set = inner.dependencies.get(url).cloned().unwrap_or_default();

        let mut diff = DependencyDiff::default();

        for added in new_set.difference(&old_set) {
            inner
                .assets
                .entry(added.clone())
                .or_insert_with(|| Asset::new(added.clone()));
            inner
                .dependents
                .entry(added.clone())
                .or_default()
                .insert(url.clone());
            diff.added.push(added.clone());
        }

        let mut prune_candidates = Vec::new();
        for removed in old_set.difference(&new_set) {
            if let Some(deps) = inner.dependents.get_mut(removed) {
                deps.remove(url);
                if deps.is_empty() {
                    inner.dependents.remove(removed);
                    prune_candidates.push(removed.clone());
                }
            }
            diff.removed.push(removed.clone());
        }

        if new_set.is_empty() {
            inner.dependencies.remove(url);
        } else {
            inner.dependencies.insert(url.clone(), new_set);
        }

        // Cascade: deleting an inline node may orphan further inline
        // nodes it referenced (nested virtualization).
        while let Some(candidate) = prune_candidates.pop() {
            let is_inline = inner
                .assets
                .get(&candidate)
                .is_some_and(|asset| asset.meta.is_inline);
            let unreferenced = !inner.dependents.contains_key(&candidate);
            if !(is_inline && unreferenced) {
                continue;
            }
            inner.assets.remove(&candidate);
            inner.references.remove(&candidate);
            inner.entry_points.shift_remove(&candidate);
            if let Some(child_deps) = inner.dependencies.remove(&candidate) {
                for child in child_deps {
                    if let Some(deps) = inner.dependents.get_mut(&child) {
                        deps.remove(&candidate);
                        if deps.is_empty() {
                            inner.dependents.remove(&child);
                            prune_candidates.push(child);
                        }
                    }
                }
            }
            diff.pruned.push(candidate);
        }

        diff
    }

    /// Records a resolved mention as a reference, idempotently.
    ///
    /// The same logical mention (parent, specifier, kind, position)
    /// returns the already-recorded reference instead of a new edge.
    pub fn record_reference(
        &self,
        parent_url: &AssetUrl,
        url: AssetUrl,
        mention: &Mention,
    ) -> Reference {
        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .references
            .get(parent_url)
            .and_then(|refs| {
                refs.iter()
                    .find(|r| r.superseded_by.is_none() && r.same_mention(parent_url, mention))
            })
            .cloned()
        {
            return existing;
        }

        inner.next_reference_id += 1;
        let reference = Reference {
            id: ReferenceId(inner.next_reference_id),
            parent_url: parent_url.clone(),
            url,
            specifier: mention.specifier.clone(),
            generated_specifier: None,
            kind: mention.kind,
            subtype: mention.subtype.clone(),
            expected_type: mention.expected_type,
            expected_subtype: mention.expected_subtype,
            position: mention.position,
            is_inline: mention.is_inline,
            is_original: mention.is_original,
            hot: mention.hot,
            superseded_by: None,
        };
        inner
            .references
            .entry(parent_url.clone())
            .or_default()
            .push(reference.clone());
        reference
    }

    /// Marks `old` superseded by `new_id`. The old edge stays recorded
    /// for traces but `active_references` no longer yields it.
    pub fn supersede_reference(&self, parent_url: &AssetUrl, old: ReferenceId, new_id: ReferenceId) {
        let mut inner = self.inner.write();
        if let Some(refs) = inner.references.get_mut(parent_url) {
            if let Some(reference) = refs.iter_mut().find(|r| r.id == old) {
                reference.superseded_by = Some(new_id);
            }
        }
    }

    /// Rewrites the emitted specifier of one reference (finalize pass).
    pub fn set_generated_specifier(
        &self,
        parent_url: &AssetUrl,
        id: ReferenceId,
        generated: impl Into<String>,
    ) {
        let mut inner = self.inner.write();
        if let Some(refs) = inner.references.get_mut(parent_url) {
            if let Some(reference) = refs.iter_mut().find(|r| r.id == id) {
                reference.generated_specifier = Some(generated.into());
            }
        }
    }

    /// Drops all references recorded for a parent. Called before a
    /// re-cook rescans the parent, so stale mentions do not linger.
    pub fn clear_references(&self, parent_url: &AssetUrl) {
        self.inner.write().references.remove(parent_url);
    }

    /// All references recorded while cooking `parent_url`, superseded
    /// ones included.
    pub fn references_of(&self, parent_url: &AssetUrl) -> Vec<Reference> {
        self.inner
            .read()
            .references
            .get(parent_url)
            .cloned()
            .unwrap_or_default()
    }

    /// Live references of a parent (superseded edges filtered out).
    pub fn active_references(&self, parent_url: &AssetUrl) -> Vec<Reference> {
        self.inner
            .read()
            .references
            .get(parent_url)
            .map(|refs| {
                refs.iter()
                    .filter(|r| r.superseded_by.is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live references from `parent_url` to `url`.
    pub fn references_between(&self, parent_url: &AssetUrl, url: &AssetUrl) -> Vec<Reference> {
        self.inner
            .read()
            .references
            .get(parent_url)
            .map(|refs| {
                refs.iter()
                    .filter(|r| r.superseded_by.is_none() && r.url == *url)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First live reference anywhere in the graph pointing at `url`.
    /// Used for error traces and hot-reload typing of the changed node.
    pub fn first_reference_to(&self, url: &AssetUrl) -> Option<Reference> {
        let inner = self.inner.read();
        let mut best: Option<&Reference> = None;
        for refs in inner.references.values() {
            for reference in refs {
                if reference.superseded_by.is_none() && reference.url == *url {
                    match best {
                        Some(current) if current.id <= reference.id => {}
                        _ => best = Some(reference),
                    }
                }
            }
        }
        best.cloned()
    }

    /// Checks the inverse-index invariant. Test-only helper, O(V+E).
    #[doc(hidden)]
    pub fn check_dependents_inverse(&self) -> bool {
        let inner = self.inner.read();
        for (from, deps) in &inner.dependencies {
            for to in deps {
                if !inner
                    .dependents
                    .get(to)
                    .is_some_and(|set| set.contains(from))
                {
                    return false;
                }
            }
        }
        for (to, froms) in &inner.dependents {
            for from in froms {
                if !inner
                    .dependencies
                    .get(from)
                    .is_some_and(|set| set.contains(to))
                {
                    return false;
                }
            }
        }
        true
    }
}

impl std::fmt::Debug for UrlGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("UrlGraph")
            .field("assets", &inner.assets.len())
            .field("entry_points", &inner.entry_points.len())
            .finish()
    }
}
