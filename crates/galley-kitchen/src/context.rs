//! The accessor surface plugins see while a URL is being cooked.
//!
//! Plugins never touch the graph or the inline registry directly; every
//! mutation funnels through [`CookContext`] so the kitchen keeps the
//! dependency diff and the inverse index coherent.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use galley_config::Scenario;
use galley_graph::{
    AssetContent, AssetType, AssetUrl, ContentType, Mention, Reference, ReferenceId,
    ReferenceKind, UrlGraph,
};

use crate::error::{CookError, CookResult};
use crate::inline::{InlineEntry, InlineTag, inline_specifier};
use crate::kitchen::KitchenCore;

/// Rewrite applied to an existing reference by `update_specifier`.
#[derive(Debug, Clone, Default)]
pub struct SpecifierPatch {
    pub specifier: Option<String>,
    pub expected_type: Option<AssetType>,
}

/// Context of one URL's cook, handed to every hook invocation.
pub struct CookContext {
    core: Arc<KitchenCore>,
    /// The node being cooked; parent of every mention found here.
    url: AssetUrl,
    discovered: Mutex<Vec<Reference>>,
}

impl CookContext {
    pub(crate) fn new(core: Arc<KitchenCore>, url: AssetUrl) -> Self {
        Self {
            core,
            url,
            discovered: Mutex::new(Vec::new()),
        }
    }

    /// URL of the node being cooked.
    pub fn url(&self) -> &AssetUrl {
        &self.url
    }

    pub fn scenario(&self) -> Scenario {
        self.core.scenario
    }

    /// Root directory URL entries resolve against.
    pub fn root_url(&self) -> &AssetUrl {
        &self.core.root_url
    }

    pub fn graph(&self) -> &UrlGraph {
        &self.core.graph
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.core.cancel
    }

    /// Hooks observe cancellation at their own suspension points.
    pub fn check_cancelled(&self) -> CookResult<()> {
        if self.core.cancel.is_cancelled() {
            Err(CookError::aborted())
        } else {
            Ok(())
        }
    }

    /// Registers a mention whose specifier goes through the resolver
    /// chain. Returns the recorded reference and the URL it resolved to;
    /// the URL is scheduled for recursive cooking. Registering the same
    /// logical mention twice is idempotent.
    pub async fn found(&self, mention: Mention) -> CookResult<(Reference, AssetUrl)> {
        self.check_cancelled()?;
        let url = self.core.resolve_mention(&mention, &self.url, self).await?;
        self.core.graph.ensure_asset(&url);
        let reference = self.core.graph.record_reference(&self.url, url.clone(), &mention);
        self.remember(reference.clone());
        Ok((reference, url))
    }

    /// Registers an inline region: content is supplied directly, no
    /// `load` hook runs, and the node is flagged inline. The synthetic
    /// URL is `filename(owner)@ordinal.ext`, stable across edits that
    /// keep the region's position among its inlineable siblings.
    pub async fn found_inline(
        &self,
        ordinal: u32,
        mut mention: Mention,
        content: AssetContent,
        content_type: ContentType,
    ) -> CookResult<(Reference, AssetUrl)> {
        self.check_cancelled()?;
        mention.is_inline = true;

        let specifier = if mention.specifier.is_empty() {
            inline_specifier(&self.url, ordinal, content_type.preferred_extension())
        } else {
            mention.specifier.clone()
        };
        mention.specifier = specifier.clone();

        let url = self
            .url
            .sibling(&specifier)
            .map_err(|err| {
                CookError::plugin("inline", err.to_string()).with_url(self.url.clone())
            })?;

        let asset_type = mention
            .expected_type
            .unwrap_or_else(|| content_type.default_asset_type());
        self.core.graph.ensure_asset(&url);
        let digest_changed = {
            let new_digest = content.digest();
            let old_digest = self
                .core
                .graph
                .get(&url)
                .map(|asset| asset.content_digest)
                .unwrap_or_default();
            new_digest != old_digest
        };
        self.core.graph.update_asset(&url, |asset| {
            asset.meta.is_inline = true;
            asset.asset_type = asset_type;
            asset.subtype = mention.expected_subtype;
            asset.content_type = content_type.clone();
            asset.set_content(content);
        });
        // content changed in place: the node must cook again even if a
        // previous pass already finished it
        if digest_changed {
            self.core.invalidate(&url);
        }

        let tag = match mention.kind {
            ReferenceKind::ScriptText => InlineTag::Script {
                is_module: asset_type == AssetType::JsModule,
            },
            _ => InlineTag::Style,
        };
        self.core.inline.register(
            &self.url,
            InlineEntry {
                url: url.clone(),
                specifier,
                tag,
                ordinal,
            },
        );

        let reference = self.core.graph.record_reference(&self.url, url.clone(), &mention);
        self.remember(reference.clone());
        Ok((reference, url))
    }

    /// Re-types or re-targets an already-registered reference (e.g. a
    /// module import downgraded to a classic script). The old reference
    /// is marked superseded; the new one takes its place in the
    /// dependency set being assembled.
    pub async fn update_specifier(
        &self,
        old: ReferenceId,
        patch: SpecifierPatch,
    ) -> CookResult<(Reference, AssetUrl)> {
        self.check_cancelled()?;
        let old_ref = self
            .core
            .graph
            .references_of(&self.url)
            .into_iter()
            .find(|reference| reference.id == old)
            .ok_or_else(|| {
                CookError::plugin("kitchen", format!("unknown reference {old:?}"))
                    .with_url(self.url.clone())
            })?;

        let mut mention = Mention::new(
            old_ref.kind,
            patch.specifier.unwrap_or_else(|| old_ref.specifier.clone()),
            old_ref.position,
        );
        mention.subtype = old_ref.subtype.clone();
        mention.expected_type = patch.expected_type.or(old_ref.expected_type);
        mention.expected_subtype = old_ref.expected_subtype;
        mention.is_inline = old_ref.is_inline;
        mention.is_original = false;
        mention.hot = old_ref.hot;

        let url = self.core.resolve_mention(&mention, &self.url, self).await?;
        self.core.graph.ensure_asset(&url);
        let reference = self.core.graph.record_reference(&self.url, url.clone(), &mention);
        self.core
            .graph
            .supersede_reference(&self.url, old, reference.id);

        let mut discovered = self.discovered.lock();
        discovered.retain(|r| r.id != old);
        if !discovered.iter().any(|r| r.id == reference.id) {
            discovered.push(reference.clone());
        }
        drop(discovered);
        Ok((reference, url))
    }

    /// The inline entry registered for the cooked node at an ordinal.
    pub fn inline_entry(&self, ordinal: u32) -> Option<InlineEntry> {
        self.core
            .inline
            .entries_of(&self.url)
            .into_iter()
            .find(|entry| entry.ordinal == ordinal)
    }

    /// The cooked node declared it patches itself on hot updates.
    pub fn mark_hot_accept_self(&self) {
        self.core.graph.update_asset(&self.url, |asset| {
            asset.meta.hot_accept_self = true;
        });
    }

    /// The cooked node opted out of hot updates entirely.
    pub fn mark_hot_decline(&self) {
        self.core.graph.update_asset(&self.url, |asset| {
            asset.meta.hot_decline = true;
        });
    }

    /// Plugin-private metadata on the cooked node.
    pub fn set_extra(&self, key: impl Into<String>, value: Value) {
        self.core.graph.update_asset(&self.url, |asset| {
            asset.meta.extras.insert(key.into(), value);
        });
    }

    fn remember(&self, reference: Reference) {
        let mut discovered = self.discovered.lock();
        if !discovered.iter().any(|r| r.id == reference.id) {
            discovered.push(reference);
        }
    }

    /// Drains the references found so far, in discovery order.
    pub(crate) fn take_discovered(&self) -> Vec<Reference> {
        std::mem::take(&mut *self.discovered.lock())
    }
}
