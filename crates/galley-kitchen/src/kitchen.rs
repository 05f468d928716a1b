//! The cook pipeline: resolve, load, transform, recurse.
//!
//! One [`Kitchen`] owns one graph session: the plugin registry, the
//! inline registry and the per-URL cook states all live here, so two
//! kitchens (say, two parallel builds) can never cross-talk.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, join_all};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use galley_config::Scenario;
use galley_graph::{
    Asset, AssetUrl, DependencyDiff, Mention, Position, Reference, ReferenceKind, UrlGraph,
};

use crate::context::CookContext;
use crate::error::{CookError, CookResult};
use crate::inline::InlineRegistry;
use crate::plugin::{Loaded, Plugin, PluginRegistry, SharedPlugin};

/// Cook progress of one URL.
///
/// `InFlight` doubles as the cycle guard: a cook request for a URL that
/// is already in flight returns immediately instead of re-entering or
/// waiting, which is what lets mutually-importing modules terminate.
#[derive(Debug, Clone)]
enum CookState {
    InFlight,
    Done(Result<(), CookError>),
}

pub(crate) struct KitchenCore {
    pub(crate) scenario: Scenario,
    pub(crate) root_url: AssetUrl,
    pub(crate) graph: UrlGraph,
    pub(crate) plugins: PluginRegistry,
    pub(crate) inline: InlineRegistry,
    pub(crate) cancel: CancellationToken,
    states: DashMap<AssetUrl, CookState>,
}

impl KitchenCore {
    /// First-match resolver chain. No plugin claiming the specifier is
    /// fatal for the reference, reported with its trace.
    pub(crate) async fn resolve_mention(
        &self,
        mention: &Mention,
        parent: &AssetUrl,
        ctx: &CookContext,
    ) -> CookResult<AssetUrl> {
        for plugin in self.plugins.for_scenario(self.scenario) {
            if self.cancel.is_cancelled() {
                return Err(CookError::aborted());
            }
            if let Some(url) = plugin.resolve(mention, parent, ctx).await? {
                debug!(
                    specifier = %mention.specifier,
                    url = %url,
                    plugin = %plugin.name(),
                    "resolved"
                );
                return Ok(url);
            }
        }
        Err(CookError::resolution_failed(&mention.specifier)
            .with_trace(format!("{parent}:{}", mention.position)))
    }

    /// Forgets a URL's cook state so the next request cooks it afresh.
    pub(crate) fn invalidate(&self, url: &AssetUrl) {
        self.states.remove(url);
    }

    fn is_cooked(&self, url: &AssetUrl) -> bool {
        matches!(
            self.states.get(url).map(|state| state.clone()),
            Some(CookState::Done(Ok(())))
        )
    }
}

/// Builder for a [`Kitchen`] session.
pub struct KitchenBuilder {
    scenario: Scenario,
    root_url: AssetUrl,
    plugins: PluginRegistry,
    cancel: Option<CancellationToken>,
}

impl KitchenBuilder {
    /// Registers a plugin. Order of registration is the pipeline order.
    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn shared_plugin(mut self, plugin: SharedPlugin) -> Self {
        self.plugins.add_shared(plugin);
        self
    }

    /// Registers the built-in stack: filesystem resolve/load plus the
    /// HTML, CSS and JS reference scanners.
    pub fn with_builtin_plugins(mut self) -> Self {
        for plugin in crate::plugins::builtin_plugins() {
            self.plugins.add_shared(plugin);
        }
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Kitchen {
        Kitchen {
            core: Arc::new(KitchenCore {
                scenario: self.scenario,
                root_url: self.root_url,
                graph: UrlGraph::new(),
                plugins: self.plugins,
                inline: InlineRegistry::new(),
                cancel: self.cancel.unwrap_or_default(),
                states: DashMap::new(),
            }),
        }
    }
}

/// One cooking session over one graph.
#[derive(Clone)]
pub struct Kitchen {
    core: Arc<KitchenCore>,
}

impl Kitchen {
    pub fn builder(scenario: Scenario, root_url: AssetUrl) -> KitchenBuilder {
        KitchenBuilder {
            scenario,
            root_url,
            plugins: PluginRegistry::new(),
            cancel: None,
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.core.scenario
    }

    pub fn root_url(&self) -> &AssetUrl {
        &self.core.root_url
    }

    pub fn graph(&self) -> &UrlGraph {
        &self.core.graph
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.core.cancel.clone()
    }

    pub(crate) fn inline_registry(&self) -> &InlineRegistry {
        &self.core.inline
    }

    pub(crate) fn core(&self) -> &Arc<KitchenCore> {
        &self.core
    }

    /// Resolves and cooks one entry specifier, closing its subgraph.
    pub async fn cook_entry(&self, specifier: &str) -> CookResult<AssetUrl> {
        let mention = Mention::new(ReferenceKind::EntryPoint, specifier, Position::zeroed());
        let root = self.core.root_url.clone();
        let ctx = CookContext::new(self.core.clone(), root.clone());
        let url = self.core.resolve_mention(&mention, &root, &ctx).await?;
        self.core.graph.ensure_asset(&url);
        let reference = self.core.graph.record_reference(&root, url.clone(), &mention);
        self.core.graph.add_entry_point(url.clone());
        self.cook_url(url.clone(), reference).await?;
        Ok(url)
    }

    /// Cooks several entries concurrently; the first failure wins.
    pub async fn cook_entries<I, S>(&self, specifiers: I) -> CookResult<Vec<AssetUrl>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let futures: Vec<_> = specifiers
            .into_iter()
            .map(|specifier| {
                let kitchen = self.clone();
                let specifier = specifier.as_ref().to_string();
                async move { kitchen.cook_entry(&specifier).await }
            })
            .collect();
        join_all(futures).await.into_iter().collect()
    }

    /// Cooks one URL (and, recursively, everything it references).
    pub async fn cook_url(&self, url: AssetUrl, cause: Reference) -> CookResult<DependencyDiff> {
        cook_recursive(self.core.clone(), url, cause).await
    }

    /// Cooks a URL unless a previous cook already succeeded.
    pub async fn ensure_cooked(&self, url: &AssetUrl) -> CookResult<()> {
        if self.core.is_cooked(url) {
            return Ok(());
        }
        let cause = self.cause_for(url);
        self.cook_url(url.clone(), cause).await?;
        Ok(())
    }

    /// Re-cooks a changed URL in place: identity preserved, content and
    /// dependencies replaced. Returns the dependency diff, which the
    /// hot-reload engine turns into cleanup notifications.
    pub async fn recook(&self, url: &AssetUrl) -> CookResult<DependencyDiff> {
        self.core.invalidate(url);
        let cause = self.cause_for(url);
        self.cook_url(url.clone(), cause).await
    }

    /// Best reference to blame when a URL is cooked without one: the
    /// earliest live mention of it, or a synthetic entry reference.
    fn cause_for(&self, url: &AssetUrl) -> Reference {
        self.core.graph.first_reference_to(url).unwrap_or_else(|| Reference {
            id: galley_graph::ReferenceId(0),
            parent_url: self.core.root_url.clone(),
            url: url.clone(),
            specifier: url.to_string(),
            generated_specifier: None,
            kind: ReferenceKind::EntryPoint,
            subtype: None,
            expected_type: None,
            expected_subtype: None,
            position: Position::zeroed(),
            is_inline: false,
            is_original: true,
            hot: None,
            superseded_by: None,
        })
    }
}

fn cook_recursive(
    core: Arc<KitchenCore>,
    url: AssetUrl,
    cause: Reference,
) -> BoxFuture<'static, CookResult<DependencyDiff>> {
    Box::pin(async move {
        if core.cancel.is_cancelled() {
            return Err(CookError::aborted());
        }

        match core.states.entry(url.clone()) {
            dashmap::Entry::Occupied(entry) => {
                return match entry.get() {
                    CookState::InFlight => {
                        debug!(url = %url, "already in flight, not re-entering");
                        Ok(DependencyDiff::default())
                    }
                    CookState::Done(Ok(())) => Ok(DependencyDiff::default()),
                    CookState::Done(Err(err)) => Err(err.clone()),
                };
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(CookState::InFlight);
            }
        }

        let result = cook_one(&core, &url, &cause).await;
        core.states.insert(
            url.clone(),
            CookState::Done(result.as_ref().map(|_| ()).map_err(Clone::clone)),
        );
        result
    })
}

/// The hook chain of one node: load, transform, commit, recurse.
///
/// Content is assembled in a working copy and committed to the graph
/// only after the whole transform chain succeeded, so a failing node is
/// left uncooked rather than half-written.
async fn cook_one(
    core: &Arc<KitchenCore>,
    url: &AssetUrl,
    cause: &Reference,
) -> CookResult<DependencyDiff> {
    let trace = cause.trace();
    let ctx = CookContext::new(core.clone(), url.clone());

    let existing = core.graph.ensure_asset(url);
    let mut working = Asset::new(url.clone());
    working.meta = existing.meta.clone();

    // Inline nodes carry their content from `found_inline`; everything
    // else goes through the first-match load chain.
    if existing.meta.is_inline {
        working.asset_type = existing.asset_type;
        working.subtype = existing.subtype;
        working.content_type = existing.content_type.clone();
        working.set_content(existing.content.clone());
    } else {
        let loaded = load_first_match(core, url, &ctx)
            .await
            .map_err(|err| err.with_url(url.clone()).with_trace(trace.clone()))?;
        working.content_type = loaded.content_type;
        working.asset_type = cause
            .expected_type
            .unwrap_or_else(|| working.content_type.default_asset_type());
        working.subtype = cause.expected_subtype;
        working.set_content(loaded.content);
    }
    debug!(url = %url, asset_type = %working.asset_type, "loaded");

    // Re-scan from a clean slate: stale inline entries and references
    // must not survive the owner's re-cook.
    core.inline.begin(url);
    core.graph.clear_references(url);

    for plugin in core.plugins.for_scenario(core.scenario) {
        if core.cancel.is_cancelled() {
            return Err(CookError::aborted());
        }
        if !plugin.transform_filter().matches(working.asset_type) {
            continue;
        }
        // meta mutations made through the context become visible to the
        // next hook in the chain
        if let Some(asset) = core.graph.get(url) {
            working.meta = asset.meta;
        }
        let outcome = plugin
            .transform(&working, &ctx)
            .await
            .map_err(|err| err.with_url(url.clone()).with_trace(trace.clone()))?;
        if let Some(transformed) = outcome {
            let composed = match (&transformed.sourcemap, &working.sourcemap) {
                (Some(new_map), Some(previous)) => Some(
                    new_map
                        .compose(previous)
                        .map_err(|err| {
                            CookError::plugin(&plugin.name(), err.to_string())
                                .with_url(url.clone())
                                .with_trace(trace.clone())
                        })?,
                ),
                (Some(new_map), None) => Some(new_map.clone()),
                (None, previous) => previous.clone(),
            };
            working.sourcemap = composed;
            working.set_content(transformed.content);
            debug!(url = %url, plugin = %plugin.name(), "transformed");
        }
    }

    core.graph.update_asset(url, |asset| {
        asset.asset_type = working.asset_type;
        asset.subtype = working.subtype;
        asset.content_type = working.content_type.clone();
        asset.sourcemap = working.sourcemap.clone();
        asset.set_content(working.content.clone());
    });

    let discovered = ctx.take_discovered();
    let deps: Vec<AssetUrl> = discovered
        .iter()
        .filter(|reference| reference.url != *url)
        .map(|reference| reference.url.clone())
        .collect();
    let diff = core.graph.update_dependencies(url, deps);
    debug!(
        url = %url,
        added = diff.added.len(),
        removed = diff.removed.len(),
        pruned = diff.pruned.len(),
        "dependencies updated"
    );

    // Sibling dependencies cook concurrently; the node's own chain above
    // was strictly sequential.
    let children: Vec<_> = discovered
        .into_iter()
        .filter(|reference| reference.url != *url)
        .map(|reference| cook_recursive(core.clone(), reference.url.clone(), reference))
        .collect();
    for result in join_all(children).await {
        result?;
    }

    Ok(diff)
}

async fn load_first_match(
    core: &Arc<KitchenCore>,
    url: &AssetUrl,
    ctx: &CookContext,
) -> CookResult<Loaded> {
    for plugin in core.plugins.for_scenario(core.scenario) {
        if core.cancel.is_cancelled() {
            return Err(CookError::aborted());
        }
        if let Some(loaded) = plugin.load(url, ctx).await? {
            return Ok(loaded);
        }
    }
    Err(CookError::load_not_found(url.clone()))
}
