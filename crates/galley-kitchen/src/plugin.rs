//! The plugin contract and the ordered registry.
//!
//! Hooks default to a miss (`Ok(None)`), so a plugin implements only the
//! hooks it cares about. `resolve` and `load` iterate plugins first-match
//! in registration order; `transform` and `finalize` run every matching
//! plugin in order. That asymmetry is deliberate: resolution semantics
//! are "first claimant wins", transformation semantics are "everyone
//! composes".

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use galley_config::Scenario;
use galley_graph::{
    Asset, AssetContent, AssetType, AssetUrl, ContentType, Mention, SourceMap,
};

use crate::context::CookContext;
use crate::error::CookResult;

/// Scenario gate on a plugin: every hook of the plugin is skipped when
/// the current scenario does not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliesDuring {
    All,
    Dev,
    Build,
    Set(Vec<Scenario>),
}

impl AppliesDuring {
    pub fn applies(&self, scenario: Scenario) -> bool {
        match self {
            Self::All => true,
            Self::Dev => scenario == Scenario::Dev,
            Self::Build => scenario == Scenario::Build,
            Self::Set(scenarios) => scenarios.contains(&scenario),
        }
    }
}

/// Which node types a `transform`/`bundle` hook claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Hook never runs (the default).
    None,
    /// Hook runs for every node type.
    All,
    Types(Vec<AssetType>),
}

impl TypeFilter {
    pub fn matches(&self, asset_type: AssetType) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Types(types) => types.contains(&asset_type),
        }
    }
}

/// Raw content returned by a `load` hook.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub content: AssetContent,
    pub content_type: ContentType,
}

/// Content rewrite returned by a `transform` or `finalize` hook.
///
/// The sourcemap, when present, maps the returned content back to the
/// content the hook received; the kitchen composes it over whatever maps
/// earlier hooks produced.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub content: AssetContent,
    pub sourcemap: Option<SourceMap>,
}

impl Transformed {
    pub fn content(content: impl Into<AssetContent>) -> Self {
        Self {
            content: content.into(),
            sourcemap: None,
        }
    }

    pub fn with_sourcemap(mut self, sourcemap: SourceMap) -> Self {
        self.sourcemap = Some(sourcemap);
        self
    }
}

/// One output chunk of a `bundle` hook.
#[derive(Debug, Clone)]
pub struct BundledChunk {
    pub url: AssetUrl,
    pub content: AssetContent,
    pub content_type: ContentType,
    pub sourcemap: Option<SourceMap>,
    /// Graph URLs whose content this chunk absorbed.
    pub included: Vec<AssetUrl>,
}

/// A named transform unit in the pipeline.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    fn applies_during(&self) -> AppliesDuring {
        AppliesDuring::All
    }

    /// Turns a specifier into a canonical URL. First non-`None` across
    /// the registry wins. `Ok(None)` means "not mine, try the next one".
    async fn resolve(
        &self,
        _mention: &Mention,
        _parent: &AssetUrl,
        _ctx: &CookContext,
    ) -> CookResult<Option<AssetUrl>> {
        Ok(None)
    }

    /// Produces raw content for a URL. First non-`None` wins. A plugin
    /// that owns the URL but cannot load it returns an error
    /// (`LoadNotFound` / `LoadForbidden`), not a miss.
    async fn load(&self, _url: &AssetUrl, _ctx: &CookContext) -> CookResult<Option<Loaded>> {
        Ok(None)
    }

    fn transform_filter(&self) -> TypeFilter {
        TypeFilter::None
    }

    /// Rewrites node content. Every plugin whose filter matches runs, in
    /// registration order, each seeing the previous one's output.
    /// References found in the content are reported through `ctx`.
    async fn transform(&self, _asset: &Asset, _ctx: &CookContext) -> CookResult<Option<Transformed>> {
        Ok(None)
    }

    fn bundle_filter(&self) -> TypeFilter {
        TypeFilter::None
    }

    /// Build only: absorbs a group of same-typed nodes into output
    /// chunks. The first plugin whose filter claims the type gets the
    /// whole group.
    async fn bundle(&self, _group: &[Asset], _ctx: &CookContext) -> CookResult<Vec<BundledChunk>> {
        Ok(Vec::new())
    }

    /// Build only: per-node pass after bundling, composing like
    /// transform. Runs for every node regardless of type.
    async fn finalize(&self, _asset: &Asset, _ctx: &CookContext) -> CookResult<Option<Transformed>> {
        Ok(None)
    }
}

pub type SharedPlugin = Arc<dyn Plugin>;

/// Plugins in registration order.
///
/// Registration order is the only order: it decides both which plugin
/// wins `resolve`/`load` and in which order transforms compose.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<SharedPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<P: Plugin + 'static>(&mut self, plugin: P) {
        self.plugins.push(Arc::new(plugin));
    }

    pub fn add_shared(&mut self, plugin: SharedPlugin) {
        self.plugins.push(plugin);
    }

    /// Plugins active for a scenario, registration order preserved.
    pub fn for_scenario(&self, scenario: Scenario) -> Vec<SharedPlugin> {
        self.plugins
            .iter()
            .filter(|plugin| plugin.applies_during().applies(scenario))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SharedPlugin> {
        self.plugins.iter().find(|plugin| plugin.name() == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|plugin| plugin.name()))
            .finish()
    }
}
