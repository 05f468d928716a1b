//! The bundler adapter: bridging an external module bundler into the
//! pipeline.
//!
//! The pipeline does not bundle; it hands a cooked, same-typed group of
//! nodes to a [`ModuleBundler`] collaborator and reintegrates whatever
//! chunks come back. Which bundler runs is the caller's choice, injected
//! at registration time.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use galley_graph::{Asset, AssetType};

use crate::context::CookContext;
use crate::error::CookResult;
use crate::plugin::{AppliesDuring, BundledChunk, Plugin, TypeFilter};

/// External bundler seam. Implementations receive every cooked node of
/// the claimed type and return output chunks; each chunk names the
/// origin URLs it absorbed so the driver can drop them from the output
/// set.
#[async_trait]
pub trait ModuleBundler: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    async fn bundle(&self, group: &[Asset]) -> CookResult<Vec<BundledChunk>>;
}

/// Plugin wrapper putting a [`ModuleBundler`] behind a `bundle_filter`.
/// Build scenario only.
pub struct BundlerAdapterPlugin {
    bundler: Arc<dyn ModuleBundler>,
    types: Vec<AssetType>,
}

impl BundlerAdapterPlugin {
    /// Adapter claiming JS modules, the common case.
    pub fn new(bundler: Arc<dyn ModuleBundler>) -> Self {
        Self {
            bundler,
            types: vec![AssetType::JsModule],
        }
    }

    pub fn claiming(bundler: Arc<dyn ModuleBundler>, types: Vec<AssetType>) -> Self {
        Self { bundler, types }
    }
}

#[async_trait]
impl Plugin for BundlerAdapterPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("bundler-adapter({})", self.bundler.name()))
    }

    fn applies_during(&self) -> AppliesDuring {
        AppliesDuring::Build
    }

    fn bundle_filter(&self) -> TypeFilter {
        TypeFilter::Types(self.types.clone())
    }

    async fn bundle(&self, group: &[Asset], _ctx: &CookContext) -> CookResult<Vec<BundledChunk>> {
        self.bundler.bundle(group).await
    }
}
