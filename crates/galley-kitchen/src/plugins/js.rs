//! JS reference scanning and hot-marker detection.

use std::borrow::Cow;

use async_trait::async_trait;

use galley_graph::{Asset, AssetType};

use crate::context::CookContext;
use crate::error::CookResult;
use crate::plugin::{Plugin, Transformed, TypeFilter};
use crate::scan::scan_js;

/// Reports imports, `new URL` references and worker registrations found
/// in scripts, and records `import.meta.hot` markers on the node.
#[derive(Debug, Default)]
pub struct JsPlugin;

impl JsPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for JsPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("js")
    }

    fn transform_filter(&self) -> TypeFilter {
        TypeFilter::Types(vec![AssetType::JsModule, AssetType::JsClassic])
    }

    async fn transform(&self, asset: &Asset, ctx: &CookContext) -> CookResult<Option<Transformed>> {
        let Some(source) = asset.content.as_text() else {
            return Ok(None);
        };
        let scan = scan_js(source, asset.asset_type == AssetType::JsModule);
        for mention in scan.mentions {
            ctx.found(mention).await?;
        }
        if scan.hot_accept_self {
            ctx.mark_hot_accept_self();
        }
        if scan.hot_decline {
            ctx.mark_hot_decline();
        }
        Ok(None)
    }
}
