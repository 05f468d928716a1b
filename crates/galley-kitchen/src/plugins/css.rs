//! CSS reference scanning.

use std::borrow::Cow;

use async_trait::async_trait;

use galley_graph::{Asset, AssetType};

use crate::context::CookContext;
use crate::error::CookResult;
use crate::plugin::{Plugin, Transformed, TypeFilter};
use crate::scan::scan_css;

/// Reports `url()` and `@import` references of stylesheets. Content is
/// left untouched; dev serves the stylesheet as-is and build rewrites
/// specifiers during finalize.
#[derive(Debug, Default)]
pub struct CssPlugin;

impl CssPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for CssPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("css")
    }

    fn transform_filter(&self) -> TypeFilter {
        TypeFilter::Types(vec![AssetType::Css])
    }

    async fn transform(&self, asset: &Asset, ctx: &CookContext) -> CookResult<Option<Transformed>> {
        let Some(source) = asset.content.as_text() else {
            return Ok(None);
        };
        for mention in scan_css(source) {
            ctx.found(mention).await?;
        }
        Ok(None)
    }
}
