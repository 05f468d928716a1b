//! HTML reference scanning and inline virtualization.

use std::borrow::Cow;

use async_trait::async_trait;

use galley_graph::{
    Asset, AssetContent, AssetType, ContentType, LineIndex, Mention, ReferenceKind,
};

use crate::context::CookContext;
use crate::error::{CookError, CookResult};
use crate::inline::InlineTag;
use crate::plugin::{Plugin, Transformed, TypeFilter};
use crate::scan::{InlineRegion, scan_html};

/// Finds references in HTML documents and virtualizes inline
/// `<style>`/`<script>` bodies into synthetic graph nodes, splicing a
/// `href`/`src` to the synthetic specifier in their place. Ordinals are
/// positional among inlineable siblings, so editing a body keeps its
/// synthetic URL.
#[derive(Debug, Default)]
pub struct HtmlPlugin;

impl HtmlPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for HtmlPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("html")
    }

    fn transform_filter(&self) -> TypeFilter {
        TypeFilter::Types(vec![AssetType::Html])
    }

    async fn transform(&self, asset: &Asset, ctx: &CookContext) -> CookResult<Option<Transformed>> {
        let Some(source) = asset.content.as_text() else {
            return Ok(None);
        };

        let scan = scan_html(source).map_err(|err| {
            let position = LineIndex::new(source).position_of(err.offset);
            CookError::parse_error(asset.url.clone(), err.message, position, source)
        })?;

        for mention in scan.mentions {
            ctx.found(mention).await?;
        }

        if scan.inline_regions.is_empty() {
            return Ok(None);
        }

        // splice back-to-front so earlier spans stay valid
        let mut output = source.to_string();
        let mut regions: Vec<(u32, &InlineRegion)> = scan
            .inline_regions
            .iter()
            .enumerate()
            .map(|(ordinal, region)| (ordinal as u32, region))
            .collect();
        for (ordinal, region) in regions.iter() {
            let (kind, content_type, expected) = match region.tag {
                InlineTag::Style => (ReferenceKind::StyleText, ContentType::Css, AssetType::Css),
                InlineTag::Script { is_module } => (
                    ReferenceKind::ScriptText,
                    ContentType::JavaScript,
                    if is_module {
                        AssetType::JsModule
                    } else {
                        AssetType::JsClassic
                    },
                ),
            };
            let mention = Mention::new(kind, "", region.position)
                .expected_type(expected)
                .inline();
            ctx.found_inline(
                *ordinal,
                mention,
                AssetContent::text(region.content.as_str()),
                content_type,
            )
            .await?;
        }

        regions.sort_by_key(|(_, region)| std::cmp::Reverse(region.element_span.0));
        for (ordinal, region) in regions {
            let entry = ctx
                .inline_entry(ordinal)
                .ok_or_else(|| CookError::plugin("html", "inline entry vanished mid-cook"))?;
            let replacement = match region.tag {
                InlineTag::Style => {
                    format!(r#"<link rel="stylesheet" href="{}">"#, entry.specifier)
                }
                InlineTag::Script { is_module: true } => {
                    format!(r#"<script type="module" src="{}"></script>"#, entry.specifier)
                }
                InlineTag::Script { is_module: false } => {
                    format!(r#"<script src="{}"></script>"#, entry.specifier)
                }
            };
            output.replace_range(region.element_span.0..region.element_span.1, &replacement);
        }

        Ok(Some(Transformed::content(output)))
    }
}
