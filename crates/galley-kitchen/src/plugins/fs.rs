//! Filesystem resolution and loading.

use std::borrow::Cow;

use async_trait::async_trait;

use galley_graph::{AssetUrl, ContentType, Mention, ReferenceKind};

use crate::context::CookContext;
use crate::error::{CookError, CookResult};
use crate::plugin::{Loaded, Plugin};

/// Resolves path-shaped specifiers and loads `file:` URLs.
///
/// Bare specifiers (`"preact"`) are not claimed; resolving them is node
/// resolution territory and belongs to a dedicated plugin. Without one
/// they fail resolution, which is the correct default for a browser-
/// semantics pipeline.
#[derive(Debug, Default)]
pub struct FileSystemPlugin;

impl FileSystemPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for FileSystemPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("fs")
    }

    async fn resolve(
        &self,
        mention: &Mention,
        parent: &AssetUrl,
        ctx: &CookContext,
    ) -> CookResult<Option<AssetUrl>> {
        let specifier = mention.specifier.as_str();

        // already-absolute URLs pass through parse (which normalizes)
        if specifier.contains("://") || specifier.starts_with("file:") {
            let url = AssetUrl::parse(specifier).map_err(|err| {
                CookError::resolution_failed(specifier).with_trace(err.to_string())
            })?;
            return Ok(Some(url));
        }

        // root-relative specifiers resolve against the project root, not
        // the parent document
        if let Some(rest) = specifier.strip_prefix('/') {
            let url = AssetUrl::resolve(ctx.root_url(), rest)
                .map_err(|err| CookError::resolution_failed(specifier).with_trace(err.to_string()))?;
            return Ok(Some(url));
        }

        if specifier.starts_with("./") || specifier.starts_with("../") {
            let url = AssetUrl::resolve(parent, specifier)
                .map_err(|err| CookError::resolution_failed(specifier).with_trace(err.to_string()))?;
            return Ok(Some(url));
        }

        // HTML and CSS specifiers are document-relative even without a
        // `./` prefix (`src="icon.svg"`). JS import specifiers are not:
        // a bare specifier in a module is not a path.
        if mention.kind != ReferenceKind::JsImportExport
            && specifier.contains('.')
            && !specifier.contains(':')
        {
            let url = AssetUrl::resolve(parent, specifier)
                .map_err(|err| CookError::resolution_failed(specifier).with_trace(err.to_string()))?;
            return Ok(Some(url));
        }

        Ok(None)
    }

    async fn load(&self, url: &AssetUrl, _ctx: &CookContext) -> CookResult<Option<Loaded>> {
        if url.scheme() != "file" {
            return Ok(None);
        }
        let path = url
            .to_file_path()
            .map_err(|err| CookError::load_forbidden(url.clone(), err.to_string()))?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CookError::load_not_found(url.clone()));
            }
            Err(err) => {
                return Err(CookError::load_forbidden(url.clone(), err.to_string()));
            }
        };
        if metadata.is_dir() {
            return Err(CookError::load_forbidden(
                url.clone(),
                format!("{url} is a directory"),
            ));
        }

        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CookError::load_not_found(url.clone())
            } else {
                CookError::load_forbidden(url.clone(), err.to_string())
            }
        })?;

        let content_type = url
            .extension()
            .map(ContentType::from_extension)
            .unwrap_or_default();
        let content = if content_type.is_text() {
            match String::from_utf8(bytes) {
                Ok(text) => text.into(),
                Err(err) => err.into_bytes().into(),
            }
        } else {
            bytes.into()
        };

        Ok(Some(Loaded {
            content,
            content_type,
        }))
    }
}
