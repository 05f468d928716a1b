//! The build driver: cook, bundle, finalize, emit.
//!
//! Dev serves the graph; build flattens it into an output tree. The
//! stages after cooking run on the whole cooked graph at once: per-type
//! bundling through the first claiming plugin, a composing `finalize`
//! pass per node, URL versioning, specifier rewriting and re-inlining of
//! virtualized regions.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use galley_graph::{Asset, AssetContent, AssetType, AssetUrl, ContentType};

use crate::context::CookContext;
use crate::error::{KitchenError, Result};
use crate::inline::InlineTag;
use crate::kitchen::Kitchen;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory the output tree is written to. `None` builds in memory.
    pub out_dir: Option<PathBuf>,
    /// Content-hash suffix on non-entry output names
    /// (`app.js` → `app-3f92c1aa.js`).
    pub versioned_urls: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out_dir: None,
            versioned_urls: true,
        }
    }
}

/// One file of the output tree.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    /// Graph identity the artifact came from.
    pub url: AssetUrl,
    /// Root-relative output path.
    pub output_name: String,
    pub content: AssetContent,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Default)]
pub struct BuildManifest {
    pub entries: Vec<AssetUrl>,
    pub artifacts: Vec<BuildArtifact>,
}

/// Runs a full build over one kitchen session.
pub async fn build<I, S>(kitchen: &Kitchen, entries: I, options: BuildOptions) -> Result<BuildManifest>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let entry_specifiers: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.as_ref().to_string())
        .collect();
    if entry_specifiers.is_empty() {
        return Err(KitchenError::NoEntryPoints);
    }

    let entry_urls = kitchen.cook_entries(&entry_specifiers).await?;
    info!(entries = entry_urls.len(), assets = kitchen.graph().len(), "graph cooked");

    let absorbed = run_bundle_stage(kitchen).await?;
    run_finalize_stage(kitchen).await?;

    let graph = kitchen.graph();
    let root_str = kitchen.root_url().as_str().to_string();

    // Output set: every cooked node that was neither absorbed into a
    // chunk nor re-inlined into its owner.
    let mut output_urls: Vec<AssetUrl> = graph
        .urls()
        .into_iter()
        .filter(|url| {
            let Some(asset) = graph.get(url) else {
                return false;
            };
            asset.is_cooked() && !asset.meta.is_inline && !absorbed.contains_key(url)
        })
        .collect();
    output_urls.sort();

    // Stable output names first; rewriting needs them all up front.
    let mut output_names: HashMap<AssetUrl, String> = HashMap::new();
    for url in &output_urls {
        let asset = graph.get(url).expect("output url present");
        let relative = relative_name(url, &root_str);
        let name = if options.versioned_urls && !asset.meta.is_entry_point {
            versioned_name(&relative, &asset.content_digest)
        } else {
            relative
        };
        graph.update_asset(url, |asset| {
            asset.generated_url = AssetUrl::resolve(kitchen.root_url(), &name).ok();
        });
        output_names.insert(url.clone(), name);
    }

    rewrite_specifiers(kitchen, &output_urls, &output_names, &absorbed);
    reinline_owners(kitchen, &output_urls);

    let mut manifest = BuildManifest {
        entries: entry_urls,
        artifacts: Vec::new(),
    };
    for url in output_urls {
        let asset = graph.get(&url).expect("output url present");
        manifest.artifacts.push(BuildArtifact {
            url,
            output_name: output_names
                .get(&asset.url)
                .cloned()
                .unwrap_or_else(|| relative_name(&asset.url, &root_str)),
            content: asset.content,
            content_type: asset.content_type,
        });
    }

    if let Some(out_dir) = &options.out_dir {
        for artifact in &manifest.artifacts {
            let path = out_dir.join(&artifact.output_name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, artifact.content.as_bytes()).await?;
        }
        info!(
            out_dir = %out_dir.display(),
            artifacts = manifest.artifacts.len(),
            "build written"
        );
    }

    Ok(manifest)
}

/// Groups cooked nodes by type and hands each group to the first plugin
/// whose bundle filter claims it. Returns absorbed-origin → chunk URL.
async fn run_bundle_stage(kitchen: &Kitchen) -> Result<HashMap<AssetUrl, AssetUrl>> {
    let graph = kitchen.graph();
    let mut groups: HashMap<AssetType, Vec<Asset>> = HashMap::new();
    for url in graph.urls() {
        let Some(asset) = graph.get(&url) else { continue };
        if asset.is_cooked() {
            groups.entry(asset.asset_type).or_default().push(asset);
        }
    }

    let ctx = CookContext::new(kitchen.core().clone(), kitchen.root_url().clone());
    let mut absorbed = HashMap::new();
    for (asset_type, mut group) in groups {
        group.sort_by(|a, b| a.url.cmp(&b.url));
        let Some(plugin) = kitchen
            .core()
            .plugins
            .for_scenario(kitchen.scenario())
            .into_iter()
            .find(|plugin| plugin.bundle_filter().matches(asset_type))
        else {
            continue;
        };
        debug!(asset_type = %asset_type, plugin = %plugin.name(), nodes = group.len(), "bundling");
        let chunks = plugin.bundle(&group, &ctx).await?;
        for chunk in chunks {
            graph.ensure_asset(&chunk.url);
            graph.update_asset(&chunk.url, |asset| {
                asset.asset_type = asset_type;
                asset.content_type = chunk.content_type.clone();
                asset.sourcemap = chunk.sourcemap.clone();
                asset.set_content(chunk.content.clone());
            });
            for origin in chunk.included {
                if origin != chunk.url {
                    absorbed.insert(origin, chunk.url.clone());
                }
            }
        }
    }
    Ok(absorbed)
}

/// Per-node composing `finalize` pass over the bundled graph.
async fn run_finalize_stage(kitchen: &Kitchen) -> Result<()> {
    let graph = kitchen.graph();
    let mut urls = graph.urls();
    urls.sort();
    for url in urls {
        let Some(mut working) = graph.get(&url) else { continue };
        if !working.is_cooked() {
            continue;
        }
        let ctx = CookContext::new(kitchen.core().clone(), url.clone());
        let mut touched = false;
        for plugin in kitchen.core().plugins.for_scenario(kitchen.scenario()) {
            let Some(patch) = plugin.finalize(&working, &ctx).await? else {
                continue;
            };
            working.sourcemap = match (&patch.sourcemap, &working.sourcemap) {
                (Some(new_map), Some(previous)) => Some(new_map.compose(previous)?),
                (Some(new_map), None) => Some(new_map.clone()),
                (None, previous) => previous.clone(),
            };
            working.set_content(patch.content);
            touched = true;
        }
        if touched {
            graph.update_asset(&url, |asset| {
                asset.sourcemap = working.sourcemap.clone();
                asset.set_content(working.content.clone());
            });
        }
    }
    Ok(())
}

/// Rewrites written specifiers in text output to the generated names,
/// recording each rewrite on the reference.
fn rewrite_specifiers(
    kitchen: &Kitchen,
    output_urls: &[AssetUrl],
    output_names: &HashMap<AssetUrl, String>,
    absorbed: &HashMap<AssetUrl, AssetUrl>,
) {
    let graph = kitchen.graph();
    for parent in output_urls {
        let Some(asset) = graph.get(parent) else { continue };
        let Some(text) = asset.content.as_text() else { continue };
        let mut content = text.to_string();
        let mut changed = false;

        for reference in graph.active_references(parent) {
            // inline targets are restored physically, not renamed
            if reference.is_inline {
                continue;
            }
            let target = absorbed.get(&reference.url).unwrap_or(&reference.url);
            let Some(name) = output_names.get(target) else {
                continue;
            };
            let generated = substitute_filename(&reference.specifier, name);
            if generated == reference.specifier {
                continue;
            }
            if content.contains(&reference.specifier) {
                content = content.replace(&reference.specifier, &generated);
                changed = true;
            }
            graph.set_generated_specifier(parent, reference.id, &generated);
        }

        if changed {
            graph.update_asset(parent, |asset| {
                asset.set_content(AssetContent::from(content.clone()));
            });
        }
    }
}

/// Restores virtualized inline regions into their owner documents using
/// the final transformed content of each synthetic node.
fn reinline_owners(kitchen: &Kitchen, output_urls: &[AssetUrl]) {
    let graph = kitchen.graph();
    for owner in output_urls {
        let Some(asset) = graph.get(owner) else { continue };
        if asset.asset_type != AssetType::Html {
            continue;
        }
        let entries = kitchen.inline_registry().entries_of(owner);
        if entries.is_empty() {
            continue;
        }
        let Some(text) = asset.content.as_text() else { continue };
        let mut content = text.to_string();

        for entry in entries {
            let Some(inline_asset) = graph.get(&entry.url) else {
                continue;
            };
            let body = inline_asset.content.as_text().unwrap_or_default();
            let (spliced, restored) = match entry.tag {
                InlineTag::Style => (
                    format!(r#"<link rel="stylesheet" href="{}">"#, entry.specifier),
                    format!("<style>{body}</style>"),
                ),
                InlineTag::Script { is_module: true } => (
                    format!(r#"<script type="module" src="{}"></script>"#, entry.specifier),
                    format!(r#"<script type="module">{body}</script>"#),
                ),
                InlineTag::Script { is_module: false } => (
                    format!(r#"<script src="{}"></script>"#, entry.specifier),
                    format!("<script>{body}</script>"),
                ),
            };
            if content.contains(&spliced) {
                content = content.replace(&spliced, &restored);
            }
        }

        graph.update_asset(owner, |asset| {
            asset.set_content(AssetContent::from(content.clone()));
        });
    }
}

/// Root-relative name of a graph URL, query string dropped.
fn relative_name(url: &AssetUrl, root: &str) -> String {
    let s = url.as_str();
    let without_query = s.split('?').next().unwrap_or(s);
    match without_query.strip_prefix(root) {
        Some(rest) => rest.to_string(),
        None => url.filename().to_string(),
    }
}

/// `dir/app.js` + digest → `dir/app-3f92c1aa.js`.
fn versioned_name(relative: &str, digest: &str) -> String {
    let hash = &digest[..digest.len().min(8)];
    match relative.rfind('.') {
        Some(dot) if !relative[dot + 1..].contains('/') => {
            format!("{}-{}{}", &relative[..dot], hash, &relative[dot..])
        }
        _ => format!("{relative}-{hash}"),
    }
}

/// Swaps the filename portion of a written specifier for the output
/// name's filename, keeping the specifier's path shape intact.
fn substitute_filename(specifier: &str, output_name: &str) -> String {
    let new_filename = output_name.rsplit('/').next().unwrap_or(output_name);
    match specifier.rfind('/') {
        Some(slash) => format!("{}/{}", &specifier[..slash], new_filename),
        None => new_filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_name_inserts_before_extension() {
        assert_eq!(
            versioned_name("src/app.js", "3f92c1aabbccdd"),
            "src/app-3f92c1aa.js"
        );
        assert_eq!(versioned_name("LICENSE", "3f92c1aabbccdd"), "LICENSE-3f92c1aa");
    }

    #[test]
    fn test_substitute_filename_keeps_path_shape() {
        assert_eq!(
            substitute_filename("./app.js", "src/app-3f92c1aa.js"),
            "./app-3f92c1aa.js"
        );
        assert_eq!(
            substitute_filename("/src/app.js", "src/app-3f92c1aa.js"),
            "/src/app-3f92c1aa.js"
        );
    }

    #[test]
    fn test_relative_name_strips_root_and_query() {
        let root = "file:///project/";
        let url = AssetUrl::parse("file:///project/src/app.js?raw").unwrap();
        assert_eq!(relative_name(&url, root), "src/app.js");
    }
}
