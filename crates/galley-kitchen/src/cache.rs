//! On-disk compile cache with single-flight locking.
//!
//! One artifact is compiled at most once per source digest. Concurrent
//! requests for the same artifact serialize on a per-artifact lock; a
//! request that cannot take the lock within the timeout fails with
//! `CacheLockTimeout` instead of queueing forever behind a wedged
//! compile. Writes go through a temp file and a rename, so readers never
//! observe a half-written artifact.
//!
//! Layout under the cache root:
//!
//! ```text
//! __compile_context__.json     cache-wide version stamp
//! src/app.js                   compiled artifact
//! src/app.js.map               sourcemap sidecar, when one exists
//! src/app.js.__meta__.json     source digest + media type
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use galley_graph::{AssetContent, ContentType, SourceMap};

use crate::error::{CookError, KitchenError, Result};

const CONTEXT_FILE: &str = "__compile_context__.json";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache-wide stamp; a version change invalidates every artifact at once.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct CompileContext {
    version: String,
}

/// Per-artifact metadata sidecar.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactMeta {
    source_digest: String,
    content_type: String,
}

/// How a `reuse_or_create` call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// First compile of this artifact.
    Created,
    /// Source digest changed; recompiled.
    Updated,
    /// Digest matched; served from disk.
    Reused,
}

/// What a compile producer hands the cache for persisting.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub content: AssetContent,
    pub content_type: ContentType,
    pub sourcemap: Option<SourceMap>,
}

/// A cache hit or freshly persisted compile.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub content: AssetContent,
    pub content_type: ContentType,
    pub sourcemap: Option<SourceMap>,
    pub outcome: CacheOutcome,
}

pub struct CompileCache {
    root: PathBuf,
    lock_timeout: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CompileCache {
    /// Opens (or creates) a cache directory for a pipeline version.
    ///
    /// A missing, corrupt or version-mismatched context file wipes the
    /// whole directory: a stale artifact from another pipeline version
    /// must never be served.
    pub async fn open(root: impl AsRef<Path>, version: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let version = version.into();
        let context_path = root.join(CONTEXT_FILE);

        let valid = match tokio::fs::read_to_string(&context_path).await {
            Ok(raw) => serde_json::from_str::<CompileContext>(&raw)
                .map(|context| context.version == version)
                .unwrap_or(false),
            Err(_) => false,
        };
        if !valid {
            if tokio::fs::metadata(&root).await.is_ok() {
                debug!(root = %root.display(), "compile context changed, wiping cache");
                tokio::fs::remove_dir_all(&root).await?;
            }
            tokio::fs::create_dir_all(&root).await?;
            let context = CompileContext { version };
            write_atomic(&context_path, serde_json::to_string_pretty(&context)?.as_bytes()).await?;
        }

        Ok(Self {
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            locks: DashMap::new(),
        })
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact inside the cache.
    pub fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.root.join(artifact)
    }

    /// Serves an artifact from disk when its source digest matches,
    /// compiling and persisting it otherwise. `produce` runs under the
    /// artifact's lock, so concurrent requests compile once.
    pub async fn reuse_or_create<F, Fut>(
        &self,
        artifact: &str,
        source_digest: &str,
        produce: F,
    ) -> Result<CachedArtifact>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<CompileOutput, CookError>>,
    {
        let lock = self
            .locks
            .entry(artifact.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = tokio::time::timeout(self.lock_timeout, lock.lock())
            .await
            .map_err(|_| KitchenError::Cook(CookError::cache_lock_timeout(artifact)))?;

        let path = self.artifact_path(artifact);
        let meta_path = meta_path(&path);
        let map_path = map_path(&path);

        let existing_meta = match tokio::fs::read_to_string(&meta_path).await {
            Ok(raw) => serde_json::from_str::<ArtifactMeta>(&raw).ok(),
            Err(_) => None,
        };

        if let Some(meta) = &existing_meta {
            if meta.source_digest == source_digest {
                if let Ok(bytes) = tokio::fs::read(&path).await {
                    let content_type = ContentType::from_mime(&meta.content_type);
                    let sourcemap = match tokio::fs::read_to_string(&map_path).await {
                        Ok(raw) => SourceMap::from_json_str(&raw).ok(),
                        Err(_) => None,
                    };
                    debug!(artifact, "compile cache hit");
                    return Ok(CachedArtifact {
                        content: content_from_bytes(bytes, &content_type),
                        content_type,
                        sourcemap,
                        outcome: CacheOutcome::Reused,
                    });
                }
            }
        }

        let outcome = if existing_meta.is_some() {
            CacheOutcome::Updated
        } else {
            CacheOutcome::Created
        };
        let output = produce().await.map_err(KitchenError::Cook)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_atomic(&path, output.content.as_bytes()).await?;
        match &output.sourcemap {
            Some(map) => {
                let raw = map
                    .to_json_string()
                    .map_err(KitchenError::SourceMap)?;
                write_atomic(&map_path, raw.as_bytes()).await?;
            }
            None => {
                let _ = tokio::fs::remove_file(&map_path).await;
            }
        }
        let meta = ArtifactMeta {
            source_digest: source_digest.to_string(),
            content_type: output.content_type.as_mime().to_string(),
        };
        write_atomic(&meta_path, serde_json::to_string(&meta)?.as_bytes()).await?;
        debug!(artifact, ?outcome, "compile cache write");

        Ok(CachedArtifact {
            content: output.content,
            content_type: output.content_type,
            sourcemap: output.sourcemap,
            outcome,
        })
    }

    /// Drops one artifact and its sidecars.
    pub async fn evict(&self, artifact: &str) -> Result<()> {
        let path = self.artifact_path(artifact);
        for target in [path.clone(), map_path(&path), meta_path(&path)] {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn meta_path(artifact: &Path) -> PathBuf {
    sibling_with_suffix(artifact, ".__meta__.json")
}

fn map_path(artifact: &Path) -> PathBuf {
    sibling_with_suffix(artifact, ".map")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(suffix);
    path.with_file_name(name)
}

fn content_from_bytes(bytes: Vec<u8>, content_type: &ContentType) -> AssetContent {
    if content_type.is_text() {
        match String::from_utf8(bytes) {
            Ok(text) => AssetContent::from(text),
            Err(err) => AssetContent::from(err.into_bytes()),
        }
    } else {
        AssetContent::from(bytes)
    }
}

/// Temp-file-and-rename write; readers see the old bytes or the new
/// bytes, never a prefix.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = sibling_with_suffix(path, &format!(".tmp-{}", std::process::id()));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
