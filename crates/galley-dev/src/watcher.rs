//! Filesystem watching: notify events bridged onto a tokio channel.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use galley_config::DevConfig;

use crate::error::{DevError, Result};
use crate::event::{FileEvent, FileEventKind};

const CHANNEL_CAPACITY: usize = 256;

/// A running watch over one root directory.
///
/// Raw events arrive on `events` uncoalesced; the session loop feeds
/// them through the [`EventCoalescer`](crate::event::EventCoalescer).
/// Dropping the session stops the watcher.
pub struct WatchSession {
    pub events: mpsc::Receiver<FileEvent>,
    // keeps the notify thread alive
    _watcher: RecommendedWatcher,
}

/// Starts watching `root` recursively.
///
/// When `notify_existent` is set, an `added` event is replayed for every
/// file already present under the root, so consumers see the initial
/// state through the same channel as later changes.
pub fn watch(root: &Path, config: &DevConfig) -> Result<WatchSession> {
    if !root.is_dir() {
        return Err(DevError::NotADirectory(root.to_path_buf()));
    }
    let (sender, events) = mpsc::channel(CHANNEL_CAPACITY);
    let ignore = config.watch_ignore.clone();

    let event_sender = sender.clone();
    let event_ignore = ignore.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "watch error");
                return;
            }
        };
        let Some(kind) = map_kind(&event.kind) else {
            return;
        };
        for path in event.paths {
            if should_ignore(&path, &event_ignore) {
                continue;
            }
            // callback runs on the notify thread, blocking send is fine
            if event_sender
                .blocking_send(FileEvent::new(path, kind))
                .is_err()
            {
                return;
            }
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    debug!(root = %root.display(), "watching");

    if config.notify_existent {
        let root = root.to_path_buf();
        std::thread::spawn(move || replay_existent(&root, &ignore, &sender));
    }

    Ok(WatchSession {
        events,
        _watcher: watcher,
    })
}

fn map_kind(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Added),
        EventKind::Modify(_) => Some(FileEventKind::Updated),
        EventKind::Remove(_) => Some(FileEventKind::Removed),
        _ => None,
    }
}

/// Hidden files and configured patterns (substring match on any path
/// component) are invisible to the session.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.starts_with('.') && name.len() > 1 && name != "." && name != ".." {
            return true;
        }
        if patterns.iter().any(|pattern| name.contains(pattern.as_str())) {
            return true;
        }
    }
    false
}

fn replay_existent(root: &Path, ignore: &[String], sender: &mpsc::Sender<FileEvent>) {
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if should_ignore(&path, ignore) {
            continue;
        }
        if sender
            .blocking_send(FileEvent::new(path, FileEventKind::Added))
            .is_err()
        {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ignore_hidden_and_patterns() {
        let patterns = vec!["node_modules".to_string(), ".git".to_string()];
        assert!(should_ignore(Path::new("src/.DS_Store"), &patterns));
        assert!(should_ignore(
            Path::new("node_modules/preact/index.js"),
            &patterns
        ));
        assert!(should_ignore(Path::new("a/.git/HEAD"), &patterns));
        assert!(!should_ignore(Path::new("src/app.js"), &patterns));
        assert!(!should_ignore(Path::new("./src/app.js"), &patterns));
    }

    #[tokio::test]
    async fn test_watch_rejects_non_directories() {
        let err = watch(Path::new("/definitely/not/here"), &DevConfig::default());
        assert!(matches!(err, Err(DevError::NotADirectory(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_notify_existent_replays_initial_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "1").unwrap();
        std::fs::write(dir.path().join("b.css"), "2").unwrap();

        let config = DevConfig {
            notify_existent: true,
            ..DevConfig::default()
        };
        let mut session = watch(dir.path(), &config).unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                session.events.recv(),
            )
            .await
            .expect("replay arrives")
            .expect("channel open");
            assert_eq!(event.kind, FileEventKind::Added);
            seen.push(event.path);
        }
        seen.sort();
        assert!(seen[0].ends_with("a.js"));
        assert!(seen[1].ends_with("b.css"));
    }
}
