//! File events and the per-file cooldown coalescer.
//!
//! Editors write in bursts: a save can surface as several `updated`
//! notifications, or as `removed` followed by `added`. The coalescer
//! holds each file's latest state for a cooldown window and merges
//! bursts into the one event the pipeline should act on.
//!
//! Pure state machine over injected instants; the async plumbing around
//! it lives in the session loop, which keeps the merge table testable
//! without timers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Added,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    kind: FileEventKind,
    deadline: Instant,
    /// Tie-break for events expiring in the same poll.
    sequence: u64,
}

/// Merges bursts of events per file inside a cooldown window.
#[derive(Debug)]
pub struct EventCoalescer {
    cooldown: Duration,
    pending: HashMap<PathBuf, Pending>,
    next_sequence: u64,
}

impl EventCoalescer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            pending: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Feeds one raw event in. Merge table against the pending state:
    /// `added`+`removed` cancel out, `removed`+`added` becomes `updated`,
    /// anything else keeps the more meaningful kind; every offer
    /// refreshes the window.
    pub fn offer(&mut self, event: FileEvent, now: Instant) {
        let deadline = now + self.cooldown;
        let merged = match self.pending.get(&event.path).map(|pending| pending.kind) {
            None => Some(event.kind),
            Some(FileEventKind::Added) => match event.kind {
                // never existed as far as consumers know
                FileEventKind::Removed => None,
                _ => Some(FileEventKind::Added),
            },
            Some(FileEventKind::Removed) => match event.kind {
                FileEventKind::Added | FileEventKind::Updated => Some(FileEventKind::Updated),
                FileEventKind::Removed => Some(FileEventKind::Removed),
            },
            Some(FileEventKind::Updated) => match event.kind {
                FileEventKind::Removed => Some(FileEventKind::Removed),
                _ => Some(FileEventKind::Updated),
            },
        };

        match merged {
            None => {
                self.pending.remove(&event.path);
            }
            Some(kind) => {
                let sequence = self
                    .pending
                    .get(&event.path)
                    .map(|pending| pending.sequence)
                    .unwrap_or_else(|| {
                        self.next_sequence += 1;
                        self.next_sequence
                    });
                self.pending.insert(
                    event.path,
                    Pending {
                        kind,
                        deadline,
                        sequence,
                    },
                );
            }
        }
    }

    /// Events whose window expired, in the order their windows opened.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<FileEvent> {
        let mut expired: Vec<(u64, FileEvent)> = Vec::new();
        self.pending.retain(|path, pending| {
            if pending.deadline <= now {
                expired.push((
                    pending.sequence,
                    FileEvent::new(path.clone(), pending.kind),
                ));
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|(sequence, _)| *sequence);
        expired.into_iter().map(|(_, event)| event).collect()
    }

    /// Earliest pending deadline, for the session loop's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coalescer() -> EventCoalescer {
        EventCoalescer::new(Duration::from_millis(100))
    }

    #[test]
    fn test_single_event_expires_after_cooldown() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("a.js", FileEventKind::Updated), t0);

        assert!(c.poll_expired(t0 + Duration::from_millis(50)).is_empty());
        let out = c.poll_expired(t0 + Duration::from_millis(100));
        assert_eq!(out, vec![FileEvent::new("a.js", FileEventKind::Updated)]);
        assert!(c.is_idle());
    }

    #[test]
    fn test_added_then_removed_cancel_out() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("tmp.js", FileEventKind::Added), t0);
        c.offer(
            FileEvent::new("tmp.js", FileEventKind::Removed),
            t0 + Duration::from_millis(10),
        );
        assert!(c.poll_expired(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_removed_then_added_becomes_updated() {
        // atomic-save editors do exactly this
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("a.js", FileEventKind::Removed), t0);
        c.offer(
            FileEvent::new("a.js", FileEventKind::Added),
            t0 + Duration::from_millis(10),
        );
        let out = c.poll_expired(t0 + Duration::from_secs(1));
        assert_eq!(out, vec![FileEvent::new("a.js", FileEventKind::Updated)]);
    }

    #[test]
    fn test_repeats_refresh_the_window() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("a.js", FileEventKind::Updated), t0);
        c.offer(
            FileEvent::new("a.js", FileEventKind::Updated),
            t0 + Duration::from_millis(80),
        );
        // the first deadline has passed, but the refresh moved it
        assert!(c.poll_expired(t0 + Duration::from_millis(120)).is_empty());
        assert_eq!(c.poll_expired(t0 + Duration::from_millis(180)).len(), 1);
    }

    #[test]
    fn test_expiry_order_is_window_open_order() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("first.js", FileEventKind::Updated), t0);
        c.offer(
            FileEvent::new("second.js", FileEventKind::Updated),
            t0 + Duration::from_millis(5),
        );
        let out = c.poll_expired(t0 + Duration::from_secs(1));
        assert_eq!(out[0].path, PathBuf::from("first.js"));
        assert_eq!(out[1].path, PathBuf::from("second.js"));
    }

    #[test]
    fn test_added_then_updated_stays_added() {
        let mut c = coalescer();
        let t0 = Instant::now();
        c.offer(FileEvent::new("new.js", FileEventKind::Added), t0);
        c.offer(
            FileEvent::new("new.js", FileEventKind::Updated),
            t0 + Duration::from_millis(10),
        );
        let out = c.poll_expired(t0 + Duration::from_secs(1));
        assert_eq!(out, vec![FileEvent::new("new.js", FileEventKind::Added)]);
    }

    #[test]
    fn test_next_deadline_tracks_earliest() {
        let mut c = coalescer();
        assert!(c.next_deadline().is_none());
        let t0 = Instant::now();
        c.offer(FileEvent::new("a.js", FileEventKind::Updated), t0);
        c.offer(
            FileEvent::new("b.js", FileEventKind::Updated),
            t0 + Duration::from_millis(50),
        );
        assert_eq!(c.next_deadline(), Some(t0 + Duration::from_millis(100)));
    }
}
