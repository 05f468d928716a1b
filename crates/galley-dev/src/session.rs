//! The dev session loop: watcher → coalescer → recook → client push.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use galley_config::DevConfig;
use galley_kitchen::Kitchen;

use crate::clients::ClientRegistry;
use crate::error::Result;
use crate::event::EventCoalescer;
use crate::hot::HotReloader;
use crate::watcher::{WatchSession, watch};

/// One running dev session over a cooked kitchen.
///
/// Events are processed strictly in the order their cooldown windows
/// expired; one event's recook and notifications finish before the next
/// event is looked at, so clients never see interleaved batches.
pub struct DevSession {
    reloader: HotReloader,
    clients: Arc<ClientRegistry>,
    coalescer: EventCoalescer,
    watch: WatchSession,
    cancel: CancellationToken,
}

impl DevSession {
    /// Starts watching `root` and wires events to the kitchen.
    pub fn start(
        kitchen: Kitchen,
        root: &Path,
        config: &DevConfig,
        clients: Arc<ClientRegistry>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let watch = watch(root, config)?;
        info!(root = %root.display(), "dev session started");
        Ok(Self {
            reloader: HotReloader::new(kitchen),
            clients,
            coalescer: EventCoalescer::new(Duration::from_millis(
                config.cooldown_between_file_events_ms,
            )),
            watch,
            cancel,
        })
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Runs until cancellation or until the watcher channel closes.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let deadline = self.coalescer.next_deadline();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.watch.events.recv() => {
                    match received {
                        Some(event) => self.coalescer.offer(event, Instant::now()),
                        None => break,
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    for event in self.coalescer.poll_expired(Instant::now()) {
                        self.dispatch(&event).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, event: &crate::event::FileEvent) {
        match self.reloader.handle_event(event).await {
            Ok(messages) => {
                for message in &messages {
                    self.clients.broadcast(message);
                }
            }
            // a broken file keeps the rest of the graph serving; the
            // next successful recook clears the state
            Err(err) => warn!(path = %event.path.display(), error = %err, "recook failed"),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
