//! Connected-client registry for push messages.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::HotMessage;

const CLIENT_BUFFER: usize = 64;

/// Registered push clients, each behind its own buffered sender.
///
/// Broadcast is fire-and-forget: a client whose buffer is full or whose
/// receiver is gone is dropped on the spot, it never blocks the session
/// loop or the other clients.
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: usize,
    senders: HashMap<usize, mpsc::Sender<HotMessage>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client; the returned receiver yields its messages.
    pub fn register(&self) -> (usize, mpsc::Receiver<HotMessage>) {
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.senders.insert(id, sender);
        debug!(client = id, "client registered");
        (id, receiver)
    }

    pub fn unregister(&self, id: usize) {
        self.inner.lock().senders.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().senders.is_empty()
    }

    /// Sends a message to every client, dropping the ones that fail.
    pub fn broadcast(&self, message: &HotMessage) {
        let mut inner = self.inner.lock();
        inner.senders.retain(|id, sender| {
            match sender.try_send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(client = id, "client dropped");
                    false
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_graph::AssetUrl;

    fn cleanup(path: &str) -> HotMessage {
        HotMessage::Cleanup {
            url: AssetUrl::parse(path).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        registry.broadcast(&cleanup("file:///gone.css"));
        assert_eq!(rx_a.recv().await.unwrap(), cleanup("file:///gone.css"));
        assert_eq!(rx_b.recv().await.unwrap(), cleanup("file:///gone.css"));
    }

    #[tokio::test]
    async fn test_dead_client_is_dropped_on_send() {
        let registry = ClientRegistry::new();
        let (_a, rx_a) = registry.register();
        let (_b, _rx_b) = registry.register();
        assert_eq!(registry.len(), 2);

        drop(rx_a);
        registry.broadcast(&cleanup("file:///gone.css"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = ClientRegistry::new();
        let (id, _rx) = registry.register();
        registry.unregister(id);
        assert!(registry.is_empty());
    }
}
