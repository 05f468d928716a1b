//! Dev-scenario machinery: file watching, change coalescing, hot-reload
//! decisions and client push.
//!
//! The pipeline itself lives in `galley-kitchen`; this crate feeds it.
//! A [`DevSession`] watches a source root, coalesces editor write
//! bursts, re-cooks changed nodes through [`Kitchen::recook`] and
//! broadcasts the resulting [`HotMessage`]s to registered clients.
//!
//! [`Kitchen::recook`]: galley_kitchen::Kitchen::recook

pub mod clients;
pub mod error;
pub mod event;
pub mod hot;
pub mod message;
pub mod session;
pub mod watcher;

pub use clients::ClientRegistry;
pub use error::{DevError, Result};
pub use event::{EventCoalescer, FileEvent, FileEventKind};
pub use hot::{HotDecision, HotReloader};
pub use message::HotMessage;
pub use session::DevSession;
pub use watcher::{WatchSession, watch};
