//! # galley-config
//!
//! Configuration types and file discovery for the galley asset pipeline.
//!
//! A configuration is assembled from three layers, later layers winning:
//! built-in defaults, a `galley.toml` file found by [`ConfigDiscovery`],
//! and `GALLEY_*` environment variables. Library users can also build a
//! [`GalleyConfig`] directly and skip discovery entirely.

pub mod config;
pub mod discovery;
pub mod error;
pub mod scenario;

pub use config::{CacheConfig, DevConfig, GalleyConfig};
pub use discovery::{ConfigDiscovery, discover};
pub use error::{ConfigError, Result};
pub use scenario::Scenario;
