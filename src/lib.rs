//! rsc-cache - render result cache with a mirror channel
//!
//! An in-memory cache of deferred render results keyed by an opaque string
//! (typically a serialized location). Concurrent requests for the same key
//! share one in-flight value. Once a value resolves, a snapshot of every
//! resolved entry is published over a WebSocket to an external observer,
//! which can in turn delete entries, clear the cache, or toggle mirroring.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): deferred values, wire protocol, config models, ports
//! - **Service Layer** (`services`): entry store, outbound sync, command handling, the cache
//! - **Infrastructure Layer** (`infrastructure`): config loading, logging, WebSocket link and observer
//! - **CLI Layer** (`cli`): `observe` and `demo` commands
//!
//! # Example
//!
//! ```no_run
//! use rsc_cache::{Cache, DeferredValue, MirrorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: Cache<String> = Cache::connect(&MirrorConfig::default());
//!
//!     let page = cache.get_or_insert_with("/about", || {
//!         DeferredValue::spawn(async { "<About />".to_string() })
//!     });
//!     assert_eq!(page.wait().await, "<About />");
//!
//!     cache.shutdown();
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, DeferredValue, InboundCommand, LoggingConfig, MirrorAction, MirrorConfig,
    OutboundMessage, Resolution, Resolver, Snapshot, SnapshotPayload, DEFAULT_MIRROR_ENDPOINT,
};
pub use domain::{CacheError, CacheResult, ConnectionState, MirrorLink};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::mirror::{MirrorObserver, ObserverSession, WebSocketLink};
pub use services::{Cache, CommandOutcome, DiagnosticsSnapshot};
