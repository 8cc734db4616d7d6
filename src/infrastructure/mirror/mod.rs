//! Mirror channel infrastructure
//!
//! - WebSocket client link used by the cache
//! - Observer server used by the CLI and tests

pub mod observer;
pub mod websocket;

pub use observer::{MirrorObserver, ObservedMessage, ObserverError, ObserverSession};
pub use websocket::WebSocketLink;
