//! Domain models: deferred values, wire protocol and configuration.

pub mod config;
pub mod deferred;
pub mod message;

pub use config::{Config, LoggingConfig, MirrorConfig, DEFAULT_MIRROR_ENDPOINT};
pub use deferred::{DeferredValue, Resolution, Resolver};
pub use message::{
    InboundCommand, MirrorAction, OutboundMessage, Snapshot, SnapshotPayload, MESSAGE_ID_PREFIX,
};
