//! Domain layer for the render cache
//!
//! Deferred values, the mirror wire protocol, configuration models and the
//! connection port.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CacheError, CacheResult};
pub use ports::{ConnectionState, MirrorLink};
