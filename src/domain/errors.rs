//! Domain errors for the render cache and its mirror channel.

use thiserror::Error;

/// Failures on the cache's mirror path.
///
/// None of these escape `Cache::get` or `Cache::set`; they are logged,
/// counted in the mirror diagnostics and dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A delete named a key that is not cached.
    #[error("Key not found in cache: {0}")]
    KeyNotFound(String),

    /// The link never opened within the retry budget.
    #[error("Exhausted retries sending to mirror after {attempts} attempts")]
    SendExhausted {
        /// Waits made before giving up.
        attempts: u32,
    },

    /// The link is closed.
    #[error("Mirror connection is closed")]
    ConnectionClosed,

    /// An inbound frame is not valid JSON.
    #[error("Malformed mirror message: {0}")]
    MalformedMessage(String),

    /// A snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias for the mirror path.
pub type CacheResult<T> = Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
