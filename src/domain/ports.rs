//! Ports the cache depends on.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::CacheResult;

/// Lifecycle of the mirror connection.
///
/// Starts at `Connecting` and only moves forward: `Connecting -> Open`,
/// `Connecting -> Closed` or `Open -> Closed`. Nothing ever leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Frames can be sent.
    Open,
    /// Closed for good.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Outbound half of the mirror connection.
///
/// Implementations hand frames to a single writer and must not block.
pub trait MirrorLink: Send + Sync {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Queue one text frame for sending.
    ///
    /// # Returns
    /// * `Ok(())` once the frame is handed to the writer
    /// * `Err(CacheError::ConnectionClosed)` if the writer is gone
    fn send_text(&self, text: String) -> CacheResult<()>;

    /// Close the connection. Later sends fail with `ConnectionClosed`.
    fn close(&self);
}
