//! Observer side of the mirror channel.
//!
//! A small WebSocket server that accepts the cache's connection, decodes the
//! snapshots it publishes and sends control commands back. Used by the
//! `observe` command and by the integration tests.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info};

use crate::domain::models::{InboundCommand, OutboundMessage};

/// Errors raised by the observer.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// The listener could not be bound.
    #[error("Failed to bind observer to {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("Failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The cache's WebSocket handshake failed.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(tungstenite::Error),

    /// Reading or writing a frame failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A text frame was not a snapshot.
    #[error("Invalid message from cache: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// Result alias for the observer.
pub type ObserverResult<T> = Result<T, ObserverError>;

/// Listening observer.
#[derive(Debug)]
pub struct MirrorObserver {
    listener: TcpListener,
}

impl MirrorObserver {
    /// Bind to `addr`, e.g. `127.0.0.1:18998`, or port 0 for an ephemeral port.
    pub async fn bind(addr: &str) -> ObserverResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ObserverError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener })
    }

    /// Address the observer is listening on.
    pub fn local_addr(&self) -> ObserverResult<SocketAddr> {
        self.listener.local_addr().map_err(ObserverError::Accept)
    }

    /// WebSocket URL a cache should connect to.
    pub fn endpoint(&self) -> ObserverResult<String> {
        Ok(format!("ws://{}", self.local_addr()?))
    }

    /// Wait for a cache to connect and complete the handshake.
    pub async fn accept(&self) -> ObserverResult<ObserverSession> {
        let (stream, peer) = self.listener.accept().await.map_err(ObserverError::Accept)?;
        let stream = accept_async(stream).await.map_err(ObserverError::Handshake)?;
        info!(peer = %peer, "Cache connected to observer");
        Ok(ObserverSession { stream, peer })
    }
}

/// A snapshot as received by the observer.
#[derive(Debug, Clone, Serialize)]
pub struct ObservedMessage {
    /// When the frame arrived.
    pub received_at: DateTime<Utc>,
    /// Decoded frame.
    #[serde(flatten)]
    pub message: OutboundMessage,
}

/// One accepted cache connection.
#[derive(Debug)]
pub struct ObserverSession {
    stream: WebSocketStream<TcpStream>,
    peer: SocketAddr,
}

impl ObserverSession {
    /// Address of the connected cache.
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Next snapshot from the cache, or `None` once it disconnects.
    pub async fn next_message(&mut self) -> ObserverResult<Option<ObservedMessage>> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => {
                    let message: OutboundMessage = serde_json::from_str(&text)?;
                    debug!(id = %message.id, entries = message.payload.full_cache.len(), "Snapshot received");
                    return Ok(Some(ObservedMessage {
                        received_at: Utc::now(),
                        message,
                    }));
                }
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Send a control command to the cache.
    pub async fn send_command(&mut self, command: &InboundCommand) -> ObserverResult<()> {
        let text = command.to_json()?;
        self.send_raw(text).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: impl Into<String>) -> ObserverResult<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Close the connection; the cache's link moves to `Closed`.
    pub async fn close(mut self) -> ObserverResult<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
