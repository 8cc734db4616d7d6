//! WebSocket implementation of [`MirrorLink`].
//!
//! One connection task owns the socket: it performs the handshake, writes
//! queued frames and forwards inbound text frames to the cache. There is no
//! reconnection; once the socket closes the link stays `Closed`.

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{ConnectionState, MirrorLink};
use crate::services::task_scope::TaskScope;

#[derive(Debug)]
enum Frame {
    Text(String),
    Close,
}

/// Client side of the mirror channel.
#[derive(Debug)]
pub struct WebSocketLink {
    state: watch::Receiver<ConnectionState>,
    outgoing: mpsc::UnboundedSender<Frame>,
}

impl WebSocketLink {
    /// Start connecting to `endpoint` in `scope`.
    ///
    /// Returns immediately with the link in `Connecting`, together with the
    /// stream of inbound text frames.
    pub fn connect(
        endpoint: &str,
        scope: &TaskScope,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        scope.spawn(run_connection(endpoint.to_string(), state_tx, out_rx, in_tx));

        (
            Self {
                state: state_rx,
                outgoing: out_tx,
            },
            in_rx,
        )
    }
}

impl MirrorLink for WebSocketLink {
    fn state(&self) -> ConnectionState {
        // The writer is gone once the connection task ends or is cancelled.
        if self.outgoing.is_closed() {
            return ConnectionState::Closed;
        }
        *self.state.borrow()
    }

    fn send_text(&self, text: String) -> CacheResult<()> {
        self.outgoing
            .send(Frame::Text(text))
            .map_err(|_| CacheError::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.outgoing.send(Frame::Close);
    }
}

async fn run_connection(
    endpoint: String,
    state: watch::Sender<ConnectionState>,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<String>,
) {
    let stream = match connect_async(endpoint.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            warn!(endpoint = %endpoint, error = %err, "Could not connect to mirror observer");
            state.send_replace(ConnectionState::Closed);
            return;
        }
    };

    info!(endpoint = %endpoint, "Connected to mirror observer");
    state.send_replace(ConnectionState::Open);

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(Frame::Text(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        warn!(error = %err, "Mirror send failed");
                        break;
                    }
                }
                Some(Frame::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    debug!("Mirror connection closed locally");
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(bytes = text.len(), "Incoming mirror message");
                    if inbound.send(text).is_err() {
                        debug!("Inbound mirror consumer gone");
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Mirror observer closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "Mirror connection failed");
                    break;
                }
            },
        }
    }

    state.send_replace(ConnectionState::Closed);
    outgoing.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_endpoint_ends_closed() {
        let scope = TaskScope::current();
        // Port 9 on loopback is not expected to host a WebSocket server.
        let (link, _inbound) = WebSocketLink::connect("ws://127.0.0.1:9", &scope);

        let mut closed = false;
        for _ in 0..100 {
            if link.state() == ConnectionState::Closed {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(closed);
        assert_eq!(
            link.send_text("late".to_string()),
            Err(CacheError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn test_invalid_endpoint_ends_closed() {
        let scope = TaskScope::current();
        let (link, _inbound) = WebSocketLink::connect("not a url", &scope);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(link.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_starts_connecting() {
        let scope = TaskScope::current();
        let (link, _inbound) = WebSocketLink::connect("ws://127.0.0.1:9", &scope);
        assert_eq!(link.state(), ConnectionState::Connecting);
        scope.shutdown();
    }
}
