//! Outbound half of the mirror channel.
//!
//! An open link gets the frame immediately. While the link is still
//! connecting, each snapshot is handed to its own task with its own retry
//! budget: it waits with a linear backoff (300ms, 400ms, ... by default) and
//! gives up after `max_retries` waits. A closed link drops the message.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::models::{MirrorAction, MirrorConfig, OutboundMessage, SnapshotPayload};
use crate::domain::ports::{ConnectionState, MirrorLink};
use crate::services::diagnostics::MirrorDiagnostics;
use crate::services::task_scope::TaskScope;

/// Linear retry schedule: `initial + step * n` for the n-th retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearBackoff {
    initial: Duration,
    step: Duration,
    max_retries: u32,
    retries: u32,
}

impl LinearBackoff {
    /// Schedule with `max_retries` delays starting at `initial`.
    pub const fn new(initial: Duration, step: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            step,
            max_retries,
            retries: 0,
        }
    }

    /// Schedule described by `config`.
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(
            config.initial_backoff(),
            config.backoff_step(),
            config.max_retries,
        )
    }

    /// Retries handed out so far.
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Whether every retry has been handed out.
    pub const fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial.saturating_add(self.step.saturating_mul(retry))
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::from_config(&MirrorConfig::default())
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.retries = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.retries);
        self.retries += 1;
        Some(delay)
    }
}

/// Deliver one frame over `link`.
///
/// # Returns
/// * `Ok(retries)` once the frame was handed to an open link
/// * `Err(CacheError::SendExhausted)` if the link stayed connecting for the whole budget
/// * `Err(CacheError::ConnectionClosed)` if the link is closed
pub async fn deliver(
    link: &dyn MirrorLink,
    text: String,
    mut backoff: LinearBackoff,
) -> CacheResult<u32> {
    loop {
        match link.state() {
            ConnectionState::Open => {
                let retries = backoff.retries();
                link.send_text(text)?;
                backoff.reset();
                return Ok(retries);
            }
            ConnectionState::Connecting => match backoff.next_backoff() {
                Some(delay) => {
                    debug!(
                        retry = backoff.retries(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Mirror still connecting, retrying send"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(CacheError::SendExhausted {
                        attempts: backoff.retries(),
                    })
                }
            },
            ConnectionState::Closed if backoff.is_exhausted() => {
                return Err(CacheError::SendExhausted {
                    attempts: backoff.retries(),
                });
            }
            ConnectionState::Closed => return Err(CacheError::ConnectionClosed),
        }
    }
}

/// How a published snapshot was handled.
#[derive(Debug)]
pub enum Delivery {
    /// Sent or dropped on the calling thread.
    Settled(CacheResult<u32>),
    /// Waiting for the link to open in a scoped task; resolves to `None` if
    /// the cache shut down first.
    Retrying(JoinHandle<Option<CacheResult<u32>>>),
}

impl Delivery {
    /// Final outcome, waiting for a retrying task if there is one.
    pub async fn outcome(self) -> Option<CacheResult<u32>> {
        match self {
            Self::Settled(outcome) => Some(outcome),
            Self::Retrying(handle) => handle.await.ok().flatten(),
        }
    }
}

/// Publishes snapshots to the observer, best effort.
///
/// On an open link frames are handed to the writer before `publish`
/// returns, so they leave in call order.
pub struct OutboundSync {
    link: Arc<dyn MirrorLink>,
    backoff: LinearBackoff,
    scope: TaskScope,
    diagnostics: Arc<MirrorDiagnostics>,
}

impl OutboundSync {
    /// Publisher over `link`, retrying in `scope` with `backoff`.
    pub fn new(
        link: Arc<dyn MirrorLink>,
        backoff: LinearBackoff,
        scope: TaskScope,
        diagnostics: Arc<MirrorDiagnostics>,
    ) -> Self {
        Self {
            link,
            backoff,
            scope,
            diagnostics,
        }
    }

    /// Serialize and send `payload` as `rsc-cache-<action>`.
    ///
    /// Never fails: every failure is logged and counted. Only a link that is
    /// still connecting defers the send to a background retry task.
    pub fn publish(&self, action: MirrorAction, payload: SnapshotPayload) -> Delivery {
        let entries = payload.full_cache.len();
        let message = OutboundMessage::new(action, payload);
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(err) => {
                warn!(action = %action, error = %err, "Failed to encode mirror message");
                self.diagnostics.record_encode_failure();
                return Delivery::Settled(Err(err.into()));
            }
        };

        let outcome = match self.link.state() {
            ConnectionState::Open => self.link.send_text(text).map(|()| 0),
            ConnectionState::Closed => Err(CacheError::ConnectionClosed),
            ConnectionState::Connecting => {
                let link = Arc::clone(&self.link);
                let backoff = self.backoff.clone();
                let diagnostics = Arc::clone(&self.diagnostics);
                return Delivery::Retrying(self.scope.spawn(async move {
                    let outcome = deliver(link.as_ref(), text, backoff).await;
                    report(&diagnostics, action, entries, &outcome);
                    outcome
                }));
            }
        };
        report(&self.diagnostics, action, entries, &outcome);
        Delivery::Settled(outcome)
    }
}

fn report(
    diagnostics: &MirrorDiagnostics,
    action: MirrorAction,
    entries: usize,
    outcome: &CacheResult<u32>,
) {
    diagnostics.record_delivery(outcome);
    match outcome {
        Ok(retries) => {
            debug!(action = %action, entries, retries, "Sent cache snapshot to mirror");
        }
        Err(CacheError::SendExhausted { attempts }) => {
            error!(
                action = %action,
                attempts,
                "Exhausted retries to send message to mirror; dropping it"
            );
        }
        Err(err) => {
            error!(action = %action, error = %err, "Mirror connection is closed; dropping message");
        }
    }
}
