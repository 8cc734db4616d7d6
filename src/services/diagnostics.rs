//! Counters for the mirror channel.
//!
//! Every failure on the mirror path is swallowed after logging; these
//! counters are how a host (or a test) can still see that it happened.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::errors::{CacheError, CacheResult};

/// Live counters, shared between the cache and its background tasks.
#[derive(Debug, Default)]
pub struct MirrorDiagnostics {
    messages_sent: AtomicU64,
    sends_exhausted: AtomicU64,
    sends_dropped_closed: AtomicU64,
    missing_keys: AtomicU64,
    malformed_messages: AtomicU64,
    ignored_messages: AtomicU64,
    encode_failures: AtomicU64,
}

/// Point-in-time copy of [`MirrorDiagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    /// Frames handed to an open link.
    pub messages_sent: u64,
    /// Frames dropped after the retry budget ran out.
    pub sends_exhausted: u64,
    /// Frames dropped because the link was closed.
    pub sends_dropped_closed: u64,
    /// Remote deletes that named a key the cache did not hold.
    pub missing_keys: u64,
    /// Inbound frames that were not valid JSON.
    pub malformed_messages: u64,
    /// Inbound frames without a known command id.
    pub ignored_messages: u64,
    /// Snapshots that could not be encoded.
    pub encode_failures: u64,
}

impl MirrorDiagnostics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the outcome of one delivery attempt.
    pub fn record_delivery<T>(&self, outcome: &CacheResult<T>) {
        let counter = match outcome {
            Ok(_) => &self.messages_sent,
            Err(CacheError::SendExhausted { .. }) => &self.sends_exhausted,
            Err(_) => &self.sends_dropped_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delete for an absent key.
    pub fn record_missing_key(&self) {
        self.missing_keys.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an inbound frame that was not valid JSON.
    pub fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an unrecognised inbound frame.
    pub fn record_ignored(&self) {
        self.ignored_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a snapshot that failed to encode.
    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            sends_exhausted: self.sends_exhausted.load(Ordering::Relaxed),
            sends_dropped_closed: self.sends_dropped_closed.load(Ordering::Relaxed),
            missing_keys: self.missing_keys.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            ignored_messages: self.ignored_messages.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_delivery_routes_by_outcome() {
        let diagnostics = MirrorDiagnostics::new();
        diagnostics.record_delivery(&Ok::<(), CacheError>(()));
        diagnostics.record_delivery::<()>(&Err(CacheError::SendExhausted { attempts: 10 }));
        diagnostics.record_delivery::<()>(&Err(CacheError::ConnectionClosed));
        diagnostics.record_encode_failure();

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.sends_exhausted, 1);
        assert_eq!(snapshot.sends_dropped_closed, 1);
        assert_eq!(snapshot.encode_failures, 1);
    }

    #[test]
    fn test_inbound_counters() {
        let diagnostics = MirrorDiagnostics::new();
        diagnostics.record_missing_key();
        diagnostics.record_malformed();
        diagnostics.record_ignored();
        diagnostics.record_ignored();

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.missing_keys, 1);
        assert_eq!(snapshot.malformed_messages, 1);
        assert_eq!(snapshot.ignored_messages, 2);
    }
}
