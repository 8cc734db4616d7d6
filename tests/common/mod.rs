//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use std::time::Duration;

use rsc_cache::infrastructure::mirror::ObservedMessage;
use rsc_cache::{Cache, MirrorConfig, MirrorObserver, ObserverSession};

/// Upper bound for any single wait on the mirror channel.
#[allow(dead_code)]
pub const MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Bind an observer on an ephemeral port, connect a cache to it and accept
/// the connection.
#[allow(dead_code)]
pub async fn connected_pair() -> (Cache<String>, ObserverSession, MirrorObserver) {
    let observer = MirrorObserver::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind observer");
    let endpoint = observer.endpoint().expect("Observer has no address");

    let cache = Cache::connect(&MirrorConfig::with_endpoint(endpoint));
    let session = tokio::time::timeout(MESSAGE_TIMEOUT, observer.accept())
        .await
        .expect("Cache did not connect in time")
        .expect("Handshake failed");

    (cache, session, observer)
}

/// Next snapshot from the cache, failing the test on timeout or disconnect.
#[allow(dead_code)]
pub async fn next_message(session: &mut ObserverSession) -> ObservedMessage {
    tokio::time::timeout(MESSAGE_TIMEOUT, session.next_message())
        .await
        .expect("Timed out waiting for a snapshot")
        .expect("Observer read failed")
        .expect("Cache disconnected")
}

/// Returns true if no snapshot arrives within `window`.
#[allow(dead_code)]
pub async fn stays_quiet(session: &mut ObserverSession, window: Duration) -> bool {
    tokio::time::timeout(window, session.next_message())
        .await
        .is_err()
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 20ms until it returns true or timeout is reached.
///
/// # Returns
///
/// * `true` - Condition was met within timeout
/// * `false` - Timeout occurred
#[allow(dead_code)]
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    predicate()
}
