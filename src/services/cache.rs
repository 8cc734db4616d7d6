//! Render result cache with a mirror channel.
//!
//! The rendering layer looks a key up with [`Cache::get`]; on a miss it
//! builds a [`DeferredValue`] and stores it with [`Cache::set`], so
//! concurrent requests for the same key share one in-flight computation.
//! Once a stored value resolves, the full snapshot of resolved entries is
//! published to the observer. Mirror failures never reach the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::errors::CacheResult;
use crate::domain::models::{
    DeferredValue, InboundCommand, MirrorAction, MirrorConfig, Snapshot, SnapshotPayload,
};
use crate::domain::ports::{ConnectionState, MirrorLink};
use crate::infrastructure::mirror::WebSocketLink;
use crate::services::command_handler::{CommandOutcome, CommandTarget, InboundCommandHandler};
use crate::services::diagnostics::{DiagnosticsSnapshot, MirrorDiagnostics};
use crate::services::entry_store::EntryStore;
use crate::services::mirror_state::MirrorState;
use crate::services::outbound_sync::{LinearBackoff, OutboundSync};
use crate::services::task_scope::TaskScope;

struct CacheInner<T> {
    store: Mutex<EntryStore<T>>,
    mirror: MirrorState,
    outbound: OutboundSync,
    commands: InboundCommandHandler,
    link: Arc<dyn MirrorLink>,
    scope: TaskScope,
    diagnostics: Arc<MirrorDiagnostics>,
}

impl<T> CacheInner<T> {
    fn store(&self) -> MutexGuard<'_, EntryStore<T>> {
        // The store holds no invariants a panicking writer could break halfway.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Serialize + Clone> CacheInner<T> {
    fn publish_snapshot(&self, action: MirrorAction, updated_key: Option<String>) {
        // Held until the frame is queued so frames leave in mutation order.
        let store = self.store();
        let full_cache = store.snapshot();
        let payload = match updated_key {
            Some(key) => SnapshotPayload::set(key, full_cache),
            None => SnapshotPayload::update(full_cache),
        };
        self.outbound.publish(action, payload);
    }
}

impl<T: Serialize + Clone> CommandTarget for CacheInner<T> {
    fn delete_entry(&self, key: &str) -> CacheResult<()> {
        self.store().delete(key).map(|_| ())
    }

    fn clear_entries(&self) {
        let cleared = self.store().clear();
        debug!(cleared, "Cache cleared by observer");
    }

    fn set_mirror_enabled(&self, enabled: bool) {
        self.mirror.set_enabled(enabled);
    }

    fn publish_update(&self) {
        self.publish_snapshot(MirrorAction::Update, None);
    }
}

/// In-memory cache of deferred values, mirrored to an external observer.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct Cache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.inner.store().len())
            .field("mirror_enabled", &self.inner.mirror.is_enabled())
            .field("connection", &self.inner.link.state())
            .finish()
    }
}

impl<T> Cache<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    /// Create a cache mirrored over a WebSocket to `config.endpoint`.
    ///
    /// Returns immediately; the link starts out `Connecting` and messages
    /// published before the handshake completes are retried.
    ///
    /// # Panics
    /// Outside of a Tokio runtime.
    pub fn connect(config: &MirrorConfig) -> Self {
        let scope = TaskScope::current();
        let (link, inbound) = WebSocketLink::connect(&config.endpoint, &scope);
        info!(endpoint = %config.endpoint, "Connecting render cache to mirror observer");
        Self::build(Arc::new(link), Some(inbound), config, scope)
    }

    /// Create a cache on an arbitrary link.
    ///
    /// Text frames received on `inbound` are handled as observer commands.
    ///
    /// # Panics
    /// Outside of a Tokio runtime.
    pub fn with_link(
        link: Arc<dyn MirrorLink>,
        inbound: Option<mpsc::UnboundedReceiver<String>>,
        config: &MirrorConfig,
    ) -> Self {
        Self::build(link, inbound, config, TaskScope::current())
    }

    fn build(
        link: Arc<dyn MirrorLink>,
        inbound: Option<mpsc::UnboundedReceiver<String>>,
        config: &MirrorConfig,
        scope: TaskScope,
    ) -> Self {
        let diagnostics = Arc::new(MirrorDiagnostics::new());
        let outbound = OutboundSync::new(
            Arc::clone(&link),
            LinearBackoff::from_config(config),
            scope.clone(),
            Arc::clone(&diagnostics),
        );

        let cache = Self {
            inner: Arc::new(CacheInner {
                store: Mutex::new(EntryStore::new()),
                mirror: MirrorState::default(),
                outbound,
                commands: InboundCommandHandler::new(Arc::clone(&diagnostics)),
                link,
                scope,
                diagnostics,
            }),
        };

        if let Some(mut inbound) = inbound {
            let inner = Arc::clone(&cache.inner);
            cache.inner.scope.spawn(async move {
                while let Some(text) = inbound.recv().await {
                    inner.commands.handle(&text, inner.as_ref());
                }
            });
        }

        cache
    }

    /// The cached value for `key`, if any. Never mutates the cache.
    pub fn get(&self, key: &str) -> Option<DeferredValue<T>> {
        let value = self.inner.store().get(key);
        debug!(key = %key, hit = value.is_some(), "RscCache.get");
        value
    }

    /// Cache `value` under `key` and mirror it once it resolves.
    ///
    /// While mirroring is disabled the cache is reset before inserting.
    pub fn set(&self, key: impl Into<String>, value: DeferredValue<T>) {
        let key = key.into();
        let evicted = self
            .inner
            .store()
            .set(key.clone(), value.clone(), &self.inner.mirror);
        debug!(key = %key, evicted, resolved = value.is_resolved(), "RscCache.set");
        self.observe_completion(key, value);
    }

    /// The cached value for `key`, or the one built by `make` after caching it.
    ///
    /// Lookup and insert happen under one lock, so concurrent callers for the
    /// same key always share a single value. `make` must not touch the cache.
    pub fn get_or_insert_with<F>(&self, key: &str, make: F) -> DeferredValue<T>
    where
        F: FnOnce() -> DeferredValue<T>,
    {
        let value = {
            let mut store = self.inner.store();
            if let Some(existing) = store.get(key) {
                debug!(key = %key, "RscCache hit");
                return existing;
            }
            let value = make();
            let evicted = store.set(key.to_string(), value.clone(), &self.inner.mirror);
            debug!(key = %key, evicted, "RscCache miss, value inserted");
            value
        };
        self.observe_completion(key.to_string(), value.clone());
        value
    }

    fn observe_completion(&self, key: String, value: DeferredValue<T>) {
        let inner = Arc::clone(&self.inner);
        self.inner.scope.spawn(async move {
            value.wait().await;
            debug!(key = %key, "Cached value resolved");
            inner.publish_snapshot(MirrorAction::Set, Some(key));
        });
    }

    /// Apply an observer command as if it arrived on the mirror channel.
    pub fn apply_command(&self, command: &InboundCommand) {
        self.inner.commands.apply(command, self.inner.as_ref());
    }

    /// Parse and apply one raw text frame from the observer.
    pub fn handle_inbound(&self, text: &str) -> CommandOutcome {
        self.inner.commands.handle(text, self.inner.as_ref())
    }

    /// Current snapshot of resolved entries.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.store().snapshot()
    }
}

impl<T> Cache<T> {
    /// Whether mirroring is on.
    pub fn mirror_enabled(&self) -> bool {
        self.inner.mirror.is_enabled()
    }

    /// Current state of the mirror link.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    /// Number of cached entries, pending ones included.
    pub fn len(&self) -> usize {
        self.inner.store().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.store().is_empty()
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.store().keys()
    }

    /// Mirror counters so far.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }

    /// Close the mirror and cancel every pending observer, retry and the
    /// inbound loop. Cached entries stay readable.
    pub fn shutdown(&self) {
        if self.inner.scope.is_shutdown() {
            return;
        }
        info!("Shutting down render cache mirror");
        self.inner.link.close();
        self.inner.scope.shutdown();
    }
}
