//! One-shot deferred values.
//!
//! A [`DeferredValue`] is a cheaply cloneable handle to a value that resolves
//! exactly once. Every clone observes the same resolution, and two handles
//! can be compared for identity with [`DeferredValue::ptr_eq`], which is what
//! lets concurrent callers share one in-flight computation through the cache.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Current state of a deferred value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Not resolved yet.
    Pending,
    /// Resolved with a payload.
    Resolved(T),
}

impl<T> Resolution<T> {
    /// Returns true once a payload is available.
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Borrow the resolved payload, if any.
    pub const fn as_resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Pending => None,
        }
    }
}

struct Shared<T> {
    state: watch::Sender<Resolution<T>>,
}

/// Shared handle to a value with eventual, one-time completion.
pub struct DeferredValue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("resolution", &*self.shared.state.borrow())
            .finish()
    }
}

/// Write side of a [`DeferredValue`]. Consumed on resolution.
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T> DeferredValue<T> {
    /// Create an unresolved value together with the resolver that completes it.
    pub fn pending() -> (Resolver<T>, Self) {
        let (state, _) = watch::channel(Resolution::Pending);
        let shared = Arc::new(Shared { state });
        (
            Resolver {
                shared: Arc::clone(&shared),
            },
            Self { shared },
        )
    }

    /// Create a value that is already resolved.
    pub fn resolved(value: T) -> Self {
        let (state, _) = watch::channel(Resolution::Resolved(value));
        Self {
            shared: Arc::new(Shared { state }),
        }
    }

    /// Returns true if both handles refer to the same deferred value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns true once the value has resolved.
    pub fn is_resolved(&self) -> bool {
        self.shared.state.borrow().is_resolved()
    }
}

impl<T: Clone> DeferredValue<T> {
    /// Read the current state without waiting.
    pub fn resolution(&self) -> Resolution<T> {
        self.shared.state.borrow().clone()
    }

    /// The resolved payload, if available right now.
    pub fn peek(&self) -> Option<T> {
        self.shared.state.borrow().as_resolved().cloned()
    }

    /// Wait for the value to resolve.
    ///
    /// There is no timeout: a value whose resolver is dropped without
    /// resolving never completes this future.
    pub async fn wait(&self) -> T {
        let mut rx = self.shared.state.subscribe();
        loop {
            let current = rx.borrow_and_update().as_resolved().cloned();
            if let Some(value) = current {
                return value;
            }
            // The sender lives in `shared`, which `self` keeps alive.
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> DeferredValue<T> {
    /// Run `future` on the current Tokio runtime and resolve with its output.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (resolver, value) = Self::pending();
        tokio::spawn(async move {
            resolver.resolve(future.await);
        });
        value
    }
}

impl<T> Resolver<T> {
    /// Complete the deferred value. Later resolutions are impossible since
    /// the resolver is consumed.
    pub fn resolve(self, value: T) {
        self.shared.state.send_replace(Resolution::Resolved(value));
    }
}
