//! Mirror on/off toggle owned by a cache instance.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the cache is mirrored. Toggled only by inbound commands.
///
/// While disabled, every `set` first resets the whole cache.
#[derive(Debug)]
pub struct MirrorState {
    enabled: AtomicBool,
}

impl MirrorState {
    /// Toggle starting at `enabled`.
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Whether mirroring is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Set the toggle, returning the previous value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// Turn mirroring on.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Turn mirroring off.
    pub fn disable(&self) {
        self.set_enabled(false);
    }
}

impl Default for MirrorState {
    fn default() -> Self {
        Self::new(true)
    }
}
