//! Inbound half of the mirror channel.
//!
//! The observer sends JSON commands on the same connection the cache
//! publishes on. Anything that does not start with `{` is ignored, as are
//! frames without a known string `id`. Text that looks like an object but is
//! not valid JSON is dropped and logged; the connection stays up.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::models::InboundCommand;
use crate::services::diagnostics::MirrorDiagnostics;

/// Cache operations a command can trigger.
pub trait CommandTarget {
    /// Remove `key`; `Err(CacheError::KeyNotFound)` if absent.
    fn delete_entry(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry.
    fn clear_entries(&self);

    /// Turn mirroring on or off.
    fn set_mirror_enabled(&self, enabled: bool);

    /// Publish an `rsc-cache-update` with the current snapshot.
    fn publish_update(&self);
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Recognised and applied.
    Applied(InboundCommand),
    /// Not a command for this cache.
    Ignored,
    /// Dropped as malformed.
    Rejected(CacheError),
}

/// Parse one text frame.
///
/// Fields are read leniently: an `id` that is missing or not a string makes
/// the frame unrecognised, and a delete `key` that is missing or not a string
/// yields a keyless delete.
///
/// # Returns
/// * `Ok(Some(command))` for a recognised command
/// * `Ok(None)` for non-object text or an unknown id
/// * `Err(CacheError::MalformedMessage)` for text that starts like an object
///   but is not valid JSON
pub fn parse_command(text: &str) -> CacheResult<Option<InboundCommand>> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }

    let frame: Value = serde_json::from_str(trimmed)
        .map_err(|err| CacheError::MalformedMessage(err.to_string()))?;
    let Some(id) = frame.get("id").and_then(Value::as_str) else {
        return Ok(None);
    };

    let command = match id {
        "rsc-cache-delete" => InboundCommand::Delete {
            key: delete_key(&frame),
        },
        "rsc-cache-clear" => InboundCommand::Clear,
        "rsc-cache-enable" => InboundCommand::Enable,
        "rsc-cache-disable" => InboundCommand::Disable,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn delete_key(frame: &Value) -> Option<String> {
    frame
        .get("key")
        .and_then(Value::as_str)
        // Older observers nest the key under `payload`.
        .or_else(|| frame.pointer("/payload/key").and_then(Value::as_str))
        .map(str::to_string)
}

/// Applies observer commands to a [`CommandTarget`].
pub struct InboundCommandHandler {
    diagnostics: Arc<MirrorDiagnostics>,
}

impl InboundCommandHandler {
    /// Handler recording outcomes in `diagnostics`.
    pub const fn new(diagnostics: Arc<MirrorDiagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Parse and apply one text frame.
    pub fn handle(&self, text: &str, target: &impl CommandTarget) -> CommandOutcome {
        match parse_command(text) {
            Ok(Some(command)) => {
                self.apply(&command, target);
                CommandOutcome::Applied(command)
            }
            Ok(None) => {
                debug!(message = %text, "Ignoring unrecognised mirror message");
                self.diagnostics.record_ignored();
                CommandOutcome::Ignored
            }
            Err(err) => {
                warn!(error = %err, "Dropping malformed mirror message");
                self.diagnostics.record_malformed();
                CommandOutcome::Rejected(err)
            }
        }
    }

    /// Apply an already parsed command.
    pub fn apply(&self, command: &InboundCommand, target: &impl CommandTarget) {
        match command {
            InboundCommand::Delete { key: Some(key) } => {
                if let Err(err) = target.delete_entry(key) {
                    // A remote delete can race a local overwrite; not fatal.
                    warn!(key = %key, error = %err, "rsc-cache-delete: key not found in cache");
                    self.diagnostics.record_missing_key();
                }
                target.publish_update();
            }
            InboundCommand::Delete { key: None } => {
                warn!("rsc-cache-delete without a key; nothing removed");
                self.diagnostics.record_missing_key();
                target.publish_update();
            }
            InboundCommand::Clear => {
                target.clear_entries();
                target.publish_update();
            }
            InboundCommand::Enable => {
                info!("Mirror enabled by observer");
                target.set_mirror_enabled(true);
            }
            InboundCommand::Disable => {
                info!("Mirror disabled by observer");
                target.set_mirror_enabled(false);
            }
        }
    }
}
