//! Mirror channel wire protocol.
//!
//! Every frame is a JSON text message whose `id` field names its kind. The
//! cache publishes `rsc-cache-set` / `rsc-cache-update` snapshots and accepts
//! `rsc-cache-delete`, `rsc-cache-clear`, `rsc-cache-enable` and
//! `rsc-cache-disable` commands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every message id on the mirror channel.
pub const MESSAGE_ID_PREFIX: &str = "rsc-cache-";

/// Point-in-time mapping of every resolved entry.
pub type Snapshot = BTreeMap<String, serde_json::Value>;

/// Kind of outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorAction {
    /// Published after a remote command changed the cache.
    Update,
    /// Published after a cached value resolved.
    Set,
}

impl MirrorAction {
    /// Wire id of the action, e.g. `rsc-cache-set`.
    pub const fn message_id(self) -> &'static str {
        match self {
            Self::Update => "rsc-cache-update",
            Self::Set => "rsc-cache-set",
        }
    }

    /// Parse a wire id back into an action.
    pub fn from_message_id(id: &str) -> Option<Self> {
        match id {
            "rsc-cache-update" => Some(Self::Update),
            "rsc-cache-set" => Some(Self::Set),
            _ => None,
        }
    }
}

impl fmt::Display for MirrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// Body of an outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Every resolved entry at publish time.
    #[serde(rename = "fullCache")]
    pub full_cache: Snapshot,

    /// Key whose resolution triggered the publish.
    #[serde(rename = "updatedKey", default, skip_serializing_if = "Option::is_none")]
    pub updated_key: Option<String>,
}

impl SnapshotPayload {
    /// Payload for a remote-command update.
    pub const fn update(full_cache: Snapshot) -> Self {
        Self {
            full_cache,
            updated_key: None,
        }
    }

    /// Payload for a value that just resolved.
    pub fn set(updated_key: impl Into<String>, full_cache: Snapshot) -> Self {
        Self {
            full_cache,
            updated_key: Some(updated_key.into()),
        }
    }
}

/// Outbound frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// `rsc-cache-set` or `rsc-cache-update`.
    pub id: String,
    /// Snapshot body.
    pub payload: SnapshotPayload,
}

impl OutboundMessage {
    /// Build the frame for `action`.
    pub fn new(action: MirrorAction, payload: SnapshotPayload) -> Self {
        Self {
            id: action.message_id().to_string(),
            payload,
        }
    }

    /// The action named by `id`, if recognised.
    pub fn action(&self) -> Option<MirrorAction> {
        MirrorAction::from_message_id(&self.id)
    }
}

/// Control command sent by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id")]
pub enum InboundCommand {
    /// Remove one entry.
    #[serde(rename = "rsc-cache-delete")]
    Delete {
        /// Key to remove. A delete without one removes nothing but still
        /// publishes the current snapshot.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    /// Remove every entry.
    #[serde(rename = "rsc-cache-clear")]
    Clear,
    /// Turn mirroring back on.
    #[serde(rename = "rsc-cache-enable")]
    Enable,
    /// Turn mirroring off; the next `set` resets the cache.
    #[serde(rename = "rsc-cache-disable")]
    Disable,
}

impl InboundCommand {
    /// Wire ids of every command the cache understands.
    pub const KNOWN_IDS: [&'static str; 4] = [
        "rsc-cache-delete",
        "rsc-cache-clear",
        "rsc-cache-enable",
        "rsc-cache-disable",
    ];

    /// Delete command for `key`.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete {
            key: Some(key.into()),
        }
    }

    /// Wire id of this command.
    pub const fn message_id(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "rsc-cache-delete",
            Self::Clear => "rsc-cache-clear",
            Self::Enable => "rsc-cache-enable",
            Self::Disable => "rsc-cache-disable",
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for InboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { key: Some(key) } => write!(f, "delete {key}"),
            Self::Delete { key: None } => write!(f, "delete"),
            Self::Clear => write!(f, "clear"),
            Self::Enable => write!(f, "enable"),
            Self::Disable => write!(f, "disable"),
        }
    }
}
