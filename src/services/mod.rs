//! Service layer: the cache and the two halves of its mirror channel.

pub mod cache;
pub mod command_handler;
pub mod diagnostics;
pub mod entry_store;
pub mod mirror_state;
pub mod outbound_sync;
pub mod task_scope;

pub use cache::Cache;
pub use command_handler::{parse_command, CommandOutcome, CommandTarget, InboundCommandHandler};
pub use diagnostics::{DiagnosticsSnapshot, MirrorDiagnostics};
pub use entry_store::EntryStore;
pub use mirror_state::MirrorState;
pub use outbound_sync::{deliver, Delivery, LinearBackoff, OutboundSync};
pub use task_scope::TaskScope;
