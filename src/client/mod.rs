//! Consuming-edge reconciliation: merges optimistic local state with
//! confirmed server state arriving over both the REST path and the push
//! path. The pieces here are transport-agnostic and purely in-memory; the
//! UI layer drives them with whatever it receives.

pub mod merge;
pub mod reconcile;
pub mod refresh;

pub use merge::{merge_conversation_lists, LocalConversation};
pub use reconcile::{MessageTimeline, PendingSend, TimelineEntry};
pub use refresh::{RefreshOutcome, SingleFlight};
