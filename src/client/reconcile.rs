//! Optimistic-send bookkeeping for a single conversation view.
//!
//! A submit appends a locally-tagged entry keyed by a client-generated
//! correlation id. The authoritative message arrives later from either the
//! socket echo or the REST response, whichever lands first; the optimistic
//! entry is swapped out by correlation id, and any later duplicate of the
//! same authoritative message is dropped by real id. Delivery failure
//! removes the optimistic entry so no bubble stays "sending" forever.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Message;

/// One in-flight optimistic send, rendered as a "sending" bubble until the
/// authoritative copy replaces it or delivery fails.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub client_id: Uuid,
    pub conversation_id: i64,
    pub content: String,
    pub submitted_at: DateTime<Utc>,
}

impl PendingSend {
    pub fn new(conversation_id: i64, content: &str) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            conversation_id,
            content: content.to_string(),
            submitted_at: Utc::now(),
        }
    }
}

/// A visible timeline entry: either an optimistic placeholder or an
/// authoritative server message.
#[derive(Debug, Clone)]
pub enum TimelineEntry {
    Pending(PendingSend),
    Confirmed(Message),
}

impl TimelineEntry {
    fn confirmed_id(&self) -> Option<i64> {
        match self {
            TimelineEntry::Confirmed(message) => Some(message.id),
            TimelineEntry::Pending(_) => None,
        }
    }
}

/// The message list a conversation view renders, in display order.
#[derive(Debug, Default)]
pub struct MessageTimeline {
    entries: Vec<TimelineEntry>,
    seen_ids: HashSet<i64>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a REST history page (already reversed to chronological
    /// order by the caller). Pending entries are preserved at the tail.
    pub fn load_history(&mut self, messages: Vec<Message>) {
        let pending: Vec<TimelineEntry> = self
            .entries
            .drain(..)
            .filter(|e| matches!(e, TimelineEntry::Pending(_)))
            .collect();
        self.seen_ids = messages.iter().map(|m| m.id).collect();
        self.entries = messages.into_iter().map(TimelineEntry::Confirmed).collect();
        for entry in pending {
            self.entries.push(entry);
        }
    }

    /// Append an optimistic placeholder and return its correlation id.
    pub fn append_pending(&mut self, send: PendingSend) -> Uuid {
        let client_id = send.client_id;
        self.entries.push(TimelineEntry::Pending(send));
        client_id
    }

    /// Apply an authoritative message from either path.
    ///
    /// If `client_id` matches a pending entry, that entry is replaced in
    /// place (the bubble keeps its position). An id already seen is dropped,
    /// which is what dedupes the socket echo against the REST response.
    /// Returns true when the timeline changed.
    pub fn apply_confirmed(&mut self, message: Message, client_id: Option<Uuid>) -> bool {
        if self.seen_ids.contains(&message.id) {
            return false;
        }
        self.seen_ids.insert(message.id);

        if let Some(client_id) = client_id {
            if let Some(slot) = self.entries.iter_mut().find(|e| {
                matches!(e, TimelineEntry::Pending(p) if p.client_id == client_id)
            }) {
                *slot = TimelineEntry::Confirmed(message);
                return true;
            }
        }

        self.entries.push(TimelineEntry::Confirmed(message));
        true
    }

    /// Delivery failed on both paths: drop the placeholder entirely.
    pub fn fail_pending(&mut self, client_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(
            |e| !matches!(e, TimelineEntry::Pending(p) if p.client_id == client_id),
        );
        self.entries.len() != before
    }

    /// Remove a message the server reported as deleted.
    pub fn remove_confirmed(&mut self, message_id: i64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.confirmed_id() != Some(message_id));
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TimelineEntry::Pending(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageStatus, MessageType};

    fn server_message(id: i64, content: &str) -> Message {
        Message {
            id,
            conversation_id: 1,
            sender_id: 7,
            content: content.to_string(),
            message_type: MessageType::Text,
            file_name: None,
            file_url: None,
            file_size: None,
            reply_to_id: None,
            status: MessageStatus::Sent,
            is_deleted: false,
            deleted_at: None,
            is_edited: false,
            edited_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn socket_echo_replaces_optimistic_entry_in_place() {
        let mut timeline = MessageTimeline::new();
        timeline.load_history(vec![server_message(1, "earlier")]);

        let send = PendingSend::new(1, "hello");
        let client_id = timeline.append_pending(send);
        assert_eq!(timeline.pending_count(), 1);

        assert!(timeline.apply_confirmed(server_message(2, "hello"), Some(client_id)));
        assert_eq!(timeline.pending_count(), 0);
        assert_eq!(timeline.len(), 2);

        // The confirmed entry kept the optimistic slot (position 1)
        match &timeline.entries()[1] {
            TimelineEntry::Confirmed(m) => assert_eq!(m.id, 2),
            other => panic!("expected confirmed entry, got {other:?}"),
        }
    }

    #[test]
    fn rest_response_after_socket_echo_is_deduped() {
        let mut timeline = MessageTimeline::new();
        let client_id = timeline.append_pending(PendingSend::new(1, "hi"));

        // Echo arrives first via the push path
        assert!(timeline.apply_confirmed(server_message(5, "hi"), Some(client_id)));
        // REST response carries the same authoritative message
        assert!(!timeline.apply_confirmed(server_message(5, "hi"), Some(client_id)));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn push_from_another_user_appends() {
        let mut timeline = MessageTimeline::new();
        assert!(timeline.apply_confirmed(server_message(3, "yo"), None));
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.pending_count(), 0);
    }

    #[test]
    fn failed_send_removes_the_ghost_bubble() {
        let mut timeline = MessageTimeline::new();
        let client_id = timeline.append_pending(PendingSend::new(1, "doomed"));

        assert!(timeline.fail_pending(client_id));
        assert!(timeline.is_empty());
        assert!(!timeline.fail_pending(client_id));
    }

    #[test]
    fn history_reload_preserves_pending_entries() {
        let mut timeline = MessageTimeline::new();
        let client_id = timeline.append_pending(PendingSend::new(1, "typing this"));

        timeline.load_history(vec![server_message(1, "a"), server_message(2, "b")]);

        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.pending_count(), 1);
        // ...and confirmation still works afterwards
        assert!(timeline.apply_confirmed(server_message(3, "typing this"), Some(client_id)));
        assert_eq!(timeline.pending_count(), 0);
    }

    #[test]
    fn deleted_message_disappears_from_timeline() {
        let mut timeline = MessageTimeline::new();
        timeline.load_history(vec![server_message(1, "a"), server_message(2, "b")]);

        assert!(timeline.remove_confirmed(1));
        assert_eq!(timeline.len(), 1);
        assert!(!timeline.remove_confirmed(1));
    }
}
