//! Conversation-list merge: reconciles the authoritative server listing
//! with conversations the client created locally moments earlier that the
//! server's list endpoint has not reflected yet (read-replica lag, cache).
//!
//! A time-windowed heuristic keeps a local-only entry alive while it is
//! younger than a grace window; once older, its absence from the server
//! list means it was deleted or never existed, and it is discarded.

use chrono::{DateTime, Duration, Utc};

use crate::models::Conversation;

/// A conversation the client created and is holding on to until the server
/// listing reflects it.
#[derive(Debug, Clone)]
pub struct LocalConversation {
    pub conversation: Conversation,
    /// When the client observed the creation succeed.
    pub created_locally_at: DateTime<Utc>,
}

impl LocalConversation {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            created_locally_at: Utc::now(),
        }
    }
}

/// Grace window during which a local-only conversation survives its absence
/// from the server list.
pub fn merge_grace() -> Duration {
    Duration::seconds(30)
}

/// Merge the fetched server list with locally-created conversations.
///
/// Server entries win on conflict (same id). Local-only entries younger
/// than `grace` are appended at the front, newest first, since a conversation
/// the user just created belongs at the top of the list.
pub fn merge_conversation_lists(
    server: Vec<Conversation>,
    local: &[LocalConversation],
    now: DateTime<Utc>,
    grace: Duration,
) -> Vec<Conversation> {
    let mut survivors: Vec<&LocalConversation> = local
        .iter()
        .filter(|l| now - l.created_locally_at <= grace)
        .filter(|l| !server.iter().any(|s| s.id == l.conversation.id))
        .collect();
    survivors.sort_by(|a, b| b.created_locally_at.cmp(&a.created_locally_at));

    let mut merged: Vec<Conversation> = survivors
        .into_iter()
        .map(|l| l.conversation.clone())
        .collect();
    merged.extend(server);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationStatus, ConversationType};

    fn conversation(id: i64, name: &str) -> Conversation {
        Conversation {
            id,
            conversation_type: ConversationType::Group,
            name: Some(name.to_string()),
            project_id: None,
            status: ConversationStatus::Active,
            is_flagged: false,
            flagged_reason: None,
            flagged_by: None,
            flagged_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn local(id: i64, name: &str, age: Duration, now: DateTime<Utc>) -> LocalConversation {
        LocalConversation {
            conversation: conversation(id, name),
            created_locally_at: now - age,
        }
    }

    #[test]
    fn fresh_local_entry_survives_until_server_catches_up() {
        let now = Utc::now();
        let server = vec![conversation(1, "old group")];
        let locals = vec![local(99, "just created", Duration::seconds(2), now)];

        let merged = merge_conversation_lists(server, &locals, now, merge_grace());

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, 99);
        assert_eq!(merged[1].id, 1);
    }

    #[test]
    fn stale_local_entry_is_discarded() {
        let now = Utc::now();
        let locals = vec![local(99, "ancient", Duration::seconds(120), now)];

        let merged = merge_conversation_lists(vec![], &locals, now, merge_grace());
        assert!(merged.is_empty());
    }

    #[test]
    fn server_copy_wins_once_it_appears() {
        let now = Utc::now();
        let mut server_copy = conversation(99, "renamed on server");
        server_copy.name = Some("renamed on server".to_string());
        let locals = vec![local(99, "local name", Duration::seconds(2), now)];

        let merged = merge_conversation_lists(vec![server_copy], &locals, now, merge_grace());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name.as_deref(), Some("renamed on server"));
    }

    #[test]
    fn multiple_local_entries_order_newest_first() {
        let now = Utc::now();
        let locals = vec![
            local(10, "older", Duration::seconds(20), now),
            local(11, "newer", Duration::seconds(5), now),
        ];

        let merged = merge_conversation_lists(vec![], &locals, now, merge_grace());

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, 11);
        assert_eq!(merged[1].id, 10);
    }
}
