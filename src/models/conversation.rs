use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

use super::{Message, Participant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Direct,
    Group,
    System,
    Moderation,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
            ConversationType::Group => "group",
            ConversationType::System => "system",
            ConversationType::Moderation => "moderation",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "group" => ConversationType::Group,
            "system" => ConversationType::System,
            "moderation" => ConversationType::Moderation,
            _ => ConversationType::Direct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Deleted,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Archived => "archived",
            ConversationStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "archived" => ConversationStatus::Archived,
            "deleted" => ConversationStatus::Deleted,
            _ => ConversationStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub name: Option<String>,
    pub project_id: Option<i64>,
    pub status: ConversationStatus,
    pub is_flagged: bool,
    pub flagged_reason: Option<String>,
    pub flagged_by: Option<i64>,
    pub flagged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let conversation_type: String = row.try_get("conversation_type")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            conversation_type: ConversationType::from_str(&conversation_type),
            name: row.try_get("name")?,
            project_id: row.try_get("project_id")?,
            status: ConversationStatus::from_str(&status),
            is_flagged: row.try_get("is_flagged")?,
            flagged_reason: row.try_get("flagged_reason")?,
            flagged_by: row.try_get("flagged_by")?,
            flagged_at: row.try_get("flagged_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Canonical uniqueness key for a direct conversation between two users.
    pub fn direct_key(a: i64, b: i64) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }
}

/// A conversation as seen by one caller in a listing: the row itself plus
/// the caller's own participant state, the last visible message, and (for
/// direct conversations) the peer's id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participant: Participant,
    pub last_message: Option<Message>,
    pub other_participant_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_key_is_order_independent() {
        assert_eq!(Conversation::direct_key(7, 3), Conversation::direct_key(3, 7));
        assert_eq!(Conversation::direct_key(3, 7), "3:7");
    }

    #[test]
    fn type_round_trips_through_text() {
        for t in [
            ConversationType::Direct,
            ConversationType::Group,
            ConversationType::System,
            ConversationType::Moderation,
        ] {
            assert_eq!(ConversationType::from_str(t.as_str()), t);
        }
        for s in [
            ConversationStatus::Active,
            ConversationStatus::Archived,
            ConversationStatus::Deleted,
        ] {
            assert_eq!(ConversationStatus::from_str(s.as_str()), s);
        }
    }
}
