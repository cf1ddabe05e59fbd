use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

/// One (conversation, user) membership row. Rows are never deleted; leaving
/// sets `left_at`. Role is informational metadata mirrored from the identity
/// collaborator, not an authorization source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id: i64,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub is_archived: bool,
    pub is_favorite: bool,
    pub is_muted: bool,
}

impl Participant {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            joined_at: row.try_get("joined_at")?,
            left_at: row.try_get("left_at")?,
            last_read_at: row.try_get("last_read_at")?,
            unread_count: row.try_get("unread_count")?,
            is_archived: row.try_get("is_archived")?,
            is_favorite: row.try_get("is_favorite")?,
            is_muted: row.try_get("is_muted")?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}
