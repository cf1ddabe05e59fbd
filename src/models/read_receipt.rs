use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Durable record that a user read a message. Append-only; at most one row
/// per (message, user), enforced by a unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub read_at: DateTime<Utc>,
}
