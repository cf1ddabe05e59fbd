use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    File,
    Image,
    Audio,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::File => "file",
            MessageType::Image => "image",
            MessageType::Audio => "audio",
            MessageType::System => "system",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "file" => MessageType::File,
            "image" => MessageType::Image,
            "audio" => MessageType::Audio,
            "system" => MessageType::System,
            _ => MessageType::Text,
        }
    }
}

/// Coarse delivery status, conversation-wide rather than per recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            _ => MessageStatus::Sent,
        }
    }
}

/// Optional file metadata carried by file/image/audio messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub status: MessageStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let message_type: String = row.try_get("message_type")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            message_type: MessageType::from_str(&message_type),
            file_name: row.try_get("file_name")?,
            file_url: row.try_get("file_url")?,
            file_size: row.try_get("file_size")?,
            reply_to_id: row.try_get("reply_to_id")?,
            status: MessageStatus::from_str(&status),
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            is_edited: row.try_get("is_edited")?,
            edited_at: row.try_get("edited_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_and_status_round_trip_through_text() {
        for t in [
            MessageType::Text,
            MessageType::File,
            MessageType::Image,
            MessageType::Audio,
            MessageType::System,
        ] {
            assert_eq!(MessageType::from_str(t.as_str()), t);
        }
        for s in [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(MessageStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn unknown_type_falls_back_to_text() {
        assert_eq!(MessageType::from_str("video"), MessageType::Text);
        assert_eq!(MessageStatus::from_str(""), MessageStatus::Sent);
    }
}
