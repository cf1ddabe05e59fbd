use sqlx::{Pool, Postgres, Row};

use crate::error::AppError;
use crate::models::message::FileMeta;
use crate::models::{Message, MessageType};
use crate::services::participant_service::ParticipantService;
use crate::services::read_receipt_service::ReadReceiptService;

pub struct MessageService;

impl MessageService {
    /// Append a message. One transaction covers the insert, the conversation
    /// activity bump, and the conditional unread increment for everyone but
    /// the sender, so counters stay consistent under concurrent sends.
    ///
    /// Membership and flagged-conversation policy are the caller's concern:
    /// the REST entry point rejects non-moderator writes into flagged
    /// conversations before reaching this, the socket entry point does not.
    pub async fn create(
        db: &Pool<Postgres>,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
        message_type: MessageType,
        reply_to_id: Option<i64>,
        file_meta: Option<&FileMeta>,
    ) -> Result<Message, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("message content cannot be empty".into()));
        }

        let meta = file_meta.cloned().unwrap_or_default();

        let mut tx = db.begin().await?;

        let row = sqlx::query(
            "INSERT INTO messages \
                (conversation_id, sender_id, content, message_type, reply_to_id, \
                 file_name, file_url, file_size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(message_type.as_str())
        .bind(reply_to_id)
        .bind(meta.file_name)
        .bind(meta.file_url)
        .bind(meta.file_size)
        .fetch_one(&mut *tx)
        .await?;
        let message = Message::from_row(&row)?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        ParticipantService::increment_unread_for_others(&mut *tx, conversation_id, sender_id)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Paginated history: non-deleted messages, newest first. Callers wanting
    /// chronological display reverse the page client-side. Offset pagination;
    /// concurrent inserts can shift page boundaries between requests.
    pub async fn list(
        db: &Pool<Postgres>,
        conversation_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let limit = if limit <= 0 { 50 } else { limit.min(200) };
        let offset = offset.max(0);

        let rows = sqlx::query(
            "SELECT * FROM messages \
             WHERE conversation_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        rows.iter()
            .map(|r| Message::from_row(r).map_err(AppError::from))
            .collect()
    }

    /// Edit a message's content. Returns None unless the requester is the
    /// original sender, leaving the row untouched in that case.
    pub async fn edit(
        db: &Pool<Postgres>,
        message_id: i64,
        requester_id: i64,
        new_content: &str,
    ) -> Result<Option<Message>, AppError> {
        if new_content.trim().is_empty() {
            return Err(AppError::Validation("message content cannot be empty".into()));
        }

        let row = sqlx::query(
            "UPDATE messages \
             SET content = $1, is_edited = TRUE, edited_at = NOW(), updated_at = NOW() \
             WHERE id = $2 AND sender_id = $3 AND is_deleted = FALSE \
             RETURNING *",
        )
        .bind(new_content)
        .bind(message_id)
        .bind(requester_id)
        .fetch_optional(db)
        .await?;

        row.map(|r| Message::from_row(&r).map_err(AppError::from))
            .transpose()
    }

    /// Soft delete; content is retained but the message disappears from
    /// listings and unread accounting. Sender-only, same rule as edit.
    pub async fn soft_delete(
        db: &Pool<Postgres>,
        message_id: i64,
        requester_id: i64,
    ) -> Result<Option<Message>, AppError> {
        let row = sqlx::query(
            "UPDATE messages \
             SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND sender_id = $2 AND is_deleted = FALSE \
             RETURNING *",
        )
        .bind(message_id)
        .bind(requester_id)
        .fetch_optional(db)
        .await?;

        row.map(|r| Message::from_row(&r).map_err(AppError::from))
            .transpose()
    }

    /// Record read state for a user in a conversation.
    ///
    /// With explicit ids, receipts are written for exactly those messages
    /// (constrained to the conversation). Without, every visible message not
    /// authored by the reader and not already `read` gets a receipt, and the
    /// coarse conversation-wide message status flips to `read`. Either way
    /// the reader's unread counter resets.
    ///
    /// Returns the message ids that were receipted.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
        message_ids: Option<&[i64]>,
    ) -> Result<Vec<i64>, AppError> {
        let target_ids: Vec<i64> = match message_ids {
            Some(ids) if !ids.is_empty() => {
                let rows = sqlx::query(
                    "SELECT id FROM messages \
                     WHERE id = ANY($1) AND conversation_id = $2",
                )
                .bind(ids)
                .bind(conversation_id)
                .fetch_all(db)
                .await?;
                rows.iter().map(|r| r.get::<i64, _>("id")).collect()
            }
            _ => {
                let rows = sqlx::query(
                    "SELECT id FROM messages \
                     WHERE conversation_id = $1 AND sender_id <> $2 \
                       AND is_deleted = FALSE AND status <> 'read'",
                )
                .bind(conversation_id)
                .bind(user_id)
                .fetch_all(db)
                .await?;
                let ids: Vec<i64> = rows.iter().map(|r| r.get::<i64, _>("id")).collect();

                // Intentionally coarse: conversation-wide status, not a true
                // per-recipient delivery state.
                sqlx::query(
                    "UPDATE messages SET status = 'read' \
                     WHERE conversation_id = $1 AND sender_id <> $2 \
                       AND is_deleted = FALSE AND status <> 'read'",
                )
                .bind(conversation_id)
                .bind(user_id)
                .execute(db)
                .await?;

                ids
            }
        };

        if !target_ids.is_empty() {
            let pairs: Vec<(i64, i64)> = target_ids.iter().map(|id| (*id, user_id)).collect();
            ReadReceiptService::create_many(db, &pairs).await?;
        }

        ParticipantService::reset_unread(db, conversation_id, user_id).await?;

        Ok(target_ids)
    }
}
