use sqlx::{Pool, Postgres};

use crate::error::AppError;
use crate::models::Participant;

pub struct ParticipantService;

impl ParticipantService {
    /// Add a user to a conversation. Idempotent: if an active membership
    /// already exists the existing row is returned unchanged. Backed by the
    /// partial unique index on (conversation_id, user_id) WHERE left_at IS
    /// NULL, so concurrent calls cannot create duplicates.
    pub async fn add(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
        role: &str,
    ) -> Result<Participant, AppError> {
        let inserted = sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (conversation_id, user_id) WHERE left_at IS NULL DO NOTHING \
             RETURNING *",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(db)
        .await?;

        if let Some(row) = inserted {
            return Ok(Participant::from_row(&row)?);
        }

        Self::find_active(db, conversation_id, user_id)
            .await?
            .ok_or(AppError::Internal)
    }

    /// Soft-leave: sets left_at, preserving the row for history.
    pub async fn remove(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE conversation_participants SET left_at = NOW() \
             WHERE conversation_id = $1 AND user_id = $2 AND left_at IS NULL",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Update per-member view flags. Only active rows are touched; absent
    /// fields are left as-is.
    pub async fn update_view_flags(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
        is_archived: Option<bool>,
        is_favorite: Option<bool>,
        is_muted: Option<bool>,
    ) -> Result<Participant, AppError> {
        let row = sqlx::query(
            "UPDATE conversation_participants SET \
                is_archived = COALESCE($3, is_archived), \
                is_favorite = COALESCE($4, is_favorite), \
                is_muted    = COALESCE($5, is_muted) \
             WHERE conversation_id = $1 AND user_id = $2 AND left_at IS NULL \
             RETURNING *",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(is_archived)
        .bind(is_favorite)
        .bind(is_muted)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(Participant::from_row(&row)?)
    }

    pub async fn list_active(
        db: &Pool<Postgres>,
        conversation_id: i64,
        exclude_user_id: Option<i64>,
    ) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_participants \
             WHERE conversation_id = $1 AND left_at IS NULL \
               AND ($2::bigint IS NULL OR user_id <> $2) \
             ORDER BY joined_at ASC",
        )
        .bind(conversation_id)
        .bind(exclude_user_id)
        .fetch_all(db)
        .await?;

        rows.iter()
            .map(|r| Participant::from_row(r).map_err(AppError::from))
            .collect()
    }

    pub async fn find_active(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Option<Participant>, AppError> {
        let row = sqlx::query(
            "SELECT * FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2 AND left_at IS NULL",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        row.map(|r| Participant::from_row(&r).map_err(AppError::from))
            .transpose()
    }

    /// Bump unread for every active participant except the sender, as one
    /// conditional statement. Runs on the caller's executor so it can share
    /// the message-insert transaction.
    pub async fn increment_unread_for_others<'e, E>(
        executor: E,
        conversation_id: i64,
        sender_id: i64,
    ) -> Result<u64, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE conversation_participants SET unread_count = unread_count + 1 \
             WHERE conversation_id = $1 AND user_id <> $2 AND left_at IS NULL",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Zero the unread counter and advance last_read_at together, keeping
    /// the "counter resets exactly when last_read_at advances" invariant.
    pub async fn reset_unread(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE conversation_participants \
             SET unread_count = 0, last_read_at = NOW() \
             WHERE conversation_id = $1 AND user_id = $2 AND left_at IS NULL",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Membership check used by the gateway before joining rooms or fanning
    /// out writes.
    pub async fn is_active_participant(
        db: &Pool<Postgres>,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let rec = sqlx::query(
            "SELECT 1 AS one FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2 AND left_at IS NULL LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }
}
