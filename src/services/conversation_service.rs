use sqlx::{Pool, Postgres, Row};

use crate::error::AppError;
use crate::models::{Conversation, ConversationType, ConversationView, Message, Participant};

/// Conjunctive filters for the caller's conversation listing.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilters {
    pub conversation_type: Option<ConversationType>,
    /// Participant-role filter (e.g. an owning role sees only groups it
    /// created while still seeing all of its direct messages when unset).
    pub role: Option<String>,
    pub archived: Option<bool>,
    pub favorites: Option<bool>,
    pub flagged: Option<bool>,
    pub search: Option<String>,
}

pub struct ConversationService;

impl ConversationService {
    /// Create a conversation and enroll the creator as its first participant.
    /// For groups the creator's participant role is taken from `creator_role`
    /// so later queries can tell "groups I created" from "groups I joined".
    pub async fn create(
        db: &Pool<Postgres>,
        conversation_type: ConversationType,
        name: Option<&str>,
        project_id: Option<i64>,
        creator_id: i64,
        creator_role: Option<&str>,
    ) -> Result<Conversation, AppError> {
        if conversation_type == ConversationType::Group
            && name.map(|n| n.trim().is_empty()).unwrap_or(true)
        {
            return Err(AppError::Validation(
                "group conversations require a name".into(),
            ));
        }

        let role = creator_role.unwrap_or(match conversation_type {
            ConversationType::Group => "admin",
            _ => "member",
        });

        let mut tx = db.begin().await?;

        let row = sqlx::query(
            "INSERT INTO conversations (conversation_type, name, project_id) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(conversation_type.as_str())
        .bind(name)
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = Conversation::from_row(&row)?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3)",
        )
        .bind(conversation.id)
        .bind(creator_id)
        .bind(role)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(conversation)
    }

    /// Create a group conversation with the creator plus invited members in
    /// one transaction.
    pub async fn create_group(
        db: &Pool<Postgres>,
        name: &str,
        project_id: Option<i64>,
        creator_id: i64,
        creator_role: Option<&str>,
        member_ids: &[i64],
    ) -> Result<Conversation, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("group name cannot be empty".into()));
        }

        let mut tx = db.begin().await?;

        let row = sqlx::query(
            "INSERT INTO conversations (conversation_type, name, project_id) \
             VALUES ('group', $1, $2) RETURNING *",
        )
        .bind(name)
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = Conversation::from_row(&row)?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3)",
        )
        .bind(conversation.id)
        .bind(creator_id)
        .bind(creator_role.unwrap_or("admin"))
        .execute(&mut *tx)
        .await?;

        for member_id in member_ids {
            if *member_id == creator_id {
                continue;
            }
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                 VALUES ($1, $2, 'member') \
                 ON CONFLICT (conversation_id, user_id) WHERE left_at IS NULL DO NOTHING",
            )
            .bind(conversation.id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(conversation)
    }

    /// Get or create the direct conversation for a pair of users.
    ///
    /// Uniqueness comes from the `direct_key` column, so two concurrent
    /// calls for the same pair resolve to the same row: the loser of the
    /// insert race reads the winner's conversation back.
    pub async fn get_or_create_direct(
        db: &Pool<Postgres>,
        user_a: i64,
        user_b: i64,
        project_id: Option<i64>,
    ) -> Result<Conversation, AppError> {
        if user_a == user_b {
            return Err(AppError::Validation(
                "cannot open a direct conversation with yourself".into(),
            ));
        }
        let key = Conversation::direct_key(user_a, user_b);

        let mut tx = db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO conversations (conversation_type, direct_key, project_id) \
             VALUES ('direct', $1, $2) \
             ON CONFLICT (direct_key) DO NOTHING \
             RETURNING *",
        )
        .bind(&key)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

        let conversation = match inserted {
            Some(row) => {
                let conversation = Conversation::from_row(&row)?;
                sqlx::query(
                    "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                     VALUES ($1, $2, 'member'), ($1, $3, 'member')",
                )
                .bind(conversation.id)
                .bind(user_a)
                .bind(user_b)
                .execute(&mut *tx)
                .await?;
                conversation
            }
            None => {
                let row = sqlx::query("SELECT * FROM conversations WHERE direct_key = $1")
                    .bind(&key)
                    .fetch_one(&mut *tx)
                    .await?;
                let mut conversation = Conversation::from_row(&row)?;

                // Backfill the project association if it was unknown at
                // creation time.
                if conversation.project_id.is_none() && project_id.is_some() {
                    let row = sqlx::query(
                        "UPDATE conversations SET project_id = $2 \
                         WHERE id = $1 AND project_id IS NULL RETURNING *",
                    )
                    .bind(conversation.id)
                    .bind(project_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                    if let Some(row) = row {
                        conversation = Conversation::from_row(&row)?;
                    }
                }
                conversation
            }
        };

        tx.commit().await?;
        Ok(conversation)
    }

    pub async fn get(db: &Pool<Postgres>, id: i64) -> Result<Conversation, AppError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = $1 AND status <> 'deleted'")
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(Conversation::from_row(&row)?)
    }

    /// List the caller's conversations, newest activity first, enriched with
    /// the caller's own participant row, the last visible message, and the
    /// peer id for direct conversations. Deleted conversations never appear.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: i64,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationView>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT c.*,
                   p.id AS p_id, p.conversation_id AS p_conversation_id,
                   p.user_id AS p_user_id, p.role AS p_role,
                   p.joined_at AS p_joined_at, p.left_at AS p_left_at,
                   p.last_read_at AS p_last_read_at, p.unread_count AS p_unread_count,
                   p.is_archived AS p_is_archived, p.is_favorite AS p_is_favorite,
                   p.is_muted AS p_is_muted
            FROM conversations c
            JOIN conversation_participants p
              ON p.conversation_id = c.id AND p.user_id = $1 AND p.left_at IS NULL
            WHERE c.status IN ('active', 'archived')
              AND ($2::text IS NULL OR c.conversation_type = $2)
              AND ($3::text IS NULL OR p.role = $3)
              AND ($4::boolean IS NULL OR p.is_archived = $4)
              AND ($5::boolean IS NULL OR p.is_favorite = $5)
              AND ($6::boolean IS NULL OR c.is_flagged = $6)
              AND ($7::text IS NULL
                   OR c.name ILIKE '%' || $7 || '%'
                   OR EXISTS (
                        SELECT 1 FROM messages m
                        WHERE m.conversation_id = c.id
                          AND m.is_deleted = FALSE
                          AND m.content ILIKE '%' || $7 || '%'))
            ORDER BY c.updated_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .bind(filters.conversation_type.map(|t| t.as_str()))
        .bind(filters.role.as_deref())
        .bind(filters.archived)
        .bind(filters.favorites)
        .bind(filters.flagged)
        .bind(filters.search.as_deref())
        .fetch_all(db)
        .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = Conversation::from_row(row)?;
            let participant = participant_from_prefixed_row(row)?;

            let last_message = Self::last_visible_message(db, conversation.id).await?;

            let other_participant_id =
                if conversation.conversation_type == ConversationType::Direct {
                    sqlx::query(
                        "SELECT user_id FROM conversation_participants \
                         WHERE conversation_id = $1 AND user_id <> $2 AND left_at IS NULL \
                         LIMIT 1",
                    )
                    .bind(conversation.id)
                    .bind(user_id)
                    .fetch_optional(db)
                    .await?
                    .map(|r| r.get::<i64, _>("user_id"))
                } else {
                    None
                };

            views.push(ConversationView {
                conversation,
                participant,
                last_message,
                other_participant_id,
            });
        }

        Ok(views)
    }

    async fn last_visible_message(
        db: &Pool<Postgres>,
        conversation_id: i64,
    ) -> Result<Option<Message>, AppError> {
        let row = sqlx::query(
            "SELECT * FROM messages \
             WHERE conversation_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?;
        row.map(|r| Message::from_row(&r).map_err(AppError::from))
            .transpose()
    }

    /// Flag a conversation for moderation review. Flagging restricts writes
    /// by non-moderators; it does not delete anything.
    pub async fn flag(
        db: &Pool<Postgres>,
        conversation_id: i64,
        flagged_by: i64,
        reason: &str,
    ) -> Result<Conversation, AppError> {
        let row = sqlx::query(
            "UPDATE conversations \
             SET is_flagged = TRUE, flagged_reason = $2, flagged_by = $3, flagged_at = NOW() \
             WHERE id = $1 AND status <> 'deleted' RETURNING *",
        )
        .bind(conversation_id)
        .bind(reason)
        .bind(flagged_by)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(Conversation::from_row(&row)?)
    }

    pub async fn unflag(db: &Pool<Postgres>, conversation_id: i64) -> Result<Conversation, AppError> {
        let row = sqlx::query(
            "UPDATE conversations \
             SET is_flagged = FALSE, flagged_reason = NULL, flagged_by = NULL, flagged_at = NULL \
             WHERE id = $1 AND status <> 'deleted' RETURNING *",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(Conversation::from_row(&row)?)
    }

    /// Terminal soft delete. The direct_key is released so a future direct
    /// conversation between the same pair can be created.
    pub async fn soft_delete(db: &Pool<Postgres>, conversation_id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE conversations SET status = 'deleted', direct_key = NULL \
             WHERE id = $1 AND status <> 'deleted'",
        )
        .bind(conversation_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

fn participant_from_prefixed_row(row: &sqlx::postgres::PgRow) -> Result<Participant, sqlx::Error> {
    Ok(Participant {
        id: row.try_get("p_id")?,
        conversation_id: row.try_get("p_conversation_id")?,
        user_id: row.try_get("p_user_id")?,
        role: row.try_get("p_role")?,
        joined_at: row.try_get("p_joined_at")?,
        left_at: row.try_get("p_left_at")?,
        last_read_at: row.try_get("p_last_read_at")?,
        unread_count: row.try_get("p_unread_count")?,
        is_archived: row.try_get("p_is_archived")?,
        is_favorite: row.try_get("p_is_favorite")?,
        is_muted: row.try_get("p_is_muted")?,
    })
}
