use sqlx::{Pool, Postgres, Row};

use crate::error::AppError;
use crate::models::ReadReceipt;

pub struct ReadReceiptService;

impl ReadReceiptService {
    /// Insert receipts for (message, user) pairs. Duplicates are dropped by
    /// the unique constraint rather than a check-then-insert read, so the
    /// call is idempotent under concurrency. Returns how many rows were
    /// actually inserted.
    pub async fn create_many(
        db: &Pool<Postgres>,
        pairs: &[(i64, i64)],
    ) -> Result<u64, AppError> {
        if pairs.is_empty() {
            return Ok(0);
        }

        let message_ids: Vec<i64> = pairs.iter().map(|(m, _)| *m).collect();
        let user_ids: Vec<i64> = pairs.iter().map(|(_, u)| *u).collect();

        let result = sqlx::query(
            "INSERT INTO message_read_receipts (message_id, user_id) \
             SELECT m, u FROM UNNEST($1::bigint[], $2::bigint[]) AS t(m, u) \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(&message_ids)
        .bind(&user_ids)
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }

    /// All receipts recorded for one message, oldest first.
    pub async fn list_for_message(
        db: &Pool<Postgres>,
        message_id: i64,
    ) -> Result<Vec<ReadReceipt>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM message_read_receipts \
             WHERE message_id = $1 ORDER BY read_at ASC",
        )
        .bind(message_id)
        .fetch_all(db)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ReadReceipt {
                    id: r.try_get("id")?,
                    message_id: r.try_get("message_id")?,
                    user_id: r.try_get("user_id")?,
                    read_at: r.try_get("read_at")?,
                })
            })
            .collect()
    }

    pub async fn is_read(
        db: &Pool<Postgres>,
        message_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT 1 AS one FROM message_read_receipts \
             WHERE message_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row.is_some())
    }
}
