use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReactionRow {
    pub message_id: i64,
    pub emoji: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// Conditional insert: the composite primary key makes this a single atomic
/// step, so two users reacting at the same instant cannot clobber each other
/// and a double-click by the same user conflicts instead of duplicating.
/// Returns true if a row was inserted, false if the user had already reacted.
pub async fn add_reaction(
    pool: &DbPool,
    message_id: i64,
    emoji: &str,
    user_id: &str,
    user_name: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO reactions (message_id, emoji, user_id, user_name, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (message_id, emoji, user_id) DO NOTHING",
    )
    .bind(message_id)
    .bind(emoji)
    .bind(user_id)
    .bind(user_name)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns true if a row was removed, false if the user had not reacted.
/// Empty emoji groups need no pruning here: with one row per reacting user,
/// removing the last user removes the group.
pub async fn remove_reaction(
    pool: &DbPool,
    message_id: i64,
    emoji: &str,
    user_id: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM reactions WHERE message_id = $1 AND emoji = $2 AND user_id = $3",
    )
    .bind(message_id)
    .bind(emoji)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// All reaction rows for a message in arrival order, for grouping by emoji.
pub async fn reactions_for_message(
    pool: &DbPool,
    message_id: i64,
) -> Result<Vec<ReactionRow>, DbError> {
    let rows = sqlx::query_as::<_, ReactionRow>(
        "SELECT message_id, emoji, user_id, user_name, created_at
         FROM reactions WHERE message_id = $1
         ORDER BY created_at, user_id",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
