use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub room_id: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub sender_entitlements: i64,
    pub reply_to_id: Option<i64>,
    pub reply_excerpt: Option<String>,
    pub reply_sender_name: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

const MESSAGE_COLUMNS: &str = "id, room_id, content, sender_id, sender_name, sender_avatar, \
     sender_entitlements, reply_to_id, reply_excerpt, reply_sender_name, deleted, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create_message(
    pool: &DbPool,
    id: i64,
    room_id: &str,
    content: &str,
    sender_id: &str,
    sender_name: &str,
    sender_avatar: Option<&str>,
    sender_entitlements: i64,
    reply_to_id: Option<i64>,
    reply_excerpt: Option<&str>,
    reply_sender_name: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<MessageRow, DbError> {
    let row = sqlx::query_as::<_, MessageRow>(&format!(
        "INSERT INTO messages (id, room_id, content, sender_id, sender_name, sender_avatar, \
         sender_entitlements, reply_to_id, reply_excerpt, reply_sender_name, deleted, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $11)
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(id)
    .bind(room_id)
    .bind(content)
    .bind(sender_id)
    .bind(sender_name)
    .bind(sender_avatar)
    .bind(sender_entitlements)
    .bind(reply_to_id)
    .bind(reply_excerpt)
    .bind(reply_sender_name)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Newest `limit` live messages for a room, returned oldest-to-newest.
/// `cutoff` is the retention horizon: rows at or before it are treated as
/// expired even if the reaper has not removed them yet.
pub async fn recent_messages(
    pool: &DbPool,
    room_id: &str,
    limit: i64,
    cutoff: DateTime<Utc>,
) -> Result<Vec<MessageRow>, DbError> {
    let mut rows = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE room_id = $1 AND deleted = 0 AND created_at > $2
         ORDER BY id DESC
         LIMIT $3"
    ))
    .bind(room_id)
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

pub async fn get_message(
    pool: &DbPool,
    room_id: &str,
    id: i64,
    cutoff: DateTime<Utc>,
) -> Result<Option<MessageRow>, DbError> {
    let row = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE id = $1 AND room_id = $2 AND deleted = 0 AND created_at > $3"
    ))
    .bind(id)
    .bind(room_id)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Soft delete: the row stays (reply references to it remain intact) but it
/// no longer appears in history or lookups. Returns false if the message was
/// not found in that room or already deleted.
pub async fn soft_delete_message(pool: &DbPool, room_id: &str, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("UPDATE messages SET deleted = 1 WHERE id = $1 AND room_id = $2 AND deleted = 0")
        .bind(id)
        .bind(room_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Retention reaper step: physically remove messages past the TTL horizon,
/// up to `batch` per call, along with their reactions. Both deletes run in
/// one transaction over the same ordered id set. The final sweep reclaims
/// reaction rows whose message is already gone (a reaction can land between
/// the store's existence check and a purge of its message). Returns the
/// number of messages removed.
pub async fn purge_expired(
    pool: &DbPool,
    cutoff: DateTime<Utc>,
    batch: i64,
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM reactions WHERE message_id IN
         (SELECT id FROM messages WHERE created_at <= $1 ORDER BY id LIMIT $2)",
    )
    .bind(cutoff)
    .bind(batch)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query(
        "DELETE FROM messages WHERE id IN
         (SELECT id FROM messages WHERE created_at <= $1 ORDER BY id LIMIT $2)",
    )
    .bind(cutoff)
    .bind(batch)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM reactions WHERE message_id NOT IN (SELECT id FROM messages)")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chrono::Duration;

    async fn pool() -> DbPool {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        run_migrations(&pool).await.expect("migrations");
        pool
    }

    async fn insert(pool: &DbPool, id: i64, room: &str, text: &str, at: DateTime<Utc>) -> MessageRow {
        create_message(
            pool, id, room, text, "0xabc", "whale", None, 50, None, None, None, at,
        )
        .await
        .expect("create")
    }

    #[tokio::test]
    async fn recent_returns_oldest_to_newest_within_limit() {
        let pool = pool().await;
        let now = Utc::now();
        for i in 1..=5 {
            insert(&pool, i, "whale", &format!("m{i}"), now).await;
        }
        let cutoff = now - Duration::days(3);
        let rows = recent_messages(&pool, "whale", 3, cutoff).await.expect("recent");
        let texts: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(texts, ["m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let pool = pool().await;
        let now = Utc::now();
        insert(&pool, 1, "whale", "whales only", now).await;
        insert(&pool, 2, "lounge", "hello", now).await;
        let cutoff = now - Duration::days(3);
        let rows = recent_messages(&pool, "lounge", 50, cutoff).await.expect("recent");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "hello");
        assert!(get_message(&pool, "lounge", 1, cutoff).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn soft_deleted_messages_disappear_from_reads() {
        let pool = pool().await;
        let now = Utc::now();
        insert(&pool, 7, "whale", "oops", now).await;
        let cutoff = now - Duration::days(3);
        assert!(soft_delete_message(&pool, "whale", 7).await.expect("delete"));
        assert!(get_message(&pool, "whale", 7, cutoff).await.expect("get").is_none());
        assert!(recent_messages(&pool, "whale", 50, cutoff).await.expect("recent").is_empty());
        // Second delete is a no-op.
        assert!(!soft_delete_message(&pool, "whale", 7).await.expect("delete"));
    }

    #[tokio::test]
    async fn expired_rows_are_hidden_and_purged() {
        let pool = pool().await;
        let now = Utc::now();
        insert(&pool, 1, "whale", "old", now - Duration::days(4)).await;
        insert(&pool, 2, "whale", "fresh", now).await;
        let cutoff = now - Duration::days(3);

        let rows = recent_messages(&pool, "whale", 50, cutoff).await.expect("recent");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "fresh");

        let purged = purge_expired(&pool, cutoff, 100).await.expect("purge");
        assert_eq!(purged, 1);
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn purge_removes_reactions_along_with_their_messages() {
        let pool = pool().await;
        let now = Utc::now();
        insert(&pool, 1, "whale", "old", now - Duration::days(4)).await;
        crate::reactions::add_reaction(&pool, 1, "🔥", "0xb", "orca")
            .await
            .expect("add");

        let cutoff = now - Duration::days(3);
        assert_eq!(purge_expired(&pool, cutoff, 100).await.expect("purge"), 1);
        let rows = crate::reactions::reactions_for_message(&pool, 1).await.expect("rows");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn reaper_reclaims_reaction_rows_for_already_purged_messages() {
        let pool = pool().await;
        let now = Utc::now();
        insert(&pool, 1, "whale", "old", now - Duration::days(4)).await;
        let cutoff = now - Duration::days(3);
        assert_eq!(purge_expired(&pool, cutoff, 100).await.expect("purge"), 1);

        // A reaction that landed between the existence check and the purge
        // of its message.
        crate::reactions::add_reaction(&pool, 1, "🔥", "0xb", "orca")
            .await
            .expect("add");

        assert_eq!(purge_expired(&pool, cutoff, 100).await.expect("purge"), 0);
        let rows = crate::reactions::reactions_for_message(&pool, 1).await.expect("rows");
        assert!(rows.is_empty(), "orphan reaction rows must be reclaimed");
    }
}
