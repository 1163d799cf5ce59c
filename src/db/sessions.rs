use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{db::DbPool, models::session::Session};

pub async fn create(pool: &DbPool, user_id: i64, ttl: Duration) -> Result<Session, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Session>(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at)
         VALUES (?1, ?2, ?3, ?3, ?4) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(now)
    .bind(now + ttl)
    .fetch_one(pool)
    .await
}

pub async fn find(pool: &DbPool, id: &str) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn touch(pool: &DbPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &DbPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_expired(pool: &DbPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at IS NOT NULL AND expires_at <= ?1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
