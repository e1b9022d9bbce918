//! Named, expiring locks used to keep background jobs from running concurrently.
use sqlx::SqliteConnection;

/// Takes the lock unless another holder has an unexpired claim on it. Returns whether the lock is now held by
/// `holder`.
pub async fn try_acquire(
    name: &str,
    holder: &str,
    now_ms: i64,
    ttl_ms: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO job_locks (name, holder, expires_at_ms) VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET holder = excluded.holder, expires_at_ms = excluded.expires_at_ms
        WHERE job_locks.expires_at_ms <= $4"#,
    )
    .bind(name)
    .bind(holder)
    .bind(now_ms + ttl_ms)
    .bind(now_ms)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release(name: &str, holder: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM job_locks WHERE name = $1 AND holder = $2").bind(name).bind(holder).execute(conn).await?;
    Ok(())
}
