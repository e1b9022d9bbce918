use chrono::{DateTime, Utc};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::db_types::{NewNotification, Notification, Role};

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as(
        r#"INSERT INTO notifications (user_id, notification_type, title, message, asset_id, bid_id, metadata,
            role_context)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *"#,
    )
    .bind(notification.user_id)
    .bind(notification.notification_type)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.asset_id)
    .bind(notification.bid_id)
    .bind(notification.metadata.map(Json))
    .bind(notification.role_context)
    .fetch_one(conn)
    .await
}

pub async fn fetch_notifications(
    user_id: i64,
    role: Option<Role>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM notifications WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(role) = role {
        builder.push(" AND role_context = ");
        builder.push_bind(role);
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(limit);
    builder.build_query_as().fetch_all(conn).await
}

pub async fn count_unread(user_id: i64, role: Option<Role>, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM notifications WHERE is_read = 0 AND user_id = ");
    builder.push_bind(user_id);
    if let Some(role) = role {
        builder.push(" AND role_context = ");
        builder.push_bind(role);
    }
    builder.build_query_scalar().fetch_one(conn).await
}

pub async fn mark_read(
    user_id: i64,
    notification_id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, $1)
        WHERE id = $2 AND user_id = $3"#,
    )
    .bind(at)
    .bind(notification_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_all_read(
    user_id: i64,
    role: Option<Role>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE notifications SET is_read = 1, read_at = ");
    builder.push_bind(at);
    builder.push(" WHERE is_read = 0 AND user_id = ");
    builder.push_bind(user_id);
    if let Some(role) = role {
        builder.push(" AND role_context = ");
        builder.push_bind(role);
    }
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
