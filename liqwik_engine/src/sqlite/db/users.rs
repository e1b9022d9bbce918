//! Users, their roles, and the short-lived codes attached to them.
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Role, User, UserRole},
    traits::NewUser,
};

pub async fn fetch_user_by_id(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn fetch_user_by_login(identifier: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE username = $1 OR email = $1 LIMIT 1")
        .bind(identifier)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user_by_email_or_username(
    email: &str,
    username: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, sqlx::Error> {
    // An email match takes precedence over a username match
    let user = sqlx::query_as(
        "SELECT * FROM users WHERE email = $1 OR username = $2 ORDER BY CASE WHEN email = $1 THEN 0 ELSE 1 END LIMIT 1",
    )
    .bind(email)
    .bind(username)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, sqlx::Error> {
    let user: User = sqlx::query_as(
        r#"INSERT INTO users (first_name, middle_name, last_name, username, email, phone, hashed_password)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *"#,
    )
    .bind(user.first_name)
    .bind(user.middle_name)
    .bind(user.last_name)
    .bind(user.username)
    .bind(user.email)
    .bind(user.phone)
    .bind(user.hashed_password)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ New user #{} ({}) created", user.id, user.username);
    Ok(user)
}

pub async fn fetch_all_users(conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users ORDER BY id").fetch_all(conn).await
}

pub async fn set_user_active(
    user_id: i64,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("UPDATE users SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(active)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

pub async fn delete_user(user_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn mark_email_verified(user_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET is_email_verified = 1, email_verified_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(at)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_login_otp(
    user_id: i64,
    otp: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET login_otp = $1, login_otp_expires_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3",
    )
    .bind(otp)
    .bind(expires_at)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_first_login(user_id: i64, is_first_login: bool, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_first_login = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(is_first_login)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

//--------------------------------------      User roles     ---------------------------------------------------------

pub async fn fetch_user_roles(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<UserRole>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM user_roles WHERE user_id = $1 ORDER BY id").bind(user_id).fetch_all(conn).await
}

pub async fn fetch_user_role(user_role_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM user_roles WHERE id = $1").bind(user_role_id).fetch_optional(conn).await
}

pub async fn fetch_user_role_for(
    user_id: i64,
    role: Role,
    conn: &mut SqliteConnection,
) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM user_roles WHERE user_id = $1 AND role = $2")
        .bind(user_id)
        .bind(role)
        .fetch_optional(conn)
        .await
}

/// Inserts an unverified role carrying a verification code.
pub async fn insert_pending_role(
    user_id: i64,
    role: Role,
    code: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserRole, sqlx::Error> {
    let user_role: UserRole = sqlx::query_as(
        r#"INSERT INTO user_roles (user_id, role, role_verification_code, role_verification_expires_at)
        VALUES ($1, $2, $3, $4) RETURNING *"#,
    )
    .bind(user_id)
    .bind(role)
    .bind(code)
    .bind(expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Pending {role} role #{} created for user #{user_id}", user_role.id);
    Ok(user_role)
}

pub async fn insert_verified_role(
    user_id: i64,
    role: Role,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserRole, sqlx::Error> {
    let user_role: UserRole = sqlx::query_as(
        r#"INSERT INTO user_roles (user_id, role, is_role_verified, role_verified_at)
        VALUES ($1, $2, 1, $3) RETURNING *"#,
    )
    .bind(user_id)
    .bind(role)
    .bind(at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Verified {role} role #{} granted to user #{user_id}", user_role.id);
    Ok(user_role)
}

pub async fn update_role_verification_code(
    user_role_id: i64,
    code: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE user_roles SET role_verification_code = $1, role_verification_expires_at = $2
        WHERE id = $3 AND is_role_verified = 0"#,
    )
    .bind(code)
    .bind(expires_at)
    .bind(user_role_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Marks the role verified and clears its code. Returns the number of rows changed, which is zero if the role was
/// already verified.
pub async fn mark_role_verified(
    user_role_id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE user_roles SET is_role_verified = 1, role_verified_at = $1, role_verification_code = NULL,
        role_verification_expires_at = NULL
        WHERE id = $2 AND is_role_verified = 0"#,
    )
    .bind(at)
    .bind(user_role_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_verified_roles(user_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = $1 AND is_role_verified = 1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}
