use thiserror::Error;

use crate::db_types::{NewNotification, Notification, Role};

#[derive(Debug, Clone, Error)]
pub enum NotificationApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Notification not found")]
    NotificationNotFound,
    #[error("Invalid action")]
    InvalidAction,
}

impl From<sqlx::Error> for NotificationApiError {
    fn from(e: sqlx::Error) -> Self {
        NotificationApiError::DatabaseError(e.to_string())
    }
}

/// Persisted in-app notifications. When a `role` filter is given, only notifications created in that role's context
/// are considered.
#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, NotificationApiError>;

    /// The user's most recent notifications, newest first.
    async fn fetch_notifications(
        &self,
        user_id: i64,
        role: Option<Role>,
        limit: i64,
    ) -> Result<Vec<Notification>, NotificationApiError>;

    async fn count_unread_notifications(&self, user_id: i64, role: Option<Role>) -> Result<i64, NotificationApiError>;

    /// Returns `false` if the notification does not exist or belongs to someone else.
    async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<bool, NotificationApiError>;

    /// Returns the number of notifications that were marked.
    async fn mark_all_notifications_read(&self, user_id: i64, role: Option<Role>)
        -> Result<u64, NotificationApiError>;
}
