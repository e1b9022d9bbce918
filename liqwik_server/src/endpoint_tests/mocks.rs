use liqwik_engine::{
    db_types::{NewNotification, Notification, Role},
    traits::{NotificationApiError, NotificationManagement},
};
use mockall::mock;

mock! {
    pub NotificationManager {}
    impl NotificationManagement for NotificationManager {
        async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, NotificationApiError>;
        async fn fetch_notifications(&self, user_id: i64, role: Option<Role>, limit: i64) -> Result<Vec<Notification>, NotificationApiError>;
        async fn count_unread_notifications(&self, user_id: i64, role: Option<Role>) -> Result<i64, NotificationApiError>;
        async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<bool, NotificationApiError>;
        async fn mark_all_notifications_read(&self, user_id: i64, role: Option<Role>) -> Result<u64, NotificationApiError>;
    }
}
