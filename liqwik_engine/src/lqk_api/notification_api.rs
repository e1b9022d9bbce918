use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Notification, Role},
    traits::{NotificationApiError, NotificationManagement},
};

pub const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// The body of a notification update request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationActionRequest {
    #[serde(default)]
    pub action: String,
    pub notification_id: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    MarkAsRead(i64),
    MarkAllAsRead(Option<Role>),
}

impl TryFrom<NotificationActionRequest> for NotificationAction {
    type Error = NotificationApiError;

    fn try_from(req: NotificationActionRequest) -> Result<Self, Self::Error> {
        match (req.action.as_str(), req.notification_id) {
            ("markAsRead", Some(id)) => Ok(Self::MarkAsRead(id)),
            ("markAllAsRead", _) => Ok(Self::MarkAllAsRead(req.role)),
            _ => Err(NotificationApiError::InvalidAction),
        }
    }
}

pub struct NotificationApi<B> {
    db: B,
}

impl<B: Debug> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi ({:?})", self.db)
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> NotificationApi<B>
where B: NotificationManagement
{
    /// The user's most recent notifications, optionally limited to those raised in the context of `role`, together
    /// with the matching unread count.
    pub async fn notifications(
        &self,
        user_id: i64,
        role: Option<Role>,
        limit: Option<i64>,
    ) -> Result<NotificationList, NotificationApiError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_NOTIFICATION_LIMIT);
        let notifications = self.db.fetch_notifications(user_id, role, limit).await?;
        let unread_count = self.db.count_unread_notifications(user_id, role).await?;
        Ok(NotificationList { notifications, unread_count })
    }

    /// Applies a read-state change. Returns the number of notifications that changed.
    pub async fn apply(&self, user_id: i64, action: NotificationAction) -> Result<u64, NotificationApiError> {
        match action {
            NotificationAction::MarkAsRead(id) => {
                if !self.db.mark_notification_read(user_id, id).await? {
                    return Err(NotificationApiError::NotificationNotFound);
                }
                trace!("🔄️🔔️ Notification #{id} read by user #{user_id}");
                Ok(1)
            },
            NotificationAction::MarkAllAsRead(role) => {
                let n = self.db.mark_all_notifications_read(user_id, role).await?;
                debug!("🔄️🔔️ {n} notifications marked as read for user #{user_id}");
                Ok(n)
            },
        }
    }
}
