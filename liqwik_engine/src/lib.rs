//! Liqwik Engine
//!
//! The Liqwik engine holds the business logic of an invoice-factoring marketplace. Sellers list invoices as assets,
//! buyers bid on them, and the bill-to party named on each invoice validates it and, eventually, pays it.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). You should
//!    rarely need to touch the database directly. The exception is the data types, which live in [`mod@db_types`].
//! 2. The workflow APIs ([`mod@lqk_api`]). These are what the server calls. They are generic over the backend traits,
//!    so they can be tested against mocks as easily as against SQLite.
//! 3. The email contract ([`mod@mailer`]). The engine composes every email; delivery is up to the caller.
pub mod db_types;
pub mod helpers;
pub mod mailer;
pub mod traits;

mod lqk_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use lqk_api::{
    admin_api::AdminApi,
    asset_flow_api::AssetFlowApi,
    asset_objects,
    auth_api::AuthApi,
    auth_objects,
    bid_flow_api::BidFlowApi,
    bid_objects,
    notification_api::{
        NotificationAction,
        NotificationActionRequest,
        NotificationApi,
        NotificationList,
        DEFAULT_NOTIFICATION_LIMIT,
    },
    payment_tracking_api::{
        PaymentTrackingApi,
        SweepReport,
        PAYMENT_REMINDER_INTERVAL_DAYS,
        PAYMENT_TRACKING_LOCK,
        PAYMENT_TRACKING_LOCK_TTL_MS,
    },
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
