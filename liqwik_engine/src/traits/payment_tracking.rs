use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{AssetBid, BillToPartyPayment, TrackedPayment},
    traits::{AssetApiError, BidApiError, OrganizationError},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentTrackingError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Payment tracking is already running")]
    AlreadyRunning,
    #[error("Payment not found")]
    PaymentNotFound,
    #[error("Payment is already marked as paid")]
    AlreadyPaid,
}

impl From<sqlx::Error> for PaymentTrackingError {
    fn from(e: sqlx::Error) -> Self {
        PaymentTrackingError::DatabaseError(e.to_string())
    }
}

impl From<OrganizationError> for PaymentTrackingError {
    fn from(e: OrganizationError) -> Self {
        PaymentTrackingError::DatabaseError(e.to_string())
    }
}

impl From<AssetApiError> for PaymentTrackingError {
    fn from(e: AssetApiError) -> Self {
        PaymentTrackingError::DatabaseError(e.to_string())
    }
}

impl From<BidApiError> for PaymentTrackingError {
    fn from(e: BidApiError) -> Self {
        PaymentTrackingError::DatabaseError(e.to_string())
    }
}

/// Storage operations used by the bill-to party payment sweep.
#[allow(async_fn_in_trait)]
pub trait PaymentTracking {
    /// Takes the named lock for `holder` unless another holder has an unexpired lock. Returns whether the lock was
    /// taken.
    async fn try_acquire_job_lock(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl_ms: i64,
    ) -> Result<bool, PaymentTrackingError>;

    async fn release_job_lock(&self, name: &str, holder: &str) -> Result<(), PaymentTrackingError>;

    /// Marks accepted bids whose payment deadline has passed without buyer approval as lapsed: overdue, rejected and
    /// no longer accepted. Returns the bids that were changed.
    async fn expire_lapsed_bids(&self, now: DateTime<Utc>) -> Result<Vec<AssetBid>, PaymentTrackingError>;

    async fn fetch_unpaid_payments(&self) -> Result<Vec<TrackedPayment>, PaymentTrackingError>;

    async fn mark_payment_overdue(&self, payment_id: i64) -> Result<(), PaymentTrackingError>;

    async fn mark_overdue_notification_sent(&self, payment_id: i64) -> Result<(), PaymentTrackingError>;

    /// Records a sent reminder and schedules the next one. Returns the new reminder count.
    async fn record_reminder_sent(
        &self,
        payment_id: i64,
        sent_at: DateTime<Utc>,
        next_due_at: DateTime<Utc>,
    ) -> Result<i64, PaymentTrackingError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<BillToPartyPayment>, PaymentTrackingError>;

    /// Marks the payment paid. Fails with [`PaymentTrackingError::AlreadyPaid`] if it already was.
    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<BillToPartyPayment, PaymentTrackingError>;
}
