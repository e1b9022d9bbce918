//! The periodic sweep over bill-to party payments, and the manual confirmation of a received payment.
//!
//! The sweep is idempotent: every email it sends is recorded before the next run, so running it twice in a row sends
//! nothing the second time. Only one sweep runs at a time across all processes sharing the database; the guard is a
//! lock row that expires on its own if its holder dies.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AssetBid, BillToPartyPayment, OrgType, TrackedPayment},
    helpers::random_token,
    lqk_api::notices,
    mailer::{deliver, EmailMessage, Mailer},
    traits::{AssetManagement, NotificationManagement, OrganizationManagement, PaymentTracking, PaymentTrackingError},
};

pub const PAYMENT_TRACKING_LOCK: &str = "payment-tracking";
pub const PAYMENT_TRACKING_LOCK_TTL_MS: i64 = 10 * 60 * 1000;
pub const PAYMENT_REMINDER_INTERVAL_DAYS: i64 = 3;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub success: bool,
    /// Unpaid payments examined.
    pub processed: usize,
    pub reminders_processed: usize,
    pub overdue_notifications_processed: usize,
    /// Accepted bids whose payment window closed during this sweep.
    pub lapsed_bids: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackingOutcome {
    OverdueNotified,
    ReminderSent,
    Unchanged,
}

/// Whole days from `now` until `due`, rounded up.
fn days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (due - now).num_seconds();
    let days = secs / SECONDS_PER_DAY;
    if secs % SECONDS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}

pub struct PaymentTrackingApi<B, M> {
    db: B,
    mailer: M,
    holder: String,
}

impl<B: Debug, M> Debug for PaymentTrackingApi<B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentTrackingApi ({:?}, holder {})", self.db, self.holder)
    }
}

impl<B, M> PaymentTrackingApi<B, M> {
    pub fn new(db: B, mailer: M) -> Self {
        let holder = format!("sweep-{}", &random_token()[..16]);
        Self { db, mailer, holder }
    }
}

impl<B, M> PaymentTrackingApi<B, M>
where
    B: PaymentTracking + AssetManagement + OrganizationManagement + NotificationManagement,
    M: Mailer,
{
    pub async fn run_sweep(&self) -> Result<SweepReport, PaymentTrackingError> {
        self.run_sweep_at(Utc::now()).await
    }

    /// Runs the sweep as though the current time were `now`. Fails with [`PaymentTrackingError::AlreadyRunning`] if
    /// another sweep holds the lock.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, PaymentTrackingError> {
        let acquired =
            self.db.try_acquire_job_lock(PAYMENT_TRACKING_LOCK, &self.holder, now, PAYMENT_TRACKING_LOCK_TTL_MS).await?;
        if !acquired {
            info!("🔄️📅️ A payment tracking sweep is already running. Skipping this one.");
            return Err(PaymentTrackingError::AlreadyRunning);
        }
        let result = self.sweep(now).await;
        if let Err(e) = self.db.release_job_lock(PAYMENT_TRACKING_LOCK, &self.holder).await {
            warn!("🔄️📅️ Could not release the payment tracking lock. It will expire on its own. {e}");
        }
        result
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, PaymentTrackingError> {
        let mut report = SweepReport { success: true, ..Default::default() };
        match self.db.expire_lapsed_bids(now).await {
            Ok(lapsed) => {
                report.lapsed_bids = lapsed.len();
                for bid in &lapsed {
                    self.notify_lapsed_bid(bid).await;
                }
            },
            Err(e) => error!("🔄️📅️ Could not expire lapsed bids. {e}"),
        }
        let payments = self.db.fetch_unpaid_payments().await?;
        debug!("🔄️📅️ Tracking {} unpaid payments", payments.len());
        for tracked in &payments {
            report.processed += 1;
            match self.track(tracked, now).await {
                Ok(TrackingOutcome::OverdueNotified) => report.overdue_notifications_processed += 1,
                Ok(TrackingOutcome::ReminderSent) => report.reminders_processed += 1,
                Ok(TrackingOutcome::Unchanged) => {},
                Err(e) => error!("🔄️📅️ Error tracking payment #{}. {e}", tracked.payment.id),
            }
        }
        info!(
            "🔄️📅️ Payment sweep complete. {} payments processed, {} reminders, {} overdue notices, {} lapsed bids",
            report.processed, report.reminders_processed, report.overdue_notifications_processed, report.lapsed_bids
        );
        Ok(report)
    }

    async fn notify_lapsed_bid(&self, bid: &AssetBid) {
        let asset = match self.db.fetch_asset(bid.asset_id).await {
            Ok(Some(a)) => a,
            _ => {
                warn!("🔄️📅️ Could not load asset #{} for lapsed bid #{}", bid.asset_id, bid.id);
                return;
            },
        };
        info!("🔄️📅️ Bid #{} on asset #{} lapsed without payment approval", bid.id, asset.id);
        match self.db.fetch_org_contact(OrgType::Buyer, bid.buyer_id).await {
            Ok(Some(buyer)) => notices::notify(&self.db, notices::payment_overdue(buyer.user_id, &asset, bid)).await,
            _ => warn!("🔄️📅️ Could not find the buyer contact for lapsed bid #{}", bid.id),
        }
    }

    async fn track(&self, tracked: &TrackedPayment, now: DateTime<Utc>) -> Result<TrackingOutcome, PaymentTrackingError> {
        let p = &tracked.payment;
        let mut is_overdue = p.is_overdue;
        if !is_overdue && now > p.due_date {
            self.db.mark_payment_overdue(p.id).await?;
            info!("🔄️📅️ Payment #{} for invoice {} is now overdue", p.id, tracked.invoice_number);
            is_overdue = true;
        }
        if is_overdue {
            if p.overdue_notification_sent {
                return Ok(TrackingOutcome::Unchanged);
            }
            return self.send_overdue_notice(tracked, now).await;
        }
        match p.next_reminder_due_at {
            Some(next) if next <= now => self.send_reminder(tracked, now).await,
            _ => Ok(TrackingOutcome::Unchanged),
        }
    }

    async fn send_overdue_notice(
        &self,
        tracked: &TrackedPayment,
        now: DateTime<Utc>,
    ) -> Result<TrackingOutcome, PaymentTrackingError> {
        let p = &tracked.payment;
        let days_overdue = (now - p.due_date).num_days();
        let email = EmailMessage::payment_overdue(
            &tracked.bill_to_party_email,
            &tracked.bill_to_party_name,
            &tracked.invoice_number,
            p.amount_in_cents,
            days_overdue,
        );
        if !deliver(&self.mailer, email).await {
            warn!("🔄️📅️ Overdue notice for payment #{} was not sent. It will be retried on the next sweep.", p.id);
            return Ok(TrackingOutcome::Unchanged);
        }
        if let Some(user_id) = tracked.bill_to_party_user_id {
            let notice =
                notices::bill_to_party_payment_overdue(user_id, p.asset_id, &tracked.invoice_number, days_overdue);
            notices::notify(&self.db, notice).await;
        }
        self.db.mark_overdue_notification_sent(p.id).await?;
        Ok(TrackingOutcome::OverdueNotified)
    }

    async fn send_reminder(
        &self,
        tracked: &TrackedPayment,
        now: DateTime<Utc>,
    ) -> Result<TrackingOutcome, PaymentTrackingError> {
        let p = &tracked.payment;
        let days_until_due = days_until(p.due_date, now);
        if days_until_due <= 0 {
            return Ok(TrackingOutcome::Unchanged);
        }
        let reminder_number = p.reminders_sent + 1;
        let email = EmailMessage::payment_reminder(
            &tracked.bill_to_party_email,
            &tracked.bill_to_party_name,
            &tracked.invoice_number,
            p.amount_in_cents,
            days_until_due,
            reminder_number,
        );
        if !deliver(&self.mailer, email).await {
            warn!("🔄️📅️ Reminder for payment #{} was not sent. It will be retried on the next sweep.", p.id);
            return Ok(TrackingOutcome::Unchanged);
        }
        if let Some(user_id) = tracked.bill_to_party_user_id {
            let notice = notices::bill_to_party_payment_reminder(
                user_id,
                p.asset_id,
                &tracked.invoice_number,
                p.amount_in_cents,
                days_until_due,
                reminder_number,
            );
            notices::notify(&self.db, notice).await;
        }
        let next_due = now + Duration::days(PAYMENT_REMINDER_INTERVAL_DAYS);
        let count = self.db.record_reminder_sent(p.id, now, next_due).await?;
        debug!("🔄️📅️ Reminder #{count} sent for payment #{}. Next one due {next_due}", p.id);
        Ok(TrackingOutcome::ReminderSent)
    }

    /// Records that the bill-to party has paid, and tells the seller.
    pub async fn confirm_payment(&self, payment_id: i64) -> Result<BillToPartyPayment, PaymentTrackingError> {
        let payment = self.db.mark_payment_paid(payment_id, Utc::now()).await?;
        info!("🔄️📅️ Payment #{payment_id} marked as paid");
        let parties = (self.db.fetch_asset(payment.asset_id).await, self.db.fetch_asset_contacts(payment.asset_id).await);
        match parties {
            (Ok(Some(asset)), Ok(Some(c))) => {
                let notice = notices::payment_received(c.seller_user_id, &asset, payment.bid_id, payment.amount_in_cents);
                notices::notify(&self.db, notice).await;
            },
            _ => warn!("🔄️📅️ Could not resolve the seller of payment #{payment_id} to notify them"),
        }
        Ok(payment)
    }
}
