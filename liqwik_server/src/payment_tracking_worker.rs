use chrono::Duration;
use liqwik_engine::{PaymentTrackingApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::mail::ServerMailer;

/// Starts the payment tracking worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The first sweep runs as soon as the worker starts. Sweeps are singleton-guarded in the database, so a sweep that
/// overlaps with one requested through the API is skipped rather than run twice.
pub fn start_payment_tracking_worker(
    api: PaymentTrackingApi<SqliteDatabase, ServerMailer>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = period.to_std().unwrap_or(std::time::Duration::from_secs(24 * 3600));
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Payment tracking worker started. Sweeps run every {} minutes", period.as_secs() / 60);
        loop {
            timer.tick().await;
            info!("🕰️ Running payment tracking sweep");
            match api.run_sweep().await {
                Ok(report) => {
                    info!(
                        "🕰️ {} payments processed. {} reminders and {} overdue notices sent",
                        report.processed, report.reminders_processed, report.overdue_notifications_processed
                    );
                    if report.lapsed_bids > 0 {
                        info!("🕰️ {} accepted bids lapsed without payment approval", report.lapsed_bids);
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running payment tracking sweep: {e}");
                },
            }
        }
    })
}
