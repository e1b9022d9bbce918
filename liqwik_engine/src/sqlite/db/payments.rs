//! Bill-to party payments created when a buyer approves payment on an accepted bid.
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{BillToPartyPayment, NewBillToPartyPayment, TrackedPayment};

pub async fn insert_payment(
    payment: NewBillToPartyPayment,
    conn: &mut SqliteConnection,
) -> Result<BillToPartyPayment, sqlx::Error> {
    let payment: BillToPartyPayment = sqlx::query_as(
        r#"INSERT INTO bill_to_party_payments (asset_id, bid_id, bill_to_party_id, amount_in_cents, due_date,
            next_reminder_due_at)
        VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"#,
    )
    .bind(payment.asset_id)
    .bind(payment.bid_id)
    .bind(payment.bill_to_party_id)
    .bind(payment.amount_in_cents)
    .bind(payment.due_date)
    .bind(payment.next_reminder_due_at)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Payment #{} of {} due {} created for asset #{}",
        payment.id, payment.amount_in_cents, payment.due_date, payment.asset_id
    );
    Ok(payment)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<BillToPartyPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM bill_to_party_payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await
}

pub async fn fetch_unpaid_payments(conn: &mut SqliteConnection) -> Result<Vec<TrackedPayment>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT p.*, a.invoice_number, b.name AS bill_to_party_name, b.email AS bill_to_party_email,
            bur.user_id AS bill_to_party_user_id, buyer.name AS buyer_name
        FROM bill_to_party_payments p
            JOIN assets a ON p.asset_id = a.id
            JOIN bill_to_parties b ON p.bill_to_party_id = b.id
            LEFT JOIN user_roles bur ON b.contact_id = bur.id
            JOIN asset_bids bid ON p.bid_id = bid.id
            JOIN asset_buyers buyer ON bid.buyer_id = buyer.id
        WHERE p.is_paid = 0
        ORDER BY p.id"#,
    )
    .fetch_all(conn)
    .await
}

pub async fn mark_overdue(payment_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bill_to_party_payments SET is_overdue = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_overdue_notification_sent(payment_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE bill_to_party_payments SET overdue_notification_sent = 1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1"#,
    )
    .bind(payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn record_reminder_sent(
    payment_id: i64,
    sent_at: DateTime<Utc>,
    next_due_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        r#"UPDATE bill_to_party_payments SET reminders_sent = reminders_sent + 1, last_reminder_sent_at = $1,
            next_reminder_due_at = $2, updated_at = CURRENT_TIMESTAMP
        WHERE id = $3 RETURNING reminders_sent"#,
    )
    .bind(sent_at)
    .bind(next_due_at)
    .bind(payment_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Marks an unpaid payment as paid. Returns `None` if the payment is already paid or does not exist.
pub async fn mark_paid(
    payment_id: i64,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<BillToPartyPayment>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE bill_to_party_payments SET is_paid = 1, paid_at = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND is_paid = 0 RETURNING *"#,
    )
    .bind(paid_at)
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}
