use chrono::{DateTime, Utc};
use liqwik_common::Cents;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{AssetBid, NewBid};

pub async fn insert_bid(bid: NewBid, conn: &mut SqliteConnection) -> Result<AssetBid, sqlx::Error> {
    let bid: AssetBid = sqlx::query_as(
        "INSERT INTO asset_bids (asset_id, buyer_id, num_units, cents_per_unit) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(bid.asset_id)
    .bind(bid.buyer_id)
    .bind(bid.num_units)
    .bind(bid.cents_per_unit)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Bid #{} of {} placed on asset #{}", bid.id, bid.total(), bid.asset_id);
    Ok(bid)
}

pub async fn fetch_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM asset_bids WHERE id = $1").bind(bid_id).fetch_optional(conn).await
}

pub async fn fetch_bid_by_payment_token(
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM asset_bids WHERE payment_approval_token = $1").bind(token).fetch_optional(conn).await
}

/// Bids whose `column` matches any of `ids`, newest first.
async fn fetch_bids_where_in(
    column: &str,
    ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<AssetBid>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new(format!("SELECT * FROM asset_bids WHERE {column} IN ("));
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    builder.push(") ORDER BY created_at DESC, id DESC");
    builder.build_query_as().fetch_all(conn).await
}

pub async fn fetch_bids_for_assets(asset_ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<AssetBid>, sqlx::Error> {
    fetch_bids_where_in("asset_id", asset_ids, conn).await
}

pub async fn fetch_bids_for_buyers(buyer_ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<AssetBid>, sqlx::Error> {
    fetch_bids_where_in("buyer_id", buyer_ids, conn).await
}

/// Changes the amount of a bid. Returns `None` if the bid does not exist or has been accepted.
pub async fn update_bid_amount(
    bid_id: i64,
    cents_per_unit: Cents,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET cents_per_unit = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND accepted = 0 RETURNING *"#,
    )
    .bind(cents_per_unit)
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}

/// Accepts the bid, provided it is not accepted yet and no other bid on the same asset is. Returns `None` when the
/// condition fails.
pub async fn accept_bid(
    bid_id: i64,
    token: &str,
    deadline: DateTime<Utc>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET accepted = 1, accepted_at = $1, rejected = 0, rejected_at = NULL,
            payment_deadline = $2, payment_approval_token = $3, updated_at = CURRENT_TIMESTAMP
        WHERE id = $4 AND accepted = 0 AND NOT EXISTS (
            SELECT 1 FROM asset_bids other
            WHERE other.asset_id = asset_bids.asset_id AND other.accepted = 1 AND other.id <> asset_bids.id
        )
        RETURNING *"#,
    )
    .bind(at)
    .bind(deadline)
    .bind(token)
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}

/// Rejects every bid on the asset except `keep_bid_id` that is not already rejected.
pub async fn reject_other_bids(
    asset_id: i64,
    keep_bid_id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET rejected = 1, rejected_at = $1, updated_at = CURRENT_TIMESTAMP
        WHERE asset_id = $2 AND id <> $3 AND rejected = 0 RETURNING *"#,
    )
    .bind(at)
    .bind(asset_id)
    .bind(keep_bid_id)
    .fetch_all(conn)
    .await
}

/// Withdraws acceptance of a bid whose payment has not been approved. Returns `None` if that condition fails.
pub async fn clear_acceptance(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET accepted = 0, accepted_at = NULL, payment_deadline = NULL,
            payment_approval_token = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND accepted = 1 AND payment_approved_by_buyer = 0 RETURNING *"#,
    )
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}

/// Un-rejects the other bids on the asset. Lapsed bids stay rejected.
pub async fn unreject_other_bids(
    asset_id: i64,
    keep_bid_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE asset_bids SET rejected = 0, rejected_at = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE asset_id = $1 AND id <> $2 AND is_overdue = 0 AND rejected = 1"#,
    )
    .bind(asset_id)
    .bind(keep_bid_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Rejects a bid whose payment has not been approved, clearing any acceptance. Returns `None` if the condition fails.
pub async fn reject_bid(bid_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET rejected = 1, rejected_at = $1, accepted = 0, accepted_at = NULL,
            payment_deadline = NULL, payment_approval_token = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND payment_approved_by_buyer = 0 RETURNING *"#,
    )
    .bind(at)
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}

pub async fn mark_payment_approved(
    bid_id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET payment_approved_by_buyer = 1, payment_approved_at = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND accepted = 1 AND payment_approved_by_buyer = 0 RETURNING *"#,
    )
    .bind(at)
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}

pub async fn set_payment_email_flags(
    bid_id: i64,
    buyer_confirmation_sent: bool,
    seller_notification_sent: bool,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE asset_bids SET
            payment_confirmation_email_sent = payment_confirmation_email_sent OR $1,
            seller_payment_notification_sent = seller_payment_notification_sent OR $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $3"#,
    )
    .bind(buyer_confirmation_sent)
    .bind(seller_notification_sent)
    .bind(bid_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Accepted bids still waiting for the buyer's payment approval.
pub async fn fetch_awaiting_payment_approval(conn: &mut SqliteConnection) -> Result<Vec<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT * FROM asset_bids
        WHERE accepted = 1 AND payment_approved_by_buyer = 0 AND payment_deadline IS NOT NULL
        ORDER BY id"#,
    )
    .fetch_all(conn)
    .await
}

pub async fn mark_bid_lapsed(
    bid_id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetBid>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE asset_bids SET is_overdue = 1, rejected = 1, rejected_at = $1, accepted = 0,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND accepted = 1 AND payment_approved_by_buyer = 0 RETURNING *"#,
    )
    .bind(at)
    .bind(bid_id)
    .fetch_optional(conn)
    .await
}
