use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{Asset, AssetContacts, AssetDocuments, AssetUpdate, NewAsset};

pub async fn insert_asset(asset: NewAsset, conn: &mut SqliteConnection) -> Result<Asset, sqlx::Error> {
    let asset: Asset = sqlx::query_as(
        r#"INSERT INTO assets (invoice_number, invoice_date, face_value_in_cents, payment_date, term_months, apy,
        fees_in_cents, seller_id, bill_to_party_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"#,
    )
    .bind(asset.invoice_number)
    .bind(asset.invoice_date)
    .bind(asset.face_value_in_cents)
    .bind(asset.payment_date)
    .bind(asset.term_months)
    .bind(asset.apy)
    .bind(asset.fees_in_cents)
    .bind(asset.seller_id)
    .bind(asset.bill_to_party_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Asset #{} for invoice {} created", asset.id, asset.invoice_number);
    Ok(asset)
}

pub async fn fetch_asset(asset_id: i64, conn: &mut SqliteConnection) -> Result<Option<Asset>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM assets WHERE id = $1").bind(asset_id).fetch_optional(conn).await
}

pub async fn fetch_asset_by_validation_token(
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Asset>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM assets WHERE bill_to_party_validation_token = $1")
        .bind(token)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_assets_for_sellers(
    seller_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<Asset>, sqlx::Error> {
    if seller_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT * FROM assets WHERE seller_id IN (");
    let mut ids = builder.separated(", ");
    for id in seller_ids {
        ids.push_bind(*id);
    }
    builder.push(") ORDER BY created_at DESC, id DESC");
    builder.build_query_as().fetch_all(conn).await
}

pub async fn fetch_open_assets(conn: &mut SqliteConnection) -> Result<Vec<Asset>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM assets WHERE is_posted = 1 AND is_cancelled = 0 ORDER BY created_at DESC, id DESC")
        .fetch_all(conn)
        .await
}

pub async fn fetch_asset_contacts(
    asset_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetContacts>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT a.id AS asset_id,
            s.id AS seller_id, s.name AS seller_name, su.id AS seller_user_id, su.email AS seller_email,
            su.first_name AS seller_first_name,
            b.id AS bill_to_party_id, b.name AS bill_to_party_name, b.email AS bill_to_party_email,
            bur.user_id AS bill_to_party_user_id
        FROM assets a
            JOIN asset_sellers s ON a.seller_id = s.id
            JOIN user_roles sur ON s.contact_id = sur.id
            JOIN users su ON sur.user_id = su.id
            JOIN bill_to_parties b ON a.bill_to_party_id = b.id
            LEFT JOIN user_roles bur ON b.contact_id = bur.id
        WHERE a.id = $1"#,
    )
    .bind(asset_id)
    .fetch_optional(conn)
    .await
}

pub async fn update_asset(asset_id: i64, update: AssetUpdate, conn: &mut SqliteConnection) -> Result<Asset, sqlx::Error> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for asset #{asset_id}");
        return fetch_asset(asset_id, conn).await?.ok_or(sqlx::Error::RowNotFound);
    }
    let mut builder = QueryBuilder::new("UPDATE assets SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(invoice_number) = update.invoice_number {
        set_clause.push("invoice_number = ");
        set_clause.push_bind_unseparated(invoice_number);
    }
    if let Some(invoice_date) = update.invoice_date {
        set_clause.push("invoice_date = ");
        set_clause.push_bind_unseparated(invoice_date);
    }
    if let Some(face_value) = update.face_value_in_cents {
        set_clause.push("face_value_in_cents = ");
        set_clause.push_bind_unseparated(face_value);
    }
    if let Some(payment_date) = update.payment_date {
        set_clause.push("payment_date = ");
        set_clause.push_bind_unseparated(payment_date);
    }
    if let Some(term_months) = update.term_months {
        set_clause.push("term_months = ");
        set_clause.push_bind_unseparated(term_months);
    }
    if let Some(apy) = update.apy {
        set_clause.push("apy = ");
        set_clause.push_bind_unseparated(apy);
    }
    if let Some(fees) = update.fees_in_cents {
        set_clause.push("fees_in_cents = ");
        set_clause.push_bind_unseparated(fees);
    }
    if let Some(bill_to_party_id) = update.bill_to_party_id {
        set_clause.push("bill_to_party_id = ");
        set_clause.push_bind_unseparated(bill_to_party_id);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(asset_id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let asset = builder.build_query_as().fetch_one(conn).await?;
    debug!("🗃️ Asset #{asset_id} updated");
    Ok(asset)
}

pub async fn set_asset_documents(
    asset_id: i64,
    documents: AssetDocuments,
    conn: &mut SqliteConnection,
) -> Result<Asset, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE assets SET
            invoice_file_path = COALESCE($1, invoice_file_path),
            bank_statement_file_path = COALESCE($2, bank_statement_file_path),
            bill_to_party_history_file_path = COALESCE($3, bill_to_party_history_file_path),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $4 RETURNING *"#,
    )
    .bind(documents.invoice_file_path)
    .bind(documents.bank_statement_file_path)
    .bind(documents.bill_to_party_history_file_path)
    .bind(asset_id)
    .fetch_one(conn)
    .await
}

pub async fn approve_fee(
    asset_id: i64,
    validation_token: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Asset, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE assets SET fee_approved_by_seller = 1, fee_approved_at = $1, bill_to_party_validation_token = $2,
        updated_at = CURRENT_TIMESTAMP
        WHERE id = $3 RETURNING *"#,
    )
    .bind(at)
    .bind(validation_token)
    .bind(asset_id)
    .fetch_one(conn)
    .await
}

pub async fn post_asset(asset_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Asset, sqlx::Error> {
    sqlx::query_as(
        "UPDATE assets SET is_posted = 1, posted_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(at)
    .bind(asset_id)
    .fetch_one(conn)
    .await
}

pub async fn cancel_asset(asset_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Asset, sqlx::Error> {
    sqlx::query_as(
        "UPDATE assets SET is_cancelled = 1, cancelled_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(at)
    .bind(asset_id)
    .fetch_one(conn)
    .await
}

/// Sets the validated flag if it is not already set. Returns `None` if nothing changed.
pub async fn mark_validated(asset_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Option<Asset>, sqlx::Error> {
    sqlx::query_as(
        r#"UPDATE assets SET validated_by_bill_to_party = 1, bill_to_party_validated_at = $1,
        updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND validated_by_bill_to_party = 0 RETURNING *"#,
    )
    .bind(at)
    .bind(asset_id)
    .fetch_optional(conn)
    .await
}
