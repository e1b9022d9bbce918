//! Seller and buyer organizations, and the bill-to party directory.
//!
//! Seller and buyer organizations live in separate tables with the same core columns, so the queries here are
//! parameterised on [`OrgType`] via [`org_table`].
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{BillToParty, BuyerKyb, NewBillToParty, OrgContact, OrgType, Organization, SellerKyb};

pub fn org_table(org_type: OrgType) -> &'static str {
    match org_type {
        OrgType::Seller => "asset_sellers",
        OrgType::Buyer => "asset_buyers",
    }
}

pub async fn org_name_exists(org_type: OrgType, name: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let q = format!("SELECT COUNT(*) FROM {} WHERE name = $1", org_table(org_type));
    let count: i64 = sqlx::query_scalar(&q).bind(name).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn insert_seller(
    name: &str,
    address: &str,
    contact_id: i64,
    kyb: &SellerKyb,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO asset_sellers (name, address, contact_id, legal_business_name, registration_number,
        tax_identification_number, business_type, industry_sector, date_of_incorporation,
        business_bank_account_details, authorized_signatory_details, country_of_incorporation,
        registered_business_address, operating_address, website_url, list_of_directors, ultimate_beneficial_owners,
        shareholding_structure)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) RETURNING id"#,
    )
    .bind(name)
    .bind(address)
    .bind(contact_id)
    .bind(&kyb.legal_business_name)
    .bind(&kyb.registration_number)
    .bind(&kyb.tax_identification_number)
    .bind(&kyb.business_type)
    .bind(&kyb.industry_sector)
    .bind(kyb.date_of_incorporation)
    .bind(&kyb.business_bank_account_details)
    .bind(&kyb.authorized_signatory_details)
    .bind(&kyb.country_of_incorporation)
    .bind(&kyb.registered_business_address)
    .bind(&kyb.operating_address)
    .bind(&kyb.website_url)
    .bind(&kyb.list_of_directors)
    .bind(&kyb.ultimate_beneficial_owners)
    .bind(&kyb.shareholding_structure)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Asset seller #{id} ({name}) created");
    Ok(id)
}

pub async fn insert_buyer(
    name: &str,
    address: &str,
    contact_id: i64,
    kyb: &BuyerKyb,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO asset_buyers (name, address, contact_id, company_name, business_type, industry_sector,
        business_registration_number, tax_identification_number, billing_address, shipping_address, company_website,
        preferred_payment_method, bank_details, purchase_order_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING id"#,
    )
    .bind(name)
    .bind(address)
    .bind(contact_id)
    .bind(&kyb.company_name)
    .bind(&kyb.business_type)
    .bind(&kyb.industry_sector)
    .bind(&kyb.business_registration_number)
    .bind(&kyb.tax_identification_number)
    .bind(&kyb.billing_address)
    .bind(&kyb.shipping_address)
    .bind(&kyb.company_website)
    .bind(&kyb.preferred_payment_method)
    .bind(&kyb.bank_details)
    .bind(&kyb.purchase_order_number)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Asset buyer #{id} ({name}) created");
    Ok(id)
}

/// Organizations of the given type whose contact is a verified role of `user_id`.
pub async fn fetch_orgs_for_user(
    user_id: i64,
    org_type: OrgType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Organization>, sqlx::Error> {
    let q = format!(
        r#"SELECT o.id, o.name, o.contact_id, ur.user_id AS contact_user_id
        FROM {} o JOIN user_roles ur ON o.contact_id = ur.id
        WHERE ur.user_id = $1 AND ur.role = $2 AND ur.is_role_verified = 1
        ORDER BY o.id"#,
        org_table(org_type)
    );
    sqlx::query_as(&q).bind(user_id).bind(org_type.role()).fetch_all(conn).await
}

pub async fn fetch_org_contact(
    org_type: OrgType,
    org_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrgContact>, sqlx::Error> {
    let q = format!(
        r#"SELECT o.id AS org_id, o.name AS org_name, u.id AS user_id, u.email, u.first_name
        FROM {} o JOIN user_roles ur ON o.contact_id = ur.id JOIN users u ON ur.user_id = u.id
        WHERE o.id = $1"#,
        org_table(org_type)
    );
    sqlx::query_as(&q).bind(org_id).fetch_optional(conn).await
}

const BILL_TO_PARTY_SELECT: &str = r#"SELECT b.id, b.name, b.email, b.address, b.contact_id,
    ur.user_id AS contact_user_id, b.created_at
    FROM bill_to_parties b LEFT JOIN user_roles ur ON b.contact_id = ur.id"#;

pub async fn fetch_bill_to_party(id: i64, conn: &mut SqliteConnection) -> Result<Option<BillToParty>, sqlx::Error> {
    let q = format!("{BILL_TO_PARTY_SELECT} WHERE b.id = $1");
    sqlx::query_as(&q).bind(id).fetch_optional(conn).await
}

pub async fn fetch_bill_to_parties(conn: &mut SqliteConnection) -> Result<Vec<BillToParty>, sqlx::Error> {
    let q = format!("{BILL_TO_PARTY_SELECT} ORDER BY b.name");
    sqlx::query_as(&q).fetch_all(conn).await
}

pub async fn insert_bill_to_party(btp: NewBillToParty, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO bill_to_parties (name, email, address, contact_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&btp.name)
    .bind(&btp.email)
    .bind(&btp.address)
    .bind(btp.contact_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Bill-to party #{id} ({}) created", btp.name);
    Ok(id)
}
