use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use liqwik_common::Cents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Seller,
    Buyer,
    BillToParty,
    Admin,
}

impl Role {
    /// The organization type a user with this role acts for, if any.
    pub fn org_type(&self) -> Option<OrgType> {
        match self {
            Role::Seller => Some(OrgType::Seller),
            Role::Buyer => Some(OrgType::Buyer),
            Role::BillToParty | Role::Admin => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::Buyer => "buyer",
            Role::BillToParty => "billToParty",
            Role::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(Self::Seller),
            "buyer" => Ok(Self::Buyer),
            "billToParty" => Ok(Self::BillToParty),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

pub type Roles = Vec<Role>;

//--------------------------------------       OrgType       ---------------------------------------------------------
/// The organization variants a user can act for in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrgType {
    Seller,
    Buyer,
}

impl OrgType {
    pub fn role(&self) -> Role {
        match self {
            OrgType::Seller => Role::Seller,
            OrgType::Buyer => Role::Buyer,
        }
    }

    /// The human-readable name of the organization type, used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            OrgType::Seller => "Asset Seller",
            OrgType::Buyer => "Asset Buyer",
        }
    }
}

impl Display for OrgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrgType::Seller => write!(f, "sellers"),
            OrgType::Buyer => write!(f, "buyers"),
        }
    }
}

//--------------------------------------         User        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub is_email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub login_otp: Option<String>,
    #[serde(skip_serializing, default)]
    pub login_otp_expires_at: Option<DateTime<Utc>>,
    pub is_first_login: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       UserRole      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub is_role_verified: bool,
    #[serde(skip_serializing, default)]
    pub role_verification_code: Option<String>,
    #[serde(skip_serializing, default)]
    pub role_verification_expires_at: Option<DateTime<Utc>>,
    pub role_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Organizations    ---------------------------------------------------------
/// KYB details captured when a seller organization registers. All fields are optional.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerKyb {
    pub legal_business_name: Option<String>,
    pub registration_number: Option<String>,
    pub tax_identification_number: Option<String>,
    pub business_type: Option<String>,
    pub industry_sector: Option<String>,
    pub date_of_incorporation: Option<NaiveDate>,
    pub business_bank_account_details: Option<String>,
    pub authorized_signatory_details: Option<String>,
    pub country_of_incorporation: Option<String>,
    pub registered_business_address: Option<String>,
    pub operating_address: Option<String>,
    pub website_url: Option<String>,
    pub list_of_directors: Option<String>,
    pub ultimate_beneficial_owners: Option<String>,
    pub shareholding_structure: Option<String>,
}

/// Company information captured when a buyer organization registers. All fields are optional.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerKyb {
    pub company_name: Option<String>,
    pub business_type: Option<String>,
    pub industry_sector: Option<String>,
    pub business_registration_number: Option<String>,
    pub tax_identification_number: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub company_website: Option<String>,
    pub preferred_payment_method: Option<String>,
    pub bank_details: Option<String>,
    pub purchase_order_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OrganizationDetails {
    Seller(SellerKyb),
    Buyer(BuyerKyb),
}

impl OrganizationDetails {
    pub fn org_type(&self) -> OrgType {
        match self {
            OrganizationDetails::Seller(_) => OrgType::Seller,
            OrganizationDetails::Buyer(_) => OrgType::Buyer,
        }
    }
}

/// A seller or buyer organization together with the user that acts as its contact.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub contact_id: i64,
    pub contact_user_id: i64,
}

/// Everything needed to notify or email the person behind an organization.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgContact {
    pub org_id: i64,
    pub org_name: String,
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillToParty {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub contact_id: Option<i64>,
    /// The user behind `contact_id`, if any. Populated by a join.
    pub contact_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBillToParty {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub contact_id: Option<i64>,
}

//--------------------------------------        Asset        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub face_value_in_cents: Cents,
    pub payment_date: NaiveDate,
    pub term_months: i64,
    pub apy: f64,
    pub fees_in_cents: Cents,
    pub seller_id: i64,
    pub bill_to_party_id: i64,
    pub fee_approved_by_seller: bool,
    pub fee_approved_at: Option<DateTime<Utc>>,
    pub bill_to_party_validation_token: Option<String>,
    pub validated_by_bill_to_party: bool,
    pub bill_to_party_validated_at: Option<DateTime<Utc>>,
    pub is_posted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub invoice_file_path: Option<String>,
    pub bank_statement_file_path: Option<String>,
    pub bill_to_party_history_file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Whole days from `today` until the payment date. Negative once the payment date has passed.
    pub fn days_until_payment(&self, today: NaiveDate) -> i64 {
        (self.payment_date - today).num_days()
    }

    pub fn status(&self) -> AssetStatus {
        if self.is_cancelled {
            AssetStatus::Cancelled
        } else if self.is_posted {
            AssetStatus::Posted
        } else if self.validated_by_bill_to_party {
            AssetStatus::Validated
        } else if self.fee_approved_by_seller {
            AssetStatus::FeeApproved
        } else {
            AssetStatus::Draft
        }
    }

    pub fn is_editable(&self) -> bool {
        !self.is_posted && !self.is_cancelled
    }

    pub fn is_open_for_bids(&self) -> bool {
        self.is_posted && !self.is_cancelled
    }
}

/// A coarse summary of the asset workflow flags. The flags themselves remain the source of truth, since cancellation
/// keeps earlier flags as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetStatus {
    Draft,
    FeeApproved,
    Validated,
    Posted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub face_value_in_cents: Cents,
    pub payment_date: NaiveDate,
    pub term_months: i64,
    pub apy: f64,
    pub fees_in_cents: Cents,
    pub seller_id: i64,
    pub bill_to_party_id: i64,
}

/// Editable asset fields. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUpdate {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub face_value_in_cents: Option<Cents>,
    pub payment_date: Option<NaiveDate>,
    pub term_months: Option<i64>,
    pub apy: Option<f64>,
    pub fees_in_cents: Option<Cents>,
    pub bill_to_party_id: Option<i64>,
}

impl AssetUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentType {
    Invoice,
    BankStatement,
    BillToPartyHistory,
}

impl DocumentType {
    /// The prefix used for stored file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::BankStatement => "bankStatement",
            DocumentType::BillToPartyHistory => "billToPartyHistory",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "Invoice",
            DocumentType::BankStatement => "Bank Statement",
            DocumentType::BillToPartyHistory => "Bill-To Party History",
        }
    }
}

/// Stored document paths for an asset. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDocuments {
    pub invoice_file_path: Option<String>,
    pub bank_statement_file_path: Option<String>,
    pub bill_to_party_history_file_path: Option<String>,
}

impl AssetDocuments {
    pub fn set(&mut self, doc_type: DocumentType, path: String) {
        match doc_type {
            DocumentType::Invoice => self.invoice_file_path = Some(path),
            DocumentType::BankStatement => self.bank_statement_file_path = Some(path),
            DocumentType::BillToPartyHistory => self.bill_to_party_history_file_path = Some(path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn paths(&self) -> Vec<&str> {
        [&self.invoice_file_path, &self.bank_statement_file_path, &self.bill_to_party_history_file_path]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Names, emails and user ids of the two counterparties of an asset.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContacts {
    pub asset_id: i64,
    pub seller_id: i64,
    pub seller_name: String,
    pub seller_user_id: i64,
    pub seller_email: String,
    pub seller_first_name: String,
    pub bill_to_party_id: i64,
    pub bill_to_party_name: String,
    pub bill_to_party_email: String,
    pub bill_to_party_user_id: Option<i64>,
}

//--------------------------------------       AssetBid      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBid {
    pub id: i64,
    pub asset_id: i64,
    pub buyer_id: i64,
    pub num_units: i64,
    pub cents_per_unit: Cents,
    pub accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected: bool,
    pub rejected_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub payment_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub payment_approval_token: Option<String>,
    pub payment_approved_by_buyer: bool,
    pub payment_approved_at: Option<DateTime<Utc>>,
    pub payment_confirmation_email_sent: bool,
    pub seller_payment_notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetBid {
    pub fn total(&self) -> Cents {
        self.cents_per_unit * self.num_units
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBid {
    pub asset_id: i64,
    pub buyer_id: i64,
    pub num_units: i64,
    pub cents_per_unit: Cents,
}

/// The outcome of accepting a bid: the winning bid and every bid that was rejected as a consequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedBid {
    pub bid: AssetBid,
    pub rejected: Vec<AssetBid>,
}

//--------------------------------------  BillToPartyPayment  -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillToPartyPayment {
    pub id: i64,
    pub asset_id: i64,
    pub bid_id: i64,
    pub bill_to_party_id: i64,
    pub amount_in_cents: Cents,
    pub due_date: DateTime<Utc>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub overdue_notification_sent: bool,
    pub reminders_sent: i64,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub next_reminder_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBillToPartyPayment {
    pub asset_id: i64,
    pub bid_id: i64,
    pub bill_to_party_id: i64,
    pub amount_in_cents: Cents,
    pub due_date: DateTime<Utc>,
    pub next_reminder_due_at: DateTime<Utc>,
}

/// An unpaid payment joined with the names and addresses the tracking sweep needs for its emails and notifications.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TrackedPayment {
    #[sqlx(flatten)]
    pub payment: BillToPartyPayment,
    pub invoice_number: String,
    pub bill_to_party_name: String,
    pub bill_to_party_email: String,
    pub bill_to_party_user_id: Option<i64>,
    pub buyer_name: String,
}

//--------------------------------------     Notification    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AssetCreated,
    AssetUpdated,
    BidReceived,
    BidAccepted,
    BidRejected,
    BidSaved,
    PaymentMade,
    PaymentOverdue,
    FeeApproved,
    BillToPartyValidated,
    AssetPosted,
    AssetCancelled,
    BillToPartyPaymentReminder,
    BillToPartyPaymentOverdue,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub asset_id: Option<i64>,
    pub bid_id: Option<i64>,
    pub metadata: Option<sqlx::types::Json<serde_json::Value>>,
    pub role_context: Option<Role>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub asset_id: Option<i64>,
    pub bid_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub role_context: Option<Role>,
}

impl NewNotification {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        user_id: i64,
        notification_type: NotificationType,
        title: S1,
        message: S2,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            asset_id: None,
            bid_id: None,
            metadata: None,
            role_context: None,
        }
    }

    pub fn with_asset(mut self, asset_id: i64) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    pub fn with_bid(mut self, bid_id: i64) -> Self {
        self.bid_id = Some(bid_id);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role_context = Some(role);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid role: {value}. But this conversion cannot fail. Defaulting to Buyer");
            Role::Buyer
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Seller, Role::Buyer, Role::BillToParty, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("bill-to-party".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::BillToParty).unwrap(), r#""billToParty""#);
    }

    #[test]
    fn notification_types_use_screaming_snake_case() {
        let s = serde_json::to_string(&NotificationType::BillToPartyPaymentReminder).unwrap();
        assert_eq!(s, r#""BILL_TO_PARTY_PAYMENT_REMINDER""#);
    }

    #[test]
    fn asset_documents_paths() {
        let mut docs = AssetDocuments::default();
        assert!(docs.is_empty());
        docs.set(DocumentType::BankStatement, "uploads/assets/1/bankStatement_1.pdf".into());
        assert_eq!(docs.paths(), vec!["uploads/assets/1/bankStatement_1.pdf"]);
    }
}
