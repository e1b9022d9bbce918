use chrono::{DateTime, Utc};
use liqwik_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{AcceptedBid, AssetBid, BillToPartyPayment, NewBid, NewBillToPartyPayment, OrgType},
    traits::{AssetApiError, OrganizationError, TokenOutcome},
};

#[derive(Debug, Clone, Error)]
pub enum BidApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User is not associated with an {}", .0.label())]
    NotAnOrgMember(OrgType),
    #[error("Asset not found")]
    AssetNotFound,
    #[error("Bid not found")]
    BidNotFound,
    #[error("You do not have permission to access this asset")]
    Forbidden,
    #[error("Asset is not open for bidding")]
    AssetNotOpen,
    #[error("Total amount must be greater than zero")]
    InvalidAmount,
    #[error("Bid has already been accepted")]
    BidAlreadyAccepted,
    #[error("Payment has already been approved for this bid")]
    PaymentAlreadyApproved,
    #[error("This bid has lapsed and can no longer be accepted")]
    BidLapsed,
    #[error("Another bid has already been accepted for this asset")]
    AnotherBidAccepted,
    #[error("Bid has not been accepted")]
    BidNotAccepted,
    #[error("Invalid action")]
    InvalidAction,
    #[error("Invalid or Expired Token")]
    InvalidPaymentToken,
    #[error("Payment Deadline Passed")]
    PaymentDeadlinePassed,
    #[error("paymentApproved must be true. An approval cannot be withdrawn")]
    PaymentApprovalRequired,
    #[error("{0}")]
    OrganizationError(OrganizationError),
}

impl From<sqlx::Error> for BidApiError {
    fn from(e: sqlx::Error) -> Self {
        BidApiError::DatabaseError(e.to_string())
    }
}

impl From<OrganizationError> for BidApiError {
    fn from(e: OrganizationError) -> Self {
        match e {
            OrganizationError::DatabaseError(s) => BidApiError::DatabaseError(s),
            e => BidApiError::OrganizationError(e),
        }
    }
}

impl From<AssetApiError> for BidApiError {
    fn from(e: AssetApiError) -> Self {
        match e {
            AssetApiError::DatabaseError(s) => BidApiError::DatabaseError(s),
            AssetApiError::AssetNotFound => BidApiError::AssetNotFound,
            AssetApiError::Forbidden => BidApiError::Forbidden,
            AssetApiError::NotAnOrgMember(t) => BidApiError::NotAnOrgMember(t),
            e => BidApiError::DatabaseError(e.to_string()),
        }
    }
}

/// The `BidManagement` trait defines how buyer bids are stored and how the seller's decisions on them are applied.
///
/// At most one bid per asset may be accepted at any time. Backends must enforce this atomically, not just by checking
/// first.
#[allow(async_fn_in_trait)]
pub trait BidManagement {
    async fn insert_bid(&self, bid: NewBid) -> Result<AssetBid, BidApiError>;

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<AssetBid>, BidApiError>;

    /// Bids on the asset, newest first.
    async fn fetch_bids_for_asset(&self, asset_id: i64) -> Result<Vec<AssetBid>, BidApiError>;

    /// Bids on any of the given assets, newest first.
    async fn fetch_bids_for_assets(&self, asset_ids: &[i64]) -> Result<Vec<AssetBid>, BidApiError>;

    /// Bids placed by any of the given buyers, newest first.
    async fn fetch_bids_for_buyers(&self, buyer_ids: &[i64]) -> Result<Vec<AssetBid>, BidApiError>;

    /// Changes the amount of a bid that has not been accepted.
    async fn update_bid_amount(&self, bid_id: i64, cents_per_unit: Cents) -> Result<AssetBid, BidApiError>;

    /// Accepts the bid and rejects every other bid on the asset, in one transaction.
    ///
    /// Fails with [`BidApiError::AnotherBidAccepted`] if a different bid on the asset is already accepted.
    async fn accept_bid(
        &self,
        bid_id: i64,
        payment_approval_token: &str,
        payment_deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<AcceptedBid, BidApiError>;

    /// Withdraws an acceptance and un-rejects the other bids on the asset (except lapsed ones).
    async fn cancel_bid_acceptance(&self, bid_id: i64) -> Result<AssetBid, BidApiError>;

    async fn reject_bid(&self, bid_id: i64, at: DateTime<Utc>) -> Result<AssetBid, BidApiError>;

    async fn fetch_bid_by_payment_token(&self, token: &str) -> Result<Option<AssetBid>, BidApiError>;

    /// Records the buyer's payment approval and creates the bill-to party payment, in one transaction. A bid whose
    /// payment was already approved is returned unchanged as [`TokenOutcome::AlreadyRedeemed`].
    async fn approve_bid_payment(
        &self,
        bid_id: i64,
        payment: NewBillToPartyPayment,
        at: DateTime<Utc>,
    ) -> Result<TokenOutcome<(AssetBid, Option<BillToPartyPayment>)>, BidApiError>;

    async fn set_payment_email_flags(
        &self,
        bid_id: i64,
        buyer_confirmation_sent: bool,
        seller_notification_sent: bool,
    ) -> Result<(), BidApiError>;
}
