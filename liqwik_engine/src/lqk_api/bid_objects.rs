use std::str::FromStr;

use chrono::NaiveDate;
use liqwik_common::Cents;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Asset, AssetBid, BillToPartyPayment},
    traits::BidApiError,
};

/// A bid as entered by a buyer: the total amount offered for the asset, in currency units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BidRequest {
    pub total_amount: Option<f64>,
}

impl BidRequest {
    /// Bids are stored as a single unit, so the price per unit is the whole amount, rounded to the nearest cent.
    pub fn cents_per_unit(&self) -> Result<Cents, BidApiError> {
        let amount = self.total_amount.ok_or(BidApiError::InvalidAmount)?;
        let cents = Cents::from_currency_units(amount).map_err(|_| BidApiError::InvalidAmount)?;
        if !cents.is_positive() {
            return Err(BidApiError::InvalidAmount);
        }
        Ok(cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidAction {
    Accept,
    CancelAccept,
    Reject,
}

impl FromStr for BidAction {
    type Err = BidApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "cancel-accept" => Ok(Self::CancelAccept),
            "reject" => Ok(Self::Reject),
            _ => Err(BidApiError::InvalidAction),
        }
    }
}

/// A seller's decision on one of the bids on their asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerBidAction {
    pub bid_id: i64,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApprovalRequest {
    pub payment_approved: Option<bool>,
}

/// A posted asset as buyers see it on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceAsset {
    #[serde(flatten)]
    pub asset: Asset,
    pub face_value: f64,
    pub bill_to_party_name: Option<String>,
    pub num_days_for_payment: i64,
    pub bids: Vec<AssetBid>,
    /// Some bid on the asset lapsed without payment.
    pub has_overdue_bid: bool,
    /// A lapsed bid freed the asset and no other bid has been accepted since.
    pub can_accept_other_bids: bool,
}

impl MarketplaceAsset {
    pub fn new(asset: Asset, bill_to_party_name: Option<String>, bids: Vec<AssetBid>, today: NaiveDate) -> Self {
        let has_overdue_bid = bids.iter().any(|b| b.is_overdue);
        let has_active_accepted_bid = bids.iter().any(|b| b.accepted && !b.is_overdue);
        Self {
            face_value: asset.face_value_in_cents.as_currency_units(),
            num_days_for_payment: asset.days_until_payment(today),
            bill_to_party_name,
            has_overdue_bid,
            can_accept_other_bids: has_overdue_bid && !has_active_accepted_bid,
            bids,
            asset,
        }
    }
}

/// One of the buyer's accepted bids together with the asset it won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedBidView {
    #[serde(flatten)]
    pub bid: AssetBid,
    pub total_amount: f64,
    pub asset: Asset,
    pub seller_name: String,
    pub bill_to_party_name: String,
}

/// The result of a buyer approving payment on an accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApproval {
    pub bid: AssetBid,
    pub payment: Option<BillToPartyPayment>,
    /// `false` when payment had already been approved and nothing changed.
    pub newly_approved: bool,
}
