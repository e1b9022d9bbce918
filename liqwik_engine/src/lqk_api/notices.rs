//! In-app notification content for each marketplace event.
//!
//! Amounts are formatted with [`Cents`]'s `Display` (e.g. `€50.50`). Every notice carries the role context it was
//! raised in, so users holding several roles only see the notices for the role they are acting in.
use liqwik_common::Cents;
use log::*;
use serde_json::json;

use crate::{
    db_types::{Asset, AssetBid, NewNotification, NotificationType, Role},
    traits::NotificationManagement,
};

/// Stores the notification, logging (and swallowing) any failure.
pub async fn notify<B: NotificationManagement>(db: &B, notification: NewNotification) {
    let user_id = notification.user_id;
    let kind = notification.notification_type;
    if let Err(e) = db.insert_notification(notification).await {
        warn!("🔄️🔔️ Could not store {kind:?} notification for user #{user_id}. {e}");
    }
}

pub fn asset_created(seller_user_id: i64, asset: &Asset, bill_to_party_name: &str) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::AssetCreated,
        "Asset Created Successfully",
        format!(
            "Your asset for {bill_to_party_name} (Invoice: {}) has been created successfully.",
            asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
    .with_metadata(json!({
        "invoiceNumber": asset.invoice_number,
        "billToPartyName": bill_to_party_name,
        "faceValue": asset.face_value_in_cents.as_currency_units(),
        "paymentDate": asset.payment_date,
    }))
}

pub fn asset_updated(seller_user_id: i64, asset: &Asset) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::AssetUpdated,
        "Asset Updated",
        format!("Your asset (Invoice: {}) has been updated.", asset.invoice_number),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
}

pub fn fee_approved(seller_user_id: i64, asset: &Asset) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::FeeApproved,
        "Fee Approved",
        format!(
            "Fee of {} has been approved for asset (Invoice: {}).",
            asset.fees_in_cents, asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
    .with_metadata(json!({
        "feeAmount": asset.fees_in_cents.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
        "faceValue": asset.face_value_in_cents.as_currency_units(),
        "approvedAt": asset.fee_approved_at,
    }))
}

pub fn bill_to_party_validated(seller_user_id: i64, asset: &Asset, bill_to_party_name: &str) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::BillToPartyValidated,
        "Asset Validated by Bill-To Party",
        format!(
            "{bill_to_party_name} has validated your asset (Invoice: {}). You can now post the token.",
            asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
    .with_metadata(json!({
        "invoiceNumber": asset.invoice_number,
        "billToPartyName": bill_to_party_name,
        "faceValue": asset.face_value_in_cents.as_currency_units(),
        "validatedAt": asset.bill_to_party_validated_at,
    }))
}

pub fn asset_posted(seller_user_id: i64, asset: &Asset) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::AssetPosted,
        "Asset Posted to Liqwik",
        format!(
            "Your asset (Invoice: {}) has been posted to Liqwik and is now visible in your portfolio.",
            asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
}

pub fn asset_cancelled(seller_user_id: i64, asset: &Asset) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::AssetCancelled,
        "Asset Cancelled",
        format!("Your asset (Invoice: {}) has been cancelled and is no longer available.", asset.invoice_number),
    )
    .with_asset(asset.id)
    .with_role(Role::Seller)
}

pub fn bid_received(seller_user_id: i64, buyer_name: &str, asset: &Asset, bid: &AssetBid) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::BidReceived,
        "New Bid Received",
        format!(
            "{buyer_name} has placed a bid of {} on your asset (Invoice: {}).",
            bid.cents_per_unit, asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Seller)
    .with_metadata(json!({
        "buyerName": buyer_name,
        "bidAmount": bid.cents_per_unit.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
    }))
}

pub fn bid_saved(buyer_user_id: i64, asset: &Asset, bid: &AssetBid) -> NewNotification {
    NewNotification::new(
        buyer_user_id,
        NotificationType::BidSaved,
        "Bid Saved Successfully",
        format!(
            "Your bid of {} has been saved for asset (Invoice: {}).",
            bid.cents_per_unit, asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Buyer)
    .with_metadata(json!({
        "bidAmount": bid.cents_per_unit.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
    }))
}

/// The two notices raised when a bid is accepted: one for the winning buyer, one for the seller.
pub fn bid_accepted(
    buyer_user_id: i64,
    seller_user_id: i64,
    seller_name: &str,
    asset: &Asset,
    bid: &AssetBid,
) -> [NewNotification; 2] {
    let amount = bid.cents_per_unit;
    let metadata = json!({
        "bidAmount": amount.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
        "acceptedAt": bid.accepted_at,
        "paymentDeadline": bid.payment_deadline,
    });
    let buyer = NewNotification::new(
        buyer_user_id,
        NotificationType::BidAccepted,
        "Bid Accepted!",
        format!(
            "Congratulations! Your bid of {amount} for asset (Invoice: {}) has been accepted by {seller_name}.",
            asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Buyer)
    .with_metadata(metadata.clone());
    let seller = NewNotification::new(
        seller_user_id,
        NotificationType::BidAccepted,
        "Bid Accepted",
        format!("You have accepted a bid of {amount} for your asset (Invoice: {}).", asset.invoice_number),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Seller)
    .with_metadata(metadata);
    [buyer, seller]
}

pub fn bid_rejected(buyer_user_id: i64, asset: &Asset, bid: &AssetBid) -> NewNotification {
    NewNotification::new(
        buyer_user_id,
        NotificationType::BidRejected,
        "Bid Not Accepted",
        format!(
            "Your bid of {} for asset (Invoice: {}) was not accepted.",
            bid.cents_per_unit, asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Buyer)
}

/// The two notices raised when a buyer approves payment: a confirmation for the buyer, a receipt for the seller.
pub fn payment_made(buyer_user_id: i64, seller_user_id: i64, asset: &Asset, bid: &AssetBid) -> [NewNotification; 2] {
    let amount = bid.cents_per_unit;
    let buyer = NewNotification::new(
        buyer_user_id,
        NotificationType::PaymentMade,
        "Payment Confirmed",
        format!("Your payment of {amount} has been confirmed for asset (Invoice: {}).", asset.invoice_number),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Buyer)
    .with_metadata(json!({
        "paymentAmount": amount.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
        "paymentDate": bid.payment_approved_at,
    }));
    let seller = payment_received(seller_user_id, asset, bid.id, amount);
    [buyer, seller]
}

pub fn payment_received(seller_user_id: i64, asset: &Asset, bid_id: i64, amount: Cents) -> NewNotification {
    NewNotification::new(
        seller_user_id,
        NotificationType::PaymentMade,
        "Payment Received",
        format!("Payment of {amount} has been confirmed by buyer for asset (Invoice: {}).", asset.invoice_number),
    )
    .with_asset(asset.id)
    .with_bid(bid_id)
    .with_role(Role::Seller)
    .with_metadata(json!({
        "paymentAmount": amount.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
    }))
}

pub fn payment_overdue(buyer_user_id: i64, asset: &Asset, bid: &AssetBid) -> NewNotification {
    NewNotification::new(
        buyer_user_id,
        NotificationType::PaymentOverdue,
        "Payment Overdue",
        format!(
            "Your payment for asset (Invoice: {}) is now overdue. This contract has been disabled.",
            asset.invoice_number
        ),
    )
    .with_asset(asset.id)
    .with_bid(bid.id)
    .with_role(Role::Buyer)
    .with_metadata(json!({
        "bidAmount": bid.cents_per_unit.as_currency_units(),
        "invoiceNumber": asset.invoice_number,
        "paymentDeadline": bid.payment_deadline,
    }))
}

pub fn bill_to_party_payment_reminder(
    user_id: i64,
    asset_id: i64,
    invoice_number: &str,
    amount: Cents,
    days_until_due: i64,
    reminder_number: i64,
) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationType::BillToPartyPaymentReminder,
        format!("Payment Reminder #{reminder_number}"),
        format!("Reminder: Payment of {amount} due in {days_until_due} days for invoice {invoice_number}."),
    )
    .with_asset(asset_id)
    .with_role(Role::BillToParty)
}

pub fn bill_to_party_payment_overdue(
    user_id: i64,
    asset_id: i64,
    invoice_number: &str,
    days_overdue: i64,
) -> NewNotification {
    NewNotification::new(
        user_id,
        NotificationType::BillToPartyPaymentOverdue,
        "Payment Overdue",
        format!("Your payment for invoice {invoice_number} is overdue by {days_overdue} days."),
    )
    .with_asset(asset_id)
    .with_role(Role::BillToParty)
}
