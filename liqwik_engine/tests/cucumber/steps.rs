use chrono::{Duration, Utc};
use cucumber::{then, when};
use liqwik_common::Cents;
use liqwik_engine::{
    asset_objects::NewAssetRequest,
    bid_objects::{BidRequest, SellerBidAction},
    traits::PaymentTracking,
};

use crate::cucumber::MarketplaceWorld;

#[when(expr = "{word} lists invoice {word} for {float} billed to {string} due in {int} days")]
async fn list_invoice(world: &mut MarketplaceWorld, seller: String, invoice: String, value: f64, btp: String, days: i64) {
    let btp_id = world.bill_to_parties.get(&btp).unwrap_or_else(|| panic!("No bill-to party {btp}")).id;
    let req = NewAssetRequest {
        invoice_number: invoice.clone(),
        invoice_date: Some(Utc::now().date_naive()),
        face_value: Some(value),
        payment_date: Some((Utc::now() + Duration::days(days)).date_naive()),
        term_months: Some(3),
        apy: Some(7.5),
        fees: Some(10.0),
        bill_to_party_id: Some(btp_id),
    };
    let user_id = world.participant(&seller).id();
    let result = world.sys().assets.create_asset(user_id, req, vec![]).await;
    if let Some(view) = world.record(result) {
        world.assets.insert(invoice, view.asset.id);
    }
}

#[when(expr = "{word} approves the fee for invoice {word}")]
async fn approve_fee(world: &mut MarketplaceWorld, seller: String, invoice: String) {
    let user_id = world.participant(&seller).id();
    let result = world.sys().assets.approve_fee(user_id, world.asset_id(&invoice)).await;
    world.record(result);
}

#[when(expr = "the bill-to party validates invoice {word}")]
async fn validate(world: &mut MarketplaceWorld, invoice: String) {
    let token = world.asset(&invoice).await.bill_to_party_validation_token.expect("No validation token");
    let result = world.sys().assets.validate_bill_to_party(&token).await;
    world.record(result);
}

#[when(expr = "{word} posts invoice {word}")]
async fn post(world: &mut MarketplaceWorld, seller: String, invoice: String) {
    let user_id = world.participant(&seller).id();
    let result = world.sys().assets.post_asset(user_id, world.asset_id(&invoice)).await;
    world.record(result);
}

#[when(expr = "{word} cancels invoice {word}")]
async fn cancel(world: &mut MarketplaceWorld, seller: String, invoice: String) {
    let user_id = world.participant(&seller).id();
    let result = world.sys().assets.cancel_asset(user_id, world.asset_id(&invoice)).await;
    world.record(result);
}

#[when(expr = "{word} bids {float} on invoice {word}")]
async fn bid(world: &mut MarketplaceWorld, buyer: String, amount: f64, invoice: String) {
    let user_id = world.participant(&buyer).id();
    let req = BidRequest { total_amount: Some(amount) };
    let result = world.sys().bids.place_bid(user_id, world.asset_id(&invoice), req).await;
    world.record(result);
}

#[when(expr = "{word} {word}s the bid by {word} on invoice {word}")]
async fn seller_action(world: &mut MarketplaceWorld, seller: String, action: String, buyer: String, invoice: String) {
    let bid = world.bid(&buyer, &invoice).await;
    let user_id = world.participant(&seller).id();
    let req = SellerBidAction { bid_id: bid.id, action };
    let result = world.sys().bids.seller_action(user_id, world.asset_id(&invoice), req).await;
    world.record(result);
}

#[when(expr = "{word} approves payment for invoice {word}")]
async fn approve_payment(world: &mut MarketplaceWorld, buyer: String, invoice: String) {
    let token = world.bid(&buyer, &invoice).await.payment_approval_token.expect("No approval token");
    let result = world.sys().bids.approve_payment_by_token(&token).await;
    world.record(result);
}

#[when(expr = "the payment sweep runs {int} days from now")]
async fn sweep(world: &mut MarketplaceWorld, days: i64) {
    let result = world.sys().tracking.run_sweep_at(Utc::now() + Duration::days(days)).await;
    world.record(result);
}

#[when(expr = "the payment sweep runs {int} hours from now")]
async fn sweep_hours(world: &mut MarketplaceWorld, hours: i64) {
    let result = world.sys().tracking.run_sweep_at(Utc::now() + Duration::hours(hours)).await;
    world.record(result);
}

#[then(expr = "invoice {word} has a face value of {int} cents")]
async fn face_value(world: &mut MarketplaceWorld, invoice: String, cents: i64) {
    assert_eq!(world.asset(&invoice).await.face_value_in_cents, Cents::from(cents));
}

#[then(expr = "invoice {word} has status {word}")]
async fn asset_status(world: &mut MarketplaceWorld, invoice: String, status: String) {
    let asset = world.asset(&invoice).await;
    assert_eq!(format!("{:?}", asset.status()).to_lowercase(), status.to_lowercase());
}

#[then(expr = "invoice {word} is validated")]
async fn validated(world: &mut MarketplaceWorld, invoice: String) {
    assert!(world.asset(&invoice).await.validated_by_bill_to_party);
}

#[then(expr = "the bid by {word} on invoice {word} is {int} cents")]
async fn bid_amount(world: &mut MarketplaceWorld, buyer: String, invoice: String, cents: i64) {
    assert_eq!(world.bid(&buyer, &invoice).await.total(), Cents::from(cents));
}

#[then(expr = "the bid by {word} on invoice {word} is {word}")]
async fn bid_state(world: &mut MarketplaceWorld, buyer: String, invoice: String, state: String) {
    let bid = world.bid(&buyer, &invoice).await;
    match state.as_str() {
        "accepted" => assert!(bid.accepted && !bid.rejected, "{bid:?}"),
        "rejected" => assert!(bid.rejected && !bid.accepted, "{bid:?}"),
        "open" => assert!(!bid.accepted && !bid.rejected, "{bid:?}"),
        "lapsed" => assert!(bid.is_overdue && !bid.accepted, "{bid:?}"),
        "approved" => assert!(bid.payment_approved_by_buyer, "{bid:?}"),
        _ => panic!("Unknown bid state {state}"),
    }
}

#[then(expr = "the request fails with {string}")]
async fn request_failed(world: &mut MarketplaceWorld, message: String) {
    let err = world.last_error.as_deref().expect("The last request succeeded");
    assert_eq!(err, message);
}

#[then(expr = "the request succeeds")]
async fn request_succeeded(world: &mut MarketplaceWorld) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
}

#[then(expr = "{int} {word} email(s) was/were sent")]
async fn emails_sent(world: &mut MarketplaceWorld, count: usize, kind: String) {
    let n = world.sys().mailer.sent().iter().filter(|m| format!("{:?}", m.kind) == kind).count();
    assert_eq!(n, count, "{kind} emails");
}

#[then(expr = "{word} has {int} unread notification(s)")]
async fn unread(world: &mut MarketplaceWorld, name: String, count: i64) {
    let user_id = world.participant(&name).id();
    let list = world.sys().notifications.notifications(user_id, None, None).await.expect("Could not fetch notifications");
    assert_eq!(list.unread_count, count);
}

#[then(expr = "there is {int} unpaid payment(s)")]
async fn unpaid(world: &mut MarketplaceWorld, count: usize) {
    let payments = world.sys().db.fetch_unpaid_payments().await.expect("DB error");
    assert_eq!(payments.len(), count);
}

#[then(expr = "{int} reminder(s) has/have been recorded for invoice {word}")]
async fn reminders(world: &mut MarketplaceWorld, count: i64, invoice: String) {
    let asset_id = world.asset_id(&invoice);
    let payments = world.sys().db.fetch_unpaid_payments().await.expect("DB error");
    let p = payments.iter().find(|p| p.payment.asset_id == asset_id).expect("No unpaid payment for invoice");
    assert_eq!(p.payment.reminders_sent, count);
}
