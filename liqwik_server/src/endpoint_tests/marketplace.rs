use actix_web::{http::StatusCode, test::TestRequest};
use liqwik_engine::{
    db_types::Role,
    test_utils::{create_bill_to_party, create_user_with_role},
    traits::BidManagement,
};
use serde_json::{json, Value};

use super::helpers::*;

#[actix_web::test]
async fn seller_routes_need_the_seller_role() {
    let _ = env_logger::try_init();
    let market = TestMarketplace::new().await;
    let bob = create_user_with_role(&market.db, "bob", Role::Buyer).await;
    let token = issue_token(bob.id(), &[Role::Buyer]);
    let req = TestRequest::get().uri(&format!("/api/sellers/{}/assets", bob.id())).insert_header(bearer(&token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("requires the seller role"), "{body}");
}

#[actix_web::test]
async fn users_only_see_their_own_assets() {
    let market = TestMarketplace::new().await;
    let sally = create_user_with_role(&market.db, "sally", Role::Seller).await;
    let token = issue_token(sally.id(), &[Role::Seller]);
    let req = TestRequest::get().uri(&format!("/api/sellers/{}/assets", sally.id() + 100)).insert_header(bearer(&token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"You may only access your own data"}"#);

    let req = TestRequest::get().uri(&format!("/api/sellers/{}/assets", sally.id())).insert_header(bearer(&token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn incomplete_assets_are_rejected() {
    let market = TestMarketplace::new().await;
    let sally = create_user_with_role(&market.db, "sally", Role::Seller).await;
    let token = issue_token(sally.id(), &[Role::Seller]);
    let req = TestRequest::post()
        .uri(&format!("/api/sellers/{}/assets", sally.id()))
        .insert_header(bearer(&token))
        .set_json(json!({"invoiceNumber": "INV-1", "faceValue": 10.0}));
    let (status, _) = market.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(market.store.paths().is_empty());
}

#[actix_web::test]
async fn asset_from_upload_to_paid_approval() {
    let _ = env_logger::try_init();
    let market = TestMarketplace::new().await;
    let sally = create_user_with_role(&market.db, "sally", Role::Seller).await;
    let bob = create_user_with_role(&market.db, "bob", Role::Buyer).await;
    let acme = create_bill_to_party(&market.db, "Acme Mining", None).await;
    let seller_token = issue_token(sally.id(), &[Role::Seller]);
    let buyer_token = issue_token(bob.id(), &[Role::Buyer]);

    // Create the asset with its invoice
    let invoice = format!("data:application/pdf;base64,{}", base64::encode(b"%PDF-1.4 pretend invoice"));
    let req = TestRequest::post()
        .uri(&format!("/api/sellers/{}/assets", sally.id()))
        .insert_header(bearer(&seller_token))
        .set_json(json!({
            "invoiceNumber": "INV-2042",
            "invoiceDate": "2026-09-01",
            "faceValue": 1000.0,
            "paymentDate": "2027-03-01",
            "termMonths": 6,
            "apy": 12.5,
            "fees": 25.0,
            "billToPartyId": acme.id,
            "invoice": {"fileName": "invoice.pdf", "contentType": "application/pdf", "data": invoice},
        }));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body.contains(r#""faceValueInCents":100000"#), "{body}");
    assert!(body.contains("INV-2042"));
    let asset: Value = serde_json::from_str(&body).unwrap();
    let asset_id = asset["id"].as_i64().unwrap();
    assert_eq!(market.store.paths().len(), 1);

    let req = TestRequest::get().uri(&format!("/api/assets/{asset_id}/documents")).insert_header(bearer(&seller_token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Invoice_INV-2042"), "{body}");

    // Buyers cannot see the documents of an asset that has not been posted
    let req = TestRequest::get().uri(&format!("/api/assets/{asset_id}/documents")).insert_header(bearer(&buyer_token));
    let (status, _) = market.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Posting needs the fee to be approved first
    let post = format!("/api/sellers/{}/assets/{asset_id}/post", sally.id());
    let (status, _) = market.send(TestRequest::post().uri(&post).insert_header(bearer(&seller_token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let approve = format!("/api/sellers/{}/assets/{asset_id}/approve-fee", sally.id());
    let (status, body) = market.send(TestRequest::post().uri(&approve).insert_header(bearer(&seller_token))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""feeApprovedBySeller":true"#));

    let (status, body) = market.send(TestRequest::post().uri(&post).insert_header(bearer(&seller_token))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""isPosted":true"#));

    // Bob bids on it
    let bids = format!("/api/buyers/{}/assets/{asset_id}/bids", bob.id());
    let req = TestRequest::post().uri(&bids).insert_header(bearer(&buyer_token)).set_json(json!({"totalAmount": 50.5}));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body.contains(r#""centsPerUnit":5050"#), "{body}");
    assert!(!body.contains("paymentApprovalToken"));
    let bid: Value = serde_json::from_str(&body).unwrap();
    let bid_id = bid["id"].as_i64().unwrap();

    // Sally accepts the bid
    let req = TestRequest::post()
        .uri(&format!("/api/sellers/{}/assets/{asset_id}/bids", sally.id()))
        .insert_header(bearer(&seller_token))
        .set_json(json!({"bidId": bid_id, "action": "accept"}));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""accepted":true"#), "{body}");

    // Bob follows the link in his email. Only the first visit approves the payment.
    let token = market.db.fetch_bid(bid_id).await.unwrap().and_then(|b| b.payment_approval_token).unwrap();
    let link = format!("/api/approve-payment/{token}");
    let (status, page) = market.send(TestRequest::get().uri(&link)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Payment approved"), "{page}");
    let (status, page) = market.send(TestRequest::get().uri(&link)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Payment already approved"), "{page}");

    let req = TestRequest::get().uri(&format!("/api/buyers/{}/bids", bob.id())).insert_header(bearer(&buyer_token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""paymentApprovedByBuyer":true"#), "{body}");
}

#[actix_web::test]
async fn unknown_token_links_render_an_error_page() {
    let market = TestMarketplace::new().await;
    let (status, page) = market.send(TestRequest::get().uri("/api/approve-payment/not-a-real-token")).await;
    assert!(status.is_client_error());
    assert!(page.contains("Payment could not be approved"), "{page}");
    assert!(page.starts_with("<!DOCTYPE html>"), "{page}");
}
