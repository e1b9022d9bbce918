use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use liqwik_engine::{db_types::Role, test_utils::create_user_with_role, traits::UserManagement};
use serde_json::json;

use super::helpers::*;
use crate::{auth::TokenIssuer, data_objects::SessionToken};

#[actix_web::test]
async fn health_check() {
    let market = TestMarketplace::new().await;
    let (status, body) = market.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn login_otp_issues_a_session_token() {
    let market = TestMarketplace::new().await;
    let sally = create_user_with_role(&market.db, "sally", Role::Seller).await;
    market.db.set_login_otp(sally.id(), Some(("424242", Utc::now() + Duration::minutes(10)))).await.unwrap();

    let req = TestRequest::post()
        .uri("/api/auth/verify-login-otp")
        .set_json(json!({"userId": sally.id(), "otp": "424242"}));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let session: SessionToken = serde_json::from_str(&body).unwrap();
    let claims = TokenIssuer::new(&get_auth_config()).validate_token(&session.token).unwrap();
    assert_eq!(claims, session.claims);
    assert_eq!(claims.sub, sally.id());
    assert_eq!(claims.roles, vec![Role::Seller]);
    assert_eq!(claims.selected_role, Some(Role::Seller));
    assert_eq!(claims.selected_user_role_id, Some(sally.user_role.id));

    // The password is single use
    let req = TestRequest::post()
        .uri("/api/auth/verify-login-otp")
        .set_json(json!({"userId": sally.id(), "otp": "424242"}));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn expired_login_otp_is_rejected() {
    let market = TestMarketplace::new().await;
    let bob = create_user_with_role(&market.db, "bob", Role::Buyer).await;
    market.db.set_login_otp(bob.id(), Some(("111111", Utc::now() - Duration::minutes(1)))).await.unwrap();
    let req =
        TestRequest::post().uri("/api/auth/verify-login-otp").set_json(json!({"userId": bob.id(), "otp": "111111"}));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("expired"), "{body}");
}

#[actix_web::test]
async fn session_routes_need_a_token() {
    let market = TestMarketplace::new().await;
    let (status, body) = market.send(TestRequest::get().uri("/api/auth/check-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication required"}"#);

    let req = TestRequest::get().uri("/api/auth/check-token").insert_header(bearer("made up nonsense"));
    let (status, _) = market.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri("/api/auth/check-token").insert_header(bearer(&issue_token(7, &[Role::Buyer])));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""sub":7"#), "{body}");
}

#[actix_web::test]
async fn first_login_is_tracked() {
    let market = TestMarketplace::new().await;
    let sally = create_user_with_role(&market.db, "sally", Role::Seller).await;
    let token = issue_token(sally.id(), &[Role::Seller]);

    let req = TestRequest::get().uri("/api/auth/check-first-login").insert_header(bearer(&token));
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"isFirstLogin":true}"#);

    let req = TestRequest::post().uri("/api/auth/mark-not-first-login").insert_header(bearer(&token));
    let (status, _) = market.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri("/api/auth/check-first-login").insert_header(bearer(&token));
    let (_, body) = market.send(req).await;
    assert_eq!(body, r#"{"isFirstLogin":false}"#);
}

#[actix_web::test]
async fn malformed_bodies_are_bad_requests() {
    let market = TestMarketplace::new().await;
    let req = TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json");
    let (status, body) = market.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request body"#), "{body}");
}
