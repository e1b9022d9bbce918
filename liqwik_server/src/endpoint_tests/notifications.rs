use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Utc;
use liqwik_engine::{
    db_types::{Notification, NotificationType, Role},
    NotificationApi,
};
use serde_json::json;

use super::{helpers::*, mocks::MockNotificationManager};
use crate::{
    auth::TokenIssuer,
    middleware::JwtMiddlewareFactory,
    routes::{NotificationsRoute, UpdateNotificationsRoute},
    server::json_config,
};

fn bid_notice(id: i64, user_id: i64) -> Notification {
    Notification {
        id,
        user_id,
        notification_type: NotificationType::BidReceived,
        title: "New bid received".into(),
        message: "A bid of €50.50 was placed on invoice INV-2042".into(),
        asset_id: Some(1),
        bid_id: Some(id),
        metadata: None,
        role_context: Some(Role::Seller),
        is_read: false,
        read_at: None,
        created_at: Utc::now(),
    }
}

async fn send(mock: MockNotificationManager, req: TestRequest) -> (StatusCode, String) {
    let app = test::init_service(
        App::new()
            .app_data(json_config())
            .app_data(web::Data::new(TokenIssuer::new(&get_auth_config())))
            .app_data(web::Data::new(NotificationApi::new(mock)))
            .service(
                web::scope("/api")
                    .wrap(JwtMiddlewareFactory::new())
                    .service(NotificationsRoute::<MockNotificationManager>::new())
                    .service(UpdateNotificationsRoute::<MockNotificationManager>::new()),
            ),
    )
    .await;
    call(&app, req).await
}

#[actix_web::test]
async fn notifications_come_with_the_unread_count() {
    let _ = env_logger::try_init();
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications()
        .withf(|user_id, role, limit| *user_id == 3 && *role == Some(Role::Seller) && *limit == 50)
        .returning(|user_id, _, _| Ok(vec![bid_notice(2, user_id), bid_notice(1, user_id)]));
    mock.expect_count_unread_notifications().returning(|_, _| Ok(2));
    let req = TestRequest::get()
        .uri("/api/notifications/3?role=seller&limit=0")
        .insert_header(bearer(&issue_token(3, &[Role::Seller])));
    let (status, body) = send(mock, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""unreadCount":2"#), "{body}");
    assert!(body.contains(r#""type":"BID_RECEIVED""#), "{body}");
}

#[actix_web::test]
async fn other_users_notifications_are_off_limits() {
    let mut mock = MockNotificationManager::new();
    mock.expect_fetch_notifications().never();
    let req = TestRequest::get().uri("/api/notifications/4").insert_header(bearer(&issue_token(3, &[Role::Buyer])));
    let (status, body) = send(mock, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"You may only access your own data"}"#);
}

#[actix_web::test]
async fn mark_all_as_read() {
    let mut mock = MockNotificationManager::new();
    mock.expect_mark_all_notifications_read()
        .withf(|user_id, role| *user_id == 3 && *role == Some(Role::Buyer))
        .times(1)
        .returning(|_, _| Ok(5));
    let req = TestRequest::patch()
        .uri("/api/notifications/3")
        .insert_header(bearer(&issue_token(3, &[Role::Buyer])))
        .set_json(json!({"action": "markAllAsRead", "role": "buyer"}));
    let (status, body) = send(mock, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, r#"{"success":true,"updated":5}"#);
}

#[actix_web::test]
async fn marking_a_missing_notification_is_not_found() {
    let mut mock = MockNotificationManager::new();
    mock.expect_mark_notification_read().returning(|_, _| Ok(false));
    let req = TestRequest::patch()
        .uri("/api/notifications/3")
        .insert_header(bearer(&issue_token(3, &[Role::Buyer])))
        .set_json(json!({"action": "markAsRead", "notificationId": 99}));
    let (status, _) = send(mock, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_actions_are_bad_requests() {
    let mut mock = MockNotificationManager::new();
    mock.expect_mark_all_notifications_read().never();
    let req = TestRequest::patch()
        .uri("/api/notifications/3")
        .insert_header(bearer(&issue_token(3, &[Role::Buyer])))
        .set_json(json!({"action": "deleteEverything"}));
    let (status, body) = send(mock, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid action"}"#);
}
