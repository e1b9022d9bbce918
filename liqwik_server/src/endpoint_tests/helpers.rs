use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::Duration;
use liqwik_common::Secret;
use liqwik_engine::{
    auth_objects::SessionInfo,
    db_types::Role,
    test_utils::{test_db, MemoryDocumentStore, RecordingMailer},
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenIssuer,
    config::{AuthConfig, ServerConfig},
    server::{configure_app_data, configure_routes},
};

// DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new("endpoint-tests-only-secret-0123456789abcdef".into()),
        session_duration: Duration::hours(1),
    }
}

pub fn issue_token(user_id: i64, roles: &[Role]) -> String {
    let session = SessionInfo {
        user_id,
        email: format!("user{user_id}@example.com"),
        first_name: "Test".into(),
        roles: roles.to_vec(),
        selected_role: roles.first().copied(),
        selected_user_role_id: None,
    };
    let (token, _) = TokenIssuer::new(&get_auth_config()).issue_token(&session).expect("Could not issue token");
    token
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// A marketplace backed by a fresh SQLite database, with an in-memory document store and a mailer that records what it
/// is given.
pub struct TestMarketplace {
    pub db: SqliteDatabase,
    pub mailer: RecordingMailer,
    pub store: MemoryDocumentStore,
}

impl TestMarketplace {
    pub async fn new() -> Self {
        Self { db: test_db().await, mailer: RecordingMailer::new(), store: MemoryDocumentStore::new() }
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let (db, mailer, store) = (self.db.clone(), self.mailer.clone(), self.store.clone());
        let config = ServerConfig {
            auth: get_auth_config(),
            public_url: "https://liqwik.test".into(),
            ..ServerConfig::default()
        };
        move |cfg| {
            configure_app_data(cfg, db, mailer, store, &config);
            configure_routes::<SqliteDatabase, RecordingMailer, MemoryDocumentStore>(cfg);
        }
    }

    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = test::init_service(App::new().configure(self.configure())).await;
        call(&app, req).await
    }
}

pub async fn call<S, B>(app: &S, req: TestRequest) -> (StatusCode, String)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = match test::try_call_service(app, req.to_request()).await {
        Ok(res) => res,
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned());
            return (status, body.unwrap_or_default());
        },
    };
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    debug!("🚀️ Response {status}: {body}");
    (status, body)
}
