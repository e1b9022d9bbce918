use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use liqwik_engine::{
    asset_objects::MAX_DOCUMENT_SIZE,
    mailer::Mailer,
    traits::{DocumentStore, MarketplaceDatabase},
    AdminApi,
    AssetFlowApi,
    AuthApi,
    BidFlowApi,
    NotificationApi,
    PaymentTrackingApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    file_storage::FileDocumentStore,
    mail::ServerMailer,
    middleware::JwtMiddlewareFactory,
    payment_tracking_worker::start_payment_tracking_worker,
    routes::*,
};

/// Room for three base64 encoded documents of the maximum size, plus the asset fields.
const MAX_JSON_PAYLOAD: usize = 4 * MAX_DOCUMENT_SIZE + 1024 * 1024;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mailer = ServerMailer::from_config(&config.email).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    match config.payment_tracking_interval {
        Some(period) => {
            let api = PaymentTrackingApi::new(db.clone(), mailer.clone());
            // The worker runs until the process exits
            let _handle = start_payment_tracking_worker(api, period);
        },
        None => info!("🚀️ Payment tracking worker is disabled"),
    }
    let srv = create_server_instance(config, db, mailer)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    mailer: ServerMailer,
) -> Result<Server, ServerError> {
    let store = FileDocumentStore::new(&config.upload_dir);
    info!("🚀️ Documents are stored in {}", config.upload_dir.display());
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let (db, mailer, store) = (db.clone(), mailer.clone(), store.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("liqwik::access_log"))
            .configure(|cfg| configure_app_data(cfg, db, mailer, store, &config))
            .configure(configure_routes::<SqliteDatabase, ServerMailer, FileDocumentStore>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers the workflow APIs, the token issuer and the request extractor settings as app data.
pub fn configure_app_data<B, M, S>(cfg: &mut web::ServiceConfig, db: B, mailer: M, store: S, config: &ServerConfig)
where
    B: MarketplaceDatabase + 'static,
    M: Mailer + 'static,
    S: DocumentStore + 'static,
{
    let public_url = config.public_url.as_str();
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .app_data(web::Data::new(AuthApi::new(db.clone(), mailer.clone())))
        .app_data(web::Data::new(AssetFlowApi::new(db.clone(), mailer.clone(), store, public_url)))
        .app_data(web::Data::new(BidFlowApi::new(db.clone(), mailer.clone(), public_url)))
        .app_data(web::Data::new(NotificationApi::new(db.clone())))
        .app_data(web::Data::new(PaymentTrackingApi::new(db.clone(), mailer)))
        .app_data(web::Data::new(AdminApi::new(db)))
        .app_data(web::Data::new(TokenIssuer::new(&config.auth)))
        .app_data(web::Data::new(ServerOptions::from_config(config)));
}

pub fn configure_routes<B, M, S>(cfg: &mut web::ServiceConfig)
where
    B: MarketplaceDatabase + 'static,
    M: Mailer + 'static,
    S: DocumentStore + 'static,
{
    // Routes that require a session
    let auth_scope = web::scope("/api")
        .wrap(JwtMiddlewareFactory::new())
        .service(SwitchRoleRoute::<B, M>::new())
        .service(check_token)
        .service(CheckFirstLoginRoute::<B, M>::new())
        .service(MarkNotFirstLoginRoute::<B, M>::new())
        .service(SendFirstLoginSuccessRoute::<B, M>::new())
        .service(BillToPartiesRoute::<B>::new())
        .service(NotificationsRoute::<B>::new())
        .service(UpdateNotificationsRoute::<B>::new())
        .service(SellerAssetsRoute::<B, M, S>::new())
        .service(CreateAssetRoute::<B, M, S>::new())
        .service(SellerAssetRoute::<B, M, S>::new())
        .service(UpdateAssetRoute::<B, M, S>::new())
        .service(ApproveFeeRoute::<B, M, S>::new())
        .service(PostAssetRoute::<B, M, S>::new())
        .service(CancelAssetRoute::<B, M, S>::new())
        .service(CheckValidationRoute::<B, M, S>::new())
        .service(SellerBidsRoute::<B, M>::new())
        .service(SellerBidActionRoute::<B, M>::new())
        .service(MarketplaceRoute::<B, M>::new())
        .service(MarketplaceAssetRoute::<B, M>::new())
        .service(BuyerBidsRoute::<B, M>::new())
        .service(PlaceBidRoute::<B, M>::new())
        .service(UpdateBidRoute::<B, M>::new())
        .service(ApproveBidPaymentRoute::<B, M>::new())
        .service(AcceptedBidsRoute::<B, M>::new())
        .service(DocumentsRoute::<B, M, S>::new())
        .service(DocumentRoute::<B, M, S>::new())
        .service(TrackPaymentsRoute::<B, M>::new())
        .service(ConfirmPaymentRoute::<B, M>::new())
        .service(AdminUsersRoute::<B>::new())
        .service(AdminUpdateUserRoute::<B>::new())
        .service(AdminDeleteUserRoute::<B>::new())
        .service(AdminGrantRoleRoute::<B>::new())
        .service(AdminCreateBillToPartyRoute::<B>::new());
    // Public routes are registered ahead of the session scope, which would otherwise claim every `/api` path
    cfg.service(health)
        .service(RegisterRoute::<B, M>::new())
        .service(VerifyEmailRoute::<B, M>::new())
        .service(ResendVerificationRoute::<B, M>::new())
        .service(LoginRoute::<B, M>::new())
        .service(GenerateLoginOtpRoute::<B, M>::new())
        .service(VerifyLoginOtpRoute::<B, M>::new())
        .service(ValidateBillToPartyRoute::<B, M, S>::new())
        .service(ApprovePaymentLinkRoute::<B, M>::new())
        .service(auth_scope);
}

/// Malformed bodies are answered in the same `{"error": ...}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().limit(MAX_JSON_PAYLOAD).error_handler(|err, _req| {
        debug!("💻️ Rejected request. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejected request. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejected request. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}
