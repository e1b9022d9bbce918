//! HTTP handlers for the marketplace.
//!
//! Routes fall into three groups:
//! * Public routes under `/api/auth` (registration, email verification, login and OTP), plus the two token links that
//!   are emailed out: `/api/validate-bill-to-party/{token}` and `/api/approve-payment/{token}`. The token links answer
//!   with an HTML page.
//! * Session routes, mounted in the `/api` scope behind the JWT middleware: role switching, first-login tracking,
//!   notifications, bill-to parties and asset documents.
//! * Role routes. `/sellers/{userId}/...` manage assets and the bids on them, `/buyers/{userId}/...` cover the
//!   marketplace and bidding, `/bill-to-party-payments/...` and `/admin/...` are for administrators.
//!
//! Handlers talk to the engine APIs only. Anything longer than a few lines belongs in the engine, not here.
//!
//! Paths under `/api/sellers/{userId}` and `/api/buyers/{userId}` are guarded twice: the ACL middleware checks the
//! session holds the seller or buyer role, and the handler checks that `{userId}` is the session's own user. The
//! `where requires [..]` arm of [`route!`] is what installs the ACL middleware.
use actix_web::{get, http::StatusCode, web, HttpRequest, HttpResponse, Responder, ResponseError};
use liqwik_engine::{
    asset_objects::UpdateAssetRequest,
    auth_objects::{
        GenerateOtpRequest,
        LoginRequest,
        RegistrationRequest,
        ResendVerificationRequest,
        SwitchRoleRequest,
        VerifyEmailRequest,
        VerifyOtpRequest,
    },
    bid_objects::{BidRequest, PaymentApprovalRequest, SellerBidAction},
    db_types::{NewBillToParty, Role},
    mailer::Mailer,
    traits::{DocumentStore, MarketplaceDatabase, NotificationManagement, TokenOutcome, UserManagement},
    AdminApi,
    AssetFlowApi,
    AuthApi,
    BidFlowApi,
    NotificationAction,
    NotificationActionRequest,
    NotificationApi,
    PaymentTrackingApi,
};
use log::*;

use crate::{
    auth::{ensure_self, JwtClaims, TokenIssuer},
    config::ServerOptions,
    data_objects::{
        FirstLoginStatus,
        JsonResponse,
        MarketplaceQuery,
        NewAssetPayload,
        NotificationQuery,
        NotificationUpdateResult,
        RoleGrantRequest,
        SessionToken,
        UserStatusUpdate,
    },
    errors::ServerError,
    helpers::{get_remote_ip, html_page},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(register => Post "/api/auth/register" impl UserManagement, Mailer);
/// Registers a user in a role. An existing user (matched by email or username) who already holds the role gets a 409.
/// Otherwise a verification code is emailed, and the role stays unverified until the code comes back.
pub async fn register<B: UserManagement, M: Mailer>(
    body: web::Json<RegistrationRequest>,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST register for {}", body.email);
    let result = api.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(result))
}

route!(verify_email => Post "/api/auth/verify-email" impl UserManagement, Mailer);
pub async fn verify_email<B: UserManagement, M: Mailer>(
    body: web::Json<VerifyEmailRequest>,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST verify-email for user role #{}", body.user_role_id);
    let result = api.verify_email(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(resend_verification => Post "/api/auth/resend-verification" impl UserManagement, Mailer);
pub async fn resend_verification<B: UserManagement, M: Mailer>(
    body: web::Json<ResendVerificationRequest>,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST resend-verification for user role #{}", body.user_role_id);
    api.resend_verification(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("A new verification code has been sent.")))
}

route!(login => Post "/api/auth/login" impl UserManagement, Mailer);
/// The first login step. Checks the password and lists the user's roles; the session itself is only issued once the
/// emailed one-time password is verified.
pub async fn login<B: UserManagement, M: Mailer>(
    body: web::Json<LoginRequest>,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST login for {}", body.identifier);
    let result = api.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(generate_login_otp => Post "/api/auth/generate-login-otp" impl UserManagement, Mailer);
pub async fn generate_login_otp<B: UserManagement, M: Mailer>(
    body: web::Json<GenerateOtpRequest>,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST generate-login-otp for user #{}", body.user_id);
    api.generate_login_otp(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("A one-time password has been sent to your email.")))
}

route!(verify_login_otp => Post "/api/auth/verify-login-otp" impl UserManagement, Mailer);
/// Completes the login and issues the session token.
pub async fn verify_login_otp<B: UserManagement, M: Mailer>(
    body: web::Json<VerifyOtpRequest>,
    api: web::Data<AuthApi<B, M>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST verify-login-otp for user #{}", body.user_id);
    let session = api.verify_login_otp(body.into_inner()).await?;
    let (token, claims) = signer.issue_token(&session)?;
    trace!("💻️ Issued access token for user #{}", session.user_id);
    Ok(HttpResponse::Ok().json(SessionToken { token, claims }))
}

route!(switch_role => Post "/auth/switch-role" impl UserManagement, Mailer);
pub async fn switch_role<B: UserManagement, M: Mailer>(
    claims: JwtClaims,
    body: web::Json<SwitchRoleRequest>,
    api: web::Data<AuthApi<B, M>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST switch-role for user #{} to {}", claims.sub, body.role);
    let session = api.switch_role(claims.user_id(), body.into_inner()).await?;
    let (token, claims) = signer.issue_token(&session)?;
    Ok(HttpResponse::Ok().json(SessionToken { token, claims }))
}

#[get("/auth/check-token")]
pub async fn check_token(claims: JwtClaims) -> impl Responder {
    trace!("💻️ Session token for user #{} is valid", claims.sub);
    HttpResponse::Ok().json(claims)
}

route!(check_first_login => Get "/auth/check-first-login" impl UserManagement, Mailer);
pub async fn check_first_login<B: UserManagement, M: Mailer>(
    claims: JwtClaims,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let is_first_login = api.check_first_login(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(FirstLoginStatus { is_first_login }))
}

route!(mark_not_first_login => Post "/auth/mark-not-first-login" impl UserManagement, Mailer);
pub async fn mark_not_first_login<B: UserManagement, M: Mailer>(
    claims: JwtClaims,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    api.mark_not_first_login(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("First login complete.")))
}

route!(send_first_login_success => Post "/auth/send-first-login-success" impl UserManagement, Mailer);
pub async fn send_first_login_success<B: UserManagement, M: Mailer>(
    claims: JwtClaims,
    api: web::Data<AuthApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    api.send_first_login_success(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("First login email sent.")))
}

//----------------------------------------------   Token links  ----------------------------------------------------
// These pages are opened from emails, so they answer in HTML, and have no session.

fn html_error(e: ServerError, title: &str) -> HttpResponse {
    let status = e.status_code();
    let message = if status.is_server_error() {
        error!("💻️ {e}");
        "Something went wrong on our side. Please try again later.".to_string()
    } else {
        e.to_string()
    };
    html_page(status, title, &message)
}

route!(validate_bill_to_party => Get "/api/validate-bill-to-party/{token}" impl MarketplaceDatabase, Mailer, DocumentStore);
/// The link in the validation request sent to the bill-to party. Only the first visit validates the asset.
pub async fn validate_bill_to_party<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<AssetFlowApi<B, M, S>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!("💻️ Bill-to party validation link opened from {ip:?}");
    match api.validate_bill_to_party(&path.into_inner()).await {
        Ok(TokenOutcome::Redeemed(asset)) => html_page(
            StatusCode::OK,
            "Invoice validated",
            &format!("Thank you. Invoice {} has been validated.", asset.invoice_number),
        ),
        Ok(TokenOutcome::AlreadyRedeemed(asset)) => html_page(
            StatusCode::OK,
            "Already validated",
            &format!("Invoice {} was validated earlier. There is nothing more to do.", asset.invoice_number),
        ),
        Err(e) => html_error(e.into(), "Validation failed"),
    }
}

route!(approve_payment_link => Get "/api/approve-payment/{token}" impl MarketplaceDatabase, Mailer);
/// The link in the bid-accepted email sent to the winning buyer.
pub async fn approve_payment_link<B: MarketplaceDatabase, M: Mailer>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<BidFlowApi<B, M>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!("💻️ Payment approval link opened from {ip:?}");
    match api.approve_payment_by_token(&path.into_inner()).await {
        Ok(approval) if approval.newly_approved => html_page(
            StatusCode::OK,
            "Payment approved",
            "Thank you. Your payment approval has been recorded and the seller has been informed.",
        ),
        Ok(_) => html_page(StatusCode::OK, "Payment already approved", "Payment for this bid was approved earlier."),
        Err(e) => html_error(e.into(), "Payment could not be approved"),
    }
}

//----------------------------------------------   Directory  ----------------------------------------------------
route!(bill_to_parties => Get "/bill-to-parties" impl MarketplaceDatabase);
pub async fn bill_to_parties<B: MarketplaceDatabase>(api: web::Data<AdminApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET bill-to-parties");
    let parties = api.bill_to_parties().await?;
    Ok(HttpResponse::Ok().json(parties))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
route!(notifications => Get "/notifications/{user_id}" impl NotificationManagement);
pub async fn notifications<B: NotificationManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    query: web::Query<NotificationQuery>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let NotificationQuery { limit, role } = query.into_inner();
    let list = api.notifications(user_id, role, limit).await?;
    Ok(HttpResponse::Ok().json(list))
}

route!(update_notifications => Patch "/notifications/{user_id}" impl NotificationManagement);
pub async fn update_notifications<B: NotificationManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<NotificationActionRequest>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let action = NotificationAction::try_from(body.into_inner())?;
    debug!("💻️ PATCH notifications for user #{user_id}: {action:?}");
    let updated = api.apply(user_id, action).await?;
    Ok(HttpResponse::Ok().json(NotificationUpdateResult { success: true, updated }))
}

//----------------------------------------------   Seller assets  ----------------------------------------------------
route!(seller_assets => Get "/sellers/{user_id}/assets" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn seller_assets<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let assets = api.seller_assets(user_id).await?;
    Ok(HttpResponse::Ok().json(assets))
}

route!(create_asset => Post "/sellers/{user_id}/assets" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
/// Creates a draft asset. The supporting documents travel base64 encoded inside the JSON body.
pub async fn create_asset<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<NewAssetPayload>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let (asset, documents) = body.into_inner().into_parts()?;
    debug!("💻️ POST new asset {} with {} documents for user #{user_id}", asset.invoice_number, documents.len());
    let asset = api.create_asset(user_id, asset, documents).await?;
    Ok(HttpResponse::Created().json(asset))
}

route!(seller_asset => Get "/sellers/{user_id}/assets/{asset_id}" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn seller_asset<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let asset = api.seller_asset(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

route!(update_asset => Patch "/sellers/{user_id}/assets/{asset_id}" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn update_asset<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    body: web::Json<UpdateAssetRequest>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    debug!("💻️ PATCH asset #{asset_id} for user #{user_id}");
    let asset = api.update_asset(user_id, asset_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(asset))
}

route!(approve_fee => Post "/sellers/{user_id}/assets/{asset_id}/approve-fee" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn approve_fee<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let asset = api.approve_fee(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

route!(post_asset => Post "/sellers/{user_id}/assets/{asset_id}/post" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn post_asset<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let asset = api.post_asset(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

route!(cancel_asset => Post "/sellers/{user_id}/assets/{asset_id}/cancel" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn cancel_asset<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let asset = api.cancel_asset(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

route!(check_validation => Get "/sellers/{user_id}/assets/{asset_id}/check-validation" impl MarketplaceDatabase, Mailer, DocumentStore where requires [Role::Seller]);
pub async fn check_validation<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let status = api.check_validation(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

//----------------------------------------------   Seller bids  ----------------------------------------------------
route!(seller_bids => Get "/sellers/{user_id}/assets/{asset_id}/bids" impl MarketplaceDatabase, Mailer where requires [Role::Seller]);
pub async fn seller_bids<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let bids = api.seller_bids(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(seller_bid_action => Post "/sellers/{user_id}/assets/{asset_id}/bids" impl MarketplaceDatabase, Mailer where requires [Role::Seller]);
/// Accepts, rejects or withdraws acceptance of a bid. Responds with every bid on the asset after the change.
pub async fn seller_bid_action<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    body: web::Json<SellerBidAction>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    debug!("💻️ POST {} on bid #{} of asset #{asset_id} by user #{user_id}", body.action, body.bid_id);
    let bids = api.seller_action(user_id, asset_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(bids))
}

//----------------------------------------------   Marketplace  ----------------------------------------------------
route!(marketplace => Get "/buyers/{user_id}/assets" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn marketplace<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<i64>,
    query: web::Query<MarketplaceQuery>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let assets = api.marketplace(user_id, query.filter_by_bids).await?;
    Ok(HttpResponse::Ok().json(assets))
}

route!(marketplace_asset => Get "/buyers/{user_id}/assets/{asset_id}" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn marketplace_asset<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let asset = api.marketplace_asset(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

//----------------------------------------------   Buyer bids  ----------------------------------------------------
route!(buyer_bids => Get "/buyers/{user_id}/assets/{asset_id}/bids" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn buyer_bids<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let bids = api.buyer_bids_on_asset(user_id, asset_id).await?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(place_bid => Post "/buyers/{user_id}/assets/{asset_id}/bids" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn place_bid<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    body: web::Json<BidRequest>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    debug!("💻️ POST bid of {:?} on asset #{asset_id} by user #{user_id}", body.total_amount);
    let bid = api.place_bid(user_id, asset_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(bid))
}

route!(update_bid => Post "/buyers/{user_id}/assets/{asset_id}/bids/{bid_id}" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn update_bid<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64, i64)>,
    body: web::Json<BidRequest>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id, bid_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let bid = api.update_bid(user_id, asset_id, bid_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(bid))
}

route!(approve_bid_payment => Patch "/buyers/{user_id}/assets/{asset_id}/bids/{bid_id}" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
/// Approves payment on an accepted bid from within a session. Equivalent to following the emailed approval link.
pub async fn approve_bid_payment<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<(i64, i64, i64)>,
    body: web::Json<PaymentApprovalRequest>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let (user_id, asset_id, bid_id) = path.into_inner();
    ensure_self(&claims, user_id)?;
    let approval = api.approve_payment(user_id, asset_id, bid_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(approval))
}

route!(accepted_bids => Get "/buyers/{user_id}/bids" impl MarketplaceDatabase, Mailer where requires [Role::Buyer]);
pub async fn accepted_bids<B: MarketplaceDatabase, M: Mailer>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    ensure_self(&claims, user_id)?;
    let bids = api.accepted_bids(user_id).await?;
    Ok(HttpResponse::Ok().json(bids))
}

//----------------------------------------------   Documents  ----------------------------------------------------
route!(documents => Get "/assets/{asset_id}/documents" impl MarketplaceDatabase, Mailer, DocumentStore);
pub async fn documents<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let docs = api.documents(&claims.session(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(docs))
}

route!(document => Get "/assets/{asset_id}/documents/{file_name}" impl MarketplaceDatabase, Mailer, DocumentStore);
pub async fn document<B: MarketplaceDatabase, M: Mailer, S: DocumentStore>(
    claims: JwtClaims,
    path: web::Path<(i64, String)>,
    api: web::Data<AssetFlowApi<B, M, S>>,
) -> Result<HttpResponse, ServerError> {
    let (asset_id, file_name) = path.into_inner();
    debug!("💻️ GET document {file_name} of asset #{asset_id} for user #{}", claims.sub);
    let doc = api.document(&claims.session(), asset_id, &file_name).await?;
    Ok(HttpResponse::Ok()
        .content_type(doc.content_type)
        .insert_header(("Content-Disposition", format!("inline; filename=\"{}\"", doc.info.file_name)))
        .body(doc.data))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(track_payments => Post "/bill-to-party-payments/track" impl MarketplaceDatabase, Mailer where requires [Role::Admin]);
/// Runs the reminder and overdue sweep now. A sweep that is already running elsewhere gives a 409.
pub async fn track_payments<B: MarketplaceDatabase, M: Mailer>(
    api: web::Data<PaymentTrackingApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ Payment tracking sweep requested");
    let report = api.run_sweep().await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(confirm_payment => Post "/bill-to-party-payments/{payment_id}/confirm" impl MarketplaceDatabase, Mailer where requires [Role::Admin]);
pub async fn confirm_payment<B: MarketplaceDatabase, M: Mailer>(
    path: web::Path<i64>,
    api: web::Data<PaymentTrackingApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    info!("💻️ Confirming receipt of payment #{payment_id}");
    let payment = api.confirm_payment(payment_id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(admin_users => Get "/admin/users" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn admin_users<B: MarketplaceDatabase>(api: web::Data<AdminApi<B>>) -> Result<HttpResponse, ServerError> {
    let users = api.users().await?;
    Ok(HttpResponse::Ok().json(users))
}

route!(admin_update_user => Patch "/admin/users/{user_id}" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn admin_update_user<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<UserStatusUpdate>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    info!("💻️ Setting user #{user_id} active: {}", body.is_active);
    let user = api.set_user_active(user_id, body.is_active).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(admin_delete_user => Delete "/admin/users/{user_id}" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn admin_delete_user<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    info!("💻️ Deleting user #{user_id}");
    api.delete_user(user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("User #{user_id} deleted."))))
}

route!(admin_grant_role => Post "/admin/users/{user_id}/roles" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn admin_grant_role<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<RoleGrantRequest>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    info!("💻️ Granting the {} role to user #{user_id}", body.role);
    let role = api.grant_role(user_id, body.role).await?;
    Ok(HttpResponse::Created().json(role))
}

route!(admin_create_bill_to_party => Post "/admin/bill-to-parties" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn admin_create_bill_to_party<B: MarketplaceDatabase>(
    body: web::Json<NewBillToParty>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ Creating bill-to party {}", body.name);
    let party = api.create_bill_to_party(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(party))
}
