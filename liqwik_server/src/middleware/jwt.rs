//! Session token middleware.
//!
//! Wrap any scope that requires a logged-in user with this middleware. It reads the `Authorization: Bearer <jwt>`
//! header, validates the token with the [`TokenIssuer`] and, on success, stores the [`JwtClaims`] in the request
//! extensions. A missing or invalid token ends the request with a 401 before any handler runs.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{JwtClaims, TokenIssuer},
    errors::{AuthError, ServerError},
};

#[derive(Default)]
pub struct JwtMiddlewareFactory;

impl JwtMiddlewareFactory {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            trace!("🔐️ Checking session token for {}", req.path());
            let claims = claims_from_request(&req)?;
            trace!("🔐️ Session token for user #{} ✅️", claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn claims_from_request(req: &ServiceRequest) -> Result<JwtClaims, ServerError> {
    let issuer = req.app_data::<web::Data<TokenIssuer>>().ok_or_else(|| {
        error!("🔐️ No token issuer has been configured. Denying access.");
        ServerError::Unspecified("Token issuer not configured".to_string())
    })?;
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
    issuer.validate_token(token).map_err(|e| {
        debug!("🔐️ Rejected session token. {e}");
        ServerError::AuthenticationError(e)
    })
}
