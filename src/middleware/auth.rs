use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use mongodb::bson::oid::ObjectId;

use crate::db::AccountRepository;
use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::AuthenticatedAccount;
use crate::token::{is_well_formed, TokenError, TokenService};

/// `Authorization: Bearer <token>`, if present and non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the request's bearer token to a live, active account.
///
/// Every call hits the repository so deactivation applies on the next request.
pub async fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    accounts: &dyn AccountRepository,
) -> AppResult<AuthenticatedAccount> {
    let token = bearer_token(headers).ok_or(AppError::Unauthenticated(AuthFailure::MissingToken))?;
    if !is_well_formed(token) {
        return Err(AppError::Unauthenticated(AuthFailure::MalformedToken));
    }

    let claims = tokens.decode(token)?;
    let id = ObjectId::parse_str(&claims.sub).map_err(|_| TokenError::Invalid)?;

    let account = accounts
        .find_by_id(id)
        .await?
        .ok_or(AppError::Unauthenticated(AuthFailure::AccountNotFound))?;
    if !account.active {
        return Err(AppError::Unauthenticated(AuthFailure::AccountInactive));
    }
    Ok(account.into())
}

/// Requires a valid session token; attaches the [`AuthenticatedAccount`].
pub struct Protect {
    tokens: TokenService,
    accounts: Arc<dyn AccountRepository>,
}

impl Protect {
    pub fn new(tokens: TokenService, accounts: Arc<dyn AccountRepository>) -> Self {
        Protect { tokens, accounts }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Protect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ProtectMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProtectMiddleware {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
            accounts: self.accounts.clone(),
        }))
    }
}

pub struct ProtectMiddleware<S> {
    service: Rc<S>,
    tokens: TokenService,
    accounts: Arc<dyn AccountRepository>,
}

impl<S, B> Service<ServiceRequest> for ProtectMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let tokens = self.tokens.clone();
        let accounts = self.accounts.clone();

        Box::pin(async move {
            match authenticate(req.headers(), &tokens, accounts.as_ref()).await {
                Ok(account) => {
                    req.extensions_mut().insert(account);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    log::warn!("Auth rejected {} {}: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

/// Admin-only gate. Must sit inside [`Protect`].
pub struct RequireAdmin;

impl<S, B> Transform<S, ServiceRequest> for RequireAdmin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireAdminMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAdminMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAdminMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireAdminMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let verdict = match req.extensions().get::<AuthenticatedAccount>() {
                None => Err(AppError::Unauthenticated(AuthFailure::MissingToken)),
                Some(account) if !account.is_admin() => Err(AppError::Forbidden(
                    "Acceso denegado, se requiere rol de administrador".to_string(),
                )),
                Some(_) => Ok(()),
            };

            match verdict {
                Ok(()) => service.call(req).await.map(ServiceResponse::map_into_left_body),
                Err(err) => {
                    log::warn!("Admin check failed {} {}: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

/// Extractor for the account attached by [`Protect`].
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub AuthenticatedAccount);

impl FromRequest for CurrentAccount {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedAccount>()
                .cloned()
                .map(CurrentAccount)
                .ok_or(AppError::Unauthenticated(AuthFailure::MissingToken)),
        )
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
