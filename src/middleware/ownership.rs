use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{BoxFuture, LocalBoxFuture};
use mongodb::bson::oid::ObjectId;

use crate::db::{parse_id, DbResult, ProductRepository, StoreRepository};
use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::{AuthenticatedAccount, Product, Store};

/// A resource that belongs to exactly one account.
pub trait Owned: Clone + 'static {
    /// Name used in not-found messages.
    const LABEL: &'static str;

    fn owner(&self) -> ObjectId;
}

impl Owned for Product {
    const LABEL: &'static str = "Producto";

    fn owner(&self) -> ObjectId {
        self.owner
    }
}

impl Owned for Store {
    const LABEL: &'static str = "Tienda";

    fn owner(&self) -> ObjectId {
        self.owner
    }
}

type Loader<T> = Rc<dyn Fn(ObjectId) -> BoxFuture<'static, DbResult<Option<T>>>>;

/// Loads the resource named by a path parameter and lets the request through
/// only for its owner or an administrator. Must sit inside `Protect`.
///
/// Unknown or malformed ids answer 404 before ownership is looked at. The
/// loaded resource is attached to the request as [`Loaded<T>`].
pub struct RequireOwnership<T> {
    param: &'static str,
    loader: Loader<T>,
}

impl<T: Owned> RequireOwnership<T> {
    pub fn new<F>(param: &'static str, loader: F) -> Self
    where
        F: Fn(ObjectId) -> BoxFuture<'static, DbResult<Option<T>>> + 'static,
    {
        Self {
            param,
            loader: Rc::new(loader),
        }
    }
}

impl RequireOwnership<Product> {
    pub fn product(products: Arc<dyn ProductRepository>) -> Self {
        Self::new("id", move |id| {
            let products = products.clone();
            Box::pin(async move { products.find_by_id(id).await })
        })
    }
}

impl RequireOwnership<Store> {
    pub fn store(stores: Arc<dyn StoreRepository>) -> Self {
        Self::new("id", move |id| {
            let stores = stores.clone();
            Box::pin(async move { stores.find_by_id(id).await })
        })
    }
}

async fn authorize<T: Owned>(req: &ServiceRequest, param: &str, loader: &Loader<T>) -> AppResult<T> {
    let account = req
        .extensions()
        .get::<AuthenticatedAccount>()
        .cloned()
        .ok_or(AppError::Unauthenticated(AuthFailure::MissingToken))?;

    let id = parse_id(req.match_info().get(param).unwrap_or_default())?;
    let resource = loader(id).await?.ok_or_else(|| AppError::not_found(T::LABEL))?;

    if resource.owner() != account.id && !account.is_admin() {
        return Err(AppError::forbidden());
    }
    Ok(resource)
}

impl<S, B, T> Transform<S, ServiceRequest> for RequireOwnership<T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: Owned,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireOwnershipMiddleware<S, T>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireOwnershipMiddleware {
            service: Rc::new(service),
            param: self.param,
            loader: self.loader.clone(),
        }))
    }
}

pub struct RequireOwnershipMiddleware<S, T> {
    service: Rc<S>,
    param: &'static str,
    loader: Loader<T>,
}

impl<S, B, T> Service<ServiceRequest> for RequireOwnershipMiddleware<S, T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    T: Owned,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let loader = self.loader.clone();
        let param = self.param;

        Box::pin(async move {
            match authorize(&req, param, &loader).await {
                Ok(resource) => {
                    req.extensions_mut().insert(Loaded(resource));
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    log::warn!("Ownership check failed {} {}: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

/// The resource loaded by [`RequireOwnership`], handed to the handler.
#[derive(Debug, Clone)]
pub struct Loaded<T>(pub T);

impl<T: Owned> FromRequest for Loaded<T> {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Loaded<T>>()
                .cloned()
                .ok_or_else(|| AppError::Internal(format!("{} not loaded", T::LABEL))),
        )
    }
}
