//! NilHub: storefront backend for small sellers. Each account owns one
//! store; buyers browse public catalogs and reach sellers over WhatsApp.

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{middleware::Logger, web, App, Error};

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod images;
pub mod middleware;
pub mod models;
pub mod state;
pub mod token;

use middleware::ErrorEnvelope;
use state::AppState;

/// The full application for one worker: routes, error envelope and access log.
pub fn app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(ErrorEnvelope::new(state.translator))
        .wrap(Logger::default())
        .configure(handlers::routes(state))
        .default_service(web::to(handlers::not_found))
}
