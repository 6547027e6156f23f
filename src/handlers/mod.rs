//! HTTP handlers and route table.
//!
//! Successful responses use `{ "success": true, "data": ... }`; list
//! endpoints add `pagination`. Errors are rendered by `ErrorEnvelope`.

use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::{Protect, RequireAdmin, RequireOwnership};
use crate::models::Pagination;
use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod products;
pub mod public;
pub mod stats;
pub mod stores;
pub mod uploads;

const JSON_LIMIT: usize = 1024 * 1024;

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(json!({ "success": true, "data": data }))
}

pub fn paginated<T: Serialize>(data: T, pagination: Pagination) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "data": data,
        "pagination": pagination,
    }))
}

fn json_error(err: &JsonPayloadError) -> String {
    match err {
        JsonPayloadError::Deserialize(e) => format!("Datos inválidos: {e}"),
        JsonPayloadError::ContentType => "Se esperaba contenido JSON".to_string(),
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "El cuerpo de la solicitud es demasiado grande".to_string()
        }
        _ => "Cuerpo de la solicitud inválido".to_string(),
    }
}

async fn health() -> HttpResponse {
    ok(json!({ "status": "ok" }))
}

/// Default service for unmatched paths.
pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Ruta no encontrada".to_string()))
}

/// Register every route. Middleware that needs state is built here so each
/// worker gets its own instances.
pub fn routes(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let protect = || Protect::new(state.tokens.clone(), state.accounts.clone());

        cfg.app_data(web::Data::new(state.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_LIMIT)
                    .error_handler(|err, _req| AppError::InvalidInput(vec![json_error(&err)]).into()),
            )
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::InvalidInput(vec![format!("Parámetros inválidos: {err}")]).into()
            }))
            .app_data(
                web::PathConfig::default()
                    .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
            )
            .route("/health", web::get().to(health))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(auth::register))
                            .route("/login", web::post().to(auth::login))
                            .service(
                                web::resource("/me")
                                    .wrap(protect())
                                    .route(web::get().to(auth::me)),
                            )
                            .service(
                                web::resource("/profile")
                                    .wrap(protect())
                                    .route(web::put().to(auth::update_profile)),
                            ),
                    )
                    .service(
                        web::scope("/public")
                            .route("/stores/{slug}", web::get().to(public::store_catalog))
                            .route(
                                "/stores/{slug}/products/{id}",
                                web::get().to(public::product_detail),
                            )
                            .route("/products/{id}/click", web::post().to(public::product_click)),
                    )
                    .service(
                        web::scope("/stores")
                            .wrap(protect())
                            .route("/mine", web::get().to(stores::mine))
                            .service(
                                web::resource("/{id}")
                                    .wrap(RequireOwnership::store(state.stores.clone()))
                                    .route(web::put().to(stores::update)),
                            )
                            .service(
                                web::resource("/{id}/products")
                                    .wrap(RequireOwnership::store(state.stores.clone()))
                                    .route(web::post().to(products::create)),
                            ),
                    )
                    .service(
                        web::scope("/products")
                            .wrap(protect())
                            .route("", web::get().to(products::list_mine))
                            .service(
                                web::resource("/{id}")
                                    .wrap(RequireOwnership::product(state.products.clone()))
                                    .route(web::get().to(products::get))
                                    .route(web::put().to(products::update))
                                    .route(web::delete().to(products::delete)),
                            )
                            .service(
                                web::resource("/{id}/stock")
                                    .wrap(RequireOwnership::product(state.products.clone()))
                                    .route(web::patch().to(products::update_stock)),
                            )
                            .service(
                                web::resource("/{id}/toggle")
                                    .wrap(RequireOwnership::product(state.products.clone()))
                                    .route(web::patch().to(products::toggle)),
                            ),
                    )
                    .service(
                        web::scope("/uploads")
                            .wrap(protect())
                            .route("/images", web::post().to(uploads::upload_images))
                            .route(
                                "/images/{public_id:.*}",
                                web::delete().to(uploads::delete_image),
                            ),
                    )
                    .service(
                        web::scope("/stats")
                            .wrap(protect())
                            .route("/mine", web::get().to(stats::mine)),
                    )
                    .service(
                        web::scope("/admin")
                            .wrap(RequireAdmin)
                            .wrap(protect())
                            .route("/accounts", web::get().to(admin::list_accounts))
                            .route(
                                "/accounts/{id}/status",
                                web::patch().to(admin::set_account_status),
                            )
                            .route("/stores", web::get().to(admin::list_stores))
                            .route("/stats", web::get().to(stats::platform)),
                    ),
            );
    }
}
