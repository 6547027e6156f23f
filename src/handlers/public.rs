//! Buyer-facing catalog. No authentication; inactive stores and products
//! are indistinguishable from missing ones.

use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{ok, paginated};
use crate::db::parse_id;
use crate::error::{AppError, AppResult};
use crate::models::product::ProductFilter;
use crate::models::{PageQuery, Pagination, Product, ProductView, Store, StoreView};
use crate::state::AppState;

fn store_not_found() -> AppError {
    AppError::NotFound("Tienda no encontrada".to_string())
}

async fn active_store(state: &AppState, slug: &str) -> AppResult<Store> {
    match state.stores.find_by_slug(slug).await? {
        Some(store) if store.active => Ok(store),
        _ => Err(store_not_found()),
    }
}

async fn active_product(state: &AppState, raw_id: &str) -> AppResult<Product> {
    let id = parse_id(raw_id)?;
    match state.products.find_by_id(id).await? {
        Some(product) if product.active => Ok(product),
        _ => Err(AppError::not_found("Producto")),
    }
}

pub async fn store_catalog(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    filter: web::Query<ProductFilter>,
    page: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let store = active_store(&state, &slug).await?;

    let page = page.into_inner().normalized();
    let filter = ProductFilter {
        only_active: true,
        ..filter.into_inner()
    };
    let (products, total) = state.products.list(store.id, &filter, page).await?;
    let products: Vec<ProductView> = products.iter().map(ProductView::from).collect();

    Ok(paginated(
        json!({ "store": StoreView::public(&store), "products": products }),
        Pagination::new(page, total),
    ))
}

pub async fn product_detail(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (slug, id) = path.into_inner();
    let store = active_store(&state, &slug).await?;
    let mut product = active_product(&state, &id).await?;
    if product.store != store.id {
        return Err(AppError::not_found("Producto"));
    }

    state.products.increment_views(product.id).await?;
    product.views += 1;

    Ok(ok(json!({
        "store": StoreView::public(&store),
        "product": ProductView::from(&product),
        "whatsapp_url": store.whatsapp_link(&product.inquiry_message()),
    })))
}

/// Record a buyer's click-through and hand back the WhatsApp link.
pub async fn product_click(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let product = active_product(&state, &id).await?;
    let store = match state.stores.find_by_id(product.store).await? {
        Some(store) if store.active => store,
        _ => return Err(store_not_found()),
    };
    let link = store
        .whatsapp_link(&product.inquiry_message())
        .ok_or_else(|| AppError::BadRequest("La tienda no tiene WhatsApp configurado".to_string()))?;

    state.products.increment_clicks(product.id).await?;
    Ok(ok(json!({ "whatsapp_url": link })))
}
