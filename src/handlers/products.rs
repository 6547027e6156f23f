use actix_web::{web, HttpResponse};

use super::{created, ok, paginated};
use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentAccount, Loaded};
use crate::models::product::{ProductFilter, ProductInput, ProductUpdate, StockInput};
use crate::models::{PageQuery, Pagination, Product, ProductImage, ProductView, Store};
use crate::state::AppState;

/// Remove hosted images, logging failures instead of failing the request.
pub(crate) async fn discard_images(state: &AppState, images: &[ProductImage]) {
    for image in images {
        if let Err(err) = state.images.delete(&image.public_id).await {
            log::warn!("Failed to delete image {}: {}", image.public_id, err);
        }
    }
}

pub async fn create(
    state: web::Data<AppState>,
    Loaded(store): Loaded<Store>,
    input: web::Json<ProductInput>,
) -> AppResult<HttpResponse> {
    let product = Product::new(store.id, store.owner, input.into_inner());
    product.validate()?;
    state.products.insert(&product).await?;
    state.stores.adjust_product_count(store.id, 1).await?;

    log::info!("Product {} created in store {}", product.id, store.slug);
    Ok(created(ProductView::from(&product)))
}

/// The caller's own catalog, inactive products included.
pub async fn list_mine(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
    filter: web::Query<ProductFilter>,
    page: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let store = state
        .stores
        .find_by_owner(account.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No tienes una tienda".to_string()))?;

    let page = page.into_inner().normalized();
    let filter = filter.into_inner();
    let (products, total) = state.products.list(store.id, &filter, page).await?;
    let views: Vec<ProductView> = products.iter().map(ProductView::from).collect();
    Ok(paginated(views, Pagination::new(page, total)))
}

pub async fn get(Loaded(product): Loaded<Product>) -> AppResult<HttpResponse> {
    Ok(ok(ProductView::from(&product)))
}

pub async fn update(
    state: web::Data<AppState>,
    Loaded(mut product): Loaded<Product>,
    input: web::Json<ProductUpdate>,
) -> AppResult<HttpResponse> {
    let previous = product.images.clone();
    product.apply(input.into_inner());
    product.validate()?;
    state.products.replace(&product).await?;

    let removed: Vec<ProductImage> = previous
        .into_iter()
        .filter(|old| !product.images.iter().any(|img| img.public_id == old.public_id))
        .collect();
    discard_images(&state, &removed).await;

    Ok(ok(ProductView::from(&product)))
}

pub async fn delete(
    state: web::Data<AppState>,
    Loaded(product): Loaded<Product>,
) -> AppResult<HttpResponse> {
    if !state.products.delete(product.id).await? {
        return Err(AppError::not_found("Producto"));
    }
    state.stores.adjust_product_count(product.store, -1).await?;
    discard_images(&state, &product.images).await;

    log::info!("Product {} deleted", product.id);
    Ok(ok(serde_json::json!({ "id": product.id.to_hex() })))
}

pub async fn update_stock(
    state: web::Data<AppState>,
    Loaded(mut product): Loaded<Product>,
    input: web::Json<StockInput>,
) -> AppResult<HttpResponse> {
    let change = input.into_inner().change().ok_or_else(|| {
        AppError::InvalidInput(vec![
            "Indica exactamente uno de 'stock' o 'delta'".to_string(),
        ])
    })?;
    product.adjust_stock(change);
    state.products.replace(&product).await?;
    Ok(ok(ProductView::from(&product)))
}

pub async fn toggle(
    state: web::Data<AppState>,
    Loaded(mut product): Loaded<Product>,
) -> AppResult<HttpResponse> {
    product.active = !product.active;
    product.touch();
    state.products.replace(&product).await?;
    Ok(ok(ProductView::from(&product)))
}
