use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::ok;
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentAccount;
use crate::models::{Product, ProductView};
use crate::state::AppState;

const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_products: usize,
    pub active_products: usize,
    pub out_of_stock: usize,
    pub total_views: i64,
    pub total_clicks: i64,
    pub top_products: Vec<ProductView>,
}

/// Aggregate a store's catalog. Top products are ordered by clicks, then views.
pub fn summarize(products: &[Product]) -> StoreStats {
    let mut ranked: Vec<&Product> = products.iter().collect();
    ranked.sort_by(|a, b| b.clicks.cmp(&a.clicks).then(b.views.cmp(&a.views)));

    StoreStats {
        total_products: products.len(),
        active_products: products.iter().filter(|p| p.active).count(),
        out_of_stock: products.iter().filter(|p| !p.in_stock).count(),
        total_views: products.iter().map(|p| p.views).sum(),
        total_clicks: products.iter().map(|p| p.clicks).sum(),
        top_products: ranked
            .into_iter()
            .take(TOP_PRODUCTS)
            .map(ProductView::from)
            .collect(),
    }
}

pub async fn mine(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> AppResult<HttpResponse> {
    let store = state
        .stores
        .find_by_owner(account.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No tienes una tienda".to_string()))?;
    let products = state.products.all_for_store(store.id).await?;
    Ok(ok(summarize(&products)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub accounts: u64,
    pub active_accounts: u64,
    pub stores: u64,
    pub products: u64,
}

pub async fn platform(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let stats = PlatformStats {
        accounts: state.accounts.count(false).await?,
        active_accounts: state.accounts.count(true).await?,
        stores: state.stores.count().await?,
        products: state.products.count().await?,
    };
    Ok(ok(stats))
}
