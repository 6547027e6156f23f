use actix_web::{web, HttpResponse};

use super::ok;
use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentAccount, Loaded};
use crate::models::store::StoreUpdate;
use crate::models::{Store, StoreView};
use crate::state::AppState;

pub async fn mine(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> AppResult<HttpResponse> {
    let store = state
        .stores
        .find_by_owner(account.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No tienes una tienda".to_string()))?;
    Ok(ok(StoreView::private(&store)))
}

pub async fn update(
    state: web::Data<AppState>,
    Loaded(mut store): Loaded<Store>,
    input: web::Json<StoreUpdate>,
) -> AppResult<HttpResponse> {
    store.apply(input.into_inner());
    store.validate()?;
    state.stores.replace(&store).await?;

    log::info!("Store {} updated", store.slug);
    Ok(ok(StoreView::private(&store)))
}
