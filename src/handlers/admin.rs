//! Platform administration. Every route here sits behind `RequireAdmin`.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use super::{ok, paginated};
use crate::db::parse_id;
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentAccount;
use crate::models::account::AccountStatusInput;
use crate::models::{AccountView, PageQuery, Pagination, StoreView};
use crate::state::AppState;

pub async fn list_accounts(
    state: web::Data<AppState>,
    page: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = page.into_inner().normalized();
    let (accounts, total) = state.accounts.list(page).await?;
    let views: Vec<AccountView> = accounts.iter().map(AccountView::from).collect();
    Ok(paginated(views, Pagination::new(page, total)))
}

/// Activate or deactivate an account together with its stores. A
/// deactivated account is rejected on its next authenticated request.
pub async fn set_account_status(
    state: web::Data<AppState>,
    CurrentAccount(admin): CurrentAccount,
    id: web::Path<String>,
    input: web::Json<AccountStatusInput>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&id)?;
    if id == admin.id {
        return Err(AppError::BadRequest(
            "No puedes cambiar el estado de tu propia cuenta".to_string(),
        ));
    }

    let mut account = state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;
    account.active = input.active;
    account.updated_at = Utc::now();
    state.accounts.replace(&account).await?;
    let stores = state.stores.set_active_for_owner(id, input.active).await?;

    log::info!(
        "Admin {} set account {} active={} ({} store(s))",
        admin.id,
        id,
        input.active,
        stores
    );
    Ok(ok(json!({ "user": AccountView::from(&account), "stores_updated": stores })))
}

pub async fn list_stores(
    state: web::Data<AppState>,
    page: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = page.into_inner().normalized();
    let (stores, total) = state.stores.list(page).await?;
    let views: Vec<StoreView> = stores.iter().map(StoreView::private).collect();
    Ok(paginated(views, Pagination::new(page, total)))
}
