use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::{created, ok};
use crate::db::DbError;
use crate::error::{AppError, AppResult, AuthFailure};
use crate::middleware::CurrentAccount;
use crate::models::account::{
    hash_password, verify_password, AuthPayload, LoginInput, ProfileUpdateInput, RegisterInput,
    SessionInfo,
};
use crate::models::store::{slug_candidates, slugify};
use crate::models::{Account, AccountView, Store, StoreView};
use crate::state::AppState;

const SLUG_ATTEMPTS: usize = 20;

/// Insert a store under the first free slug derived from its name.
async fn create_store(
    state: &AppState,
    owner: &Account,
    name: &str,
    whatsapp: Option<&str>,
) -> AppResult<Store> {
    let base = slugify(name);
    for slug in slug_candidates(&base).take(SLUG_ATTEMPTS) {
        if state.stores.find_by_slug(&slug).await?.is_some() {
            continue;
        }
        let store = Store::new(owner.id, name, slug, whatsapp);
        store.validate()?;
        match state.stores.insert(&store).await {
            Ok(()) => return Ok(store),
            // Taken between the lookup and the insert; try the next one.
            Err(DbError::Duplicate { field, .. }) if field == "slug" => continue,
            Err(err) => return Err(err.into()),
        }
    }

    let slug = format!("{base}-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let store = Store::new(owner.id, name, slug, whatsapp);
    state.stores.insert(&store).await?;
    Ok(store)
}

pub async fn register(
    state: web::Data<AppState>,
    input: web::Json<RegisterInput>,
) -> AppResult<HttpResponse> {
    let input = input.into_inner();
    let problems = input.problems();
    if !problems.is_empty() {
        return Err(AppError::InvalidInput(problems));
    }

    let password_hash = hash_password(&input.password).map_err(AppError::internal)?;
    let account = Account::new(input.name.trim().to_string(), &input.email, password_hash);
    state.accounts.insert(&account).await?;

    let store = create_store(&state, &account, &input.store_name, input.whatsapp.as_deref()).await?;
    let token = state
        .tokens
        .issue(&account.id.to_hex())
        .map_err(AppError::internal)?;

    log::info!("Registered account {} with store {}", account.id, store.slug);
    Ok(created(AuthPayload {
        token,
        user: AccountView::from(&account),
        store: Some(StoreView::private(&store)),
    }))
}

pub async fn login(
    state: web::Data<AppState>,
    input: web::Json<LoginInput>,
) -> AppResult<HttpResponse> {
    let account = match state.accounts.find_by_email(&input.email).await? {
        Some(account) if verify_password(&account.password_hash, &input.password) => account,
        _ => {
            log::warn!("Failed login attempt for {}", input.email.trim());
            return Err(AppError::Unauthenticated(AuthFailure::InvalidCredentials));
        }
    };
    if !account.active {
        return Err(AppError::Unauthenticated(AuthFailure::AccountInactive));
    }

    let store = state.stores.find_by_owner(account.id).await?;
    let token = state
        .tokens
        .issue(&account.id.to_hex())
        .map_err(AppError::internal)?;

    log::info!("Account {} signed in", account.id);
    Ok(ok(AuthPayload {
        token,
        user: AccountView::from(&account),
        store: store.as_ref().map(StoreView::private),
    }))
}

pub async fn me(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> AppResult<HttpResponse> {
    let store = state.stores.find_by_owner(account.id).await?;
    Ok(ok(SessionInfo {
        user: AccountView::from(&account),
        store: store.as_ref().map(StoreView::private),
    }))
}

pub async fn update_profile(
    state: web::Data<AppState>,
    CurrentAccount(current): CurrentAccount,
    input: web::Json<ProfileUpdateInput>,
) -> AppResult<HttpResponse> {
    let input = input.into_inner();
    let problems = input.problems();
    if !problems.is_empty() {
        return Err(AppError::InvalidInput(problems));
    }

    let mut account = state
        .accounts
        .find_by_id(current.id)
        .await?
        .ok_or(AppError::Unauthenticated(AuthFailure::AccountNotFound))?;

    if let Some(name) = input.name {
        account.name = name.trim().to_string();
    }
    if let (Some(new_password), Some(current_password)) = (input.new_password, input.current_password) {
        if !verify_password(&account.password_hash, &current_password) {
            return Err(AppError::BadRequest(
                "La contraseña actual es incorrecta".to_string(),
            ));
        }
        account.password_hash = hash_password(&new_password).map_err(AppError::internal)?;
    }
    account.updated_at = Utc::now();
    state.accounts.replace(&account).await?;

    Ok(ok(AccountView::from(&account)))
}
