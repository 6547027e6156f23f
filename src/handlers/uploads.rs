use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::products::discard_images;
use super::{created, ok};
use crate::error::{AppError, AppResult};
use crate::images::{read_images, store_folder};
use crate::middleware::CurrentAccount;
use crate::models::{AuthenticatedAccount, ProductImage, Store};
use crate::state::AppState;

async fn own_store(state: &AppState, account: &AuthenticatedAccount) -> AppResult<Store> {
    state
        .stores
        .find_by_owner(account.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No tienes una tienda".to_string()))
}

/// Host every image in the `images` field under the caller's store folder.
/// Either all images are hosted or none are.
pub async fn upload_images(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let store = own_store(&state, &account).await?;
    let incoming = read_images(payload, state.uploads).await?;
    let folder = store_folder(&store.id.to_hex());

    let mut hosted: Vec<ProductImage> = Vec::with_capacity(incoming.len());
    for image in &incoming {
        match state.images.upload(&folder, image).await {
            Ok(uploaded) => hosted.push(uploaded),
            Err(err) => {
                discard_images(&state, &hosted).await;
                return Err(err.into());
            }
        }
    }

    log::info!("Uploaded {} image(s) to {}", hosted.len(), folder);
    Ok(created(hosted))
}

pub async fn delete_image(
    state: web::Data<AppState>,
    CurrentAccount(account): CurrentAccount,
    public_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let public_id = public_id.into_inner();
    if !account.is_admin() {
        let store = own_store(&state, &account).await?;
        let prefix = format!("{}/", store_folder(&store.id.to_hex()));
        if !public_id.starts_with(&prefix) {
            return Err(AppError::forbidden());
        }
    }

    state.images.delete(&public_id).await?;
    Ok(ok(json!({ "public_id": public_id })))
}
