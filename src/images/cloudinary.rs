use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ImageHost, ImageHostError, IncomingImage};
use crate::config::CloudinaryConfig;
use crate::models::ProductImage;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct CloudinaryHost {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.config.cloud_name)
    }

    /// Sorted `key=value` pairs joined by `&`, secret appended, SHA-256 hex.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        signature(params, &self.config.api_secret)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        form: &[(&str, &str)],
    ) -> Result<T, ImageHostError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => status.to_string(),
        };
        Err(ImageHostError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) fn signature(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ImageHost for CloudinaryHost {
    fn upload<'a>(
        &'a self,
        folder: &'a str,
        image: &'a IncomingImage,
    ) -> BoxFuture<'a, Result<ProductImage, ImageHostError>> {
        Box::pin(async move {
            let timestamp = Utc::now().timestamp().to_string();
            let public_id = uuid::Uuid::new_v4().simple().to_string();
            let signature = self.sign(&[
                ("folder", folder),
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ]);
            let file = format!(
                "data:{};base64,{}",
                image.content_type,
                STANDARD.encode(&image.bytes)
            );

            let uploaded: UploadResponse = self
                .post(
                    "upload",
                    &[
                        ("file", file.as_str()),
                        ("folder", folder),
                        ("public_id", public_id.as_str()),
                        ("timestamp", timestamp.as_str()),
                        ("api_key", self.config.api_key.as_str()),
                        ("signature", signature.as_str()),
                        ("signature_algorithm", "sha256"),
                    ],
                )
                .await?;

            log::info!("Uploaded image {} to Cloudinary", uploaded.public_id);
            Ok(ProductImage {
                url: uploaded.secure_url,
                public_id: uploaded.public_id,
            })
        })
    }

    fn delete<'a>(&'a self, public_id: &'a str) -> BoxFuture<'a, Result<(), ImageHostError>> {
        Box::pin(async move {
            let timestamp = Utc::now().timestamp().to_string();
            let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

            let destroyed: DestroyResponse = self
                .post(
                    "destroy",
                    &[
                        ("public_id", public_id),
                        ("timestamp", timestamp.as_str()),
                        ("api_key", self.config.api_key.as_str()),
                        ("signature", signature.as_str()),
                        ("signature_algorithm", "sha256"),
                    ],
                )
                .await?;

            // "not found" means it is already gone.
            if destroyed.result != "ok" {
                log::warn!("Cloudinary destroy {public_id}: {}", destroyed.result);
            }
            Ok(())
        })
    }
}
