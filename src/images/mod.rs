//! Product image intake and hosting.
//!
//! Uploads arrive as multipart bodies, are checked against the configured
//! limits, then handed to an [`ImageHost`]. Hosted assets are addressed by
//! their `public_id` so they can be deleted with the product.

use actix_multipart::Multipart;
use futures::future::BoxFuture;
use futures::stream::StreamExt;
use thiserror::Error;

use crate::config::UploadLimits;
use crate::models::ProductImage;

pub mod cloudinary;
pub mod memory;

pub use cloudinary::CloudinaryHost;
pub use memory::MemoryImageHost;

/// Multipart field that carries images.
pub const IMAGE_FIELD: &str = "images";

pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file exceeds the size limit")]
    FileTooLarge,
    #[error("too many files")]
    TooManyFiles,
    #[error("unexpected field: {0}")]
    UnexpectedField(String),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("no files received")]
    Empty,
    #[error("malformed multipart body: {0}")]
    Multipart(String),
}

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("Cloudinary is not configured")]
    NotConfigured,
    #[error("Cloudinary request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Cloudinary rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// An image accepted from the client, not yet hosted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub trait ImageHost: Send + Sync {
    /// Store `image` under `folder`; returns its public URL and asset id.
    fn upload<'a>(
        &'a self,
        folder: &'a str,
        image: &'a IncomingImage,
    ) -> BoxFuture<'a, Result<ProductImage, ImageHostError>>;

    fn delete<'a>(&'a self, public_id: &'a str) -> BoxFuture<'a, Result<(), ImageHostError>>;
}

/// Stand-in used when no hosting credentials are configured.
#[derive(Debug, Default)]
pub struct UnconfiguredHost;

impl ImageHost for UnconfiguredHost {
    fn upload<'a>(
        &'a self,
        _folder: &'a str,
        _image: &'a IncomingImage,
    ) -> BoxFuture<'a, Result<ProductImage, ImageHostError>> {
        Box::pin(async { Err(ImageHostError::NotConfigured) })
    }

    fn delete<'a>(&'a self, _public_id: &'a str) -> BoxFuture<'a, Result<(), ImageHostError>> {
        Box::pin(async { Err(ImageHostError::NotConfigured) })
    }
}

/// Folder holding a store's assets. Ownership of an asset is checked against it.
pub fn store_folder(store_id: &str) -> String {
    format!("nilhub/{store_id}")
}

/// Drain a multipart body into images, enforcing field name, type, size and count.
pub async fn read_images(
    mut payload: Multipart,
    limits: UploadLimits,
) -> Result<Vec<IncomingImage>, UploadError> {
    let mut images = Vec::new();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| UploadError::Multipart(e.to_string()))?;

        let name = field.name().unwrap_or_default().to_string();
        if name != IMAGE_FIELD {
            return Err(UploadError::UnexpectedField(name));
        }
        if images.len() >= limits.max_files {
            return Err(UploadError::TooManyFiles);
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            return Err(UploadError::UnsupportedType(content_type));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
            if bytes.len() + chunk.len() > limits.max_file_size_bytes() {
                return Err(UploadError::FileTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        images.push(IncomingImage {
            content_type,
            bytes,
        });
    }

    if images.is_empty() {
        return Err(UploadError::Empty);
    }
    Ok(images)
}
