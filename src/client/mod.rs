//! Typed HTTP client for the NilHub API (auth, stores, products, uploads,
//! stats), used by dashboards and tooling.
//!
//! Every call unwraps the `{ success, data }` envelope; error envelopes come
//! back as [`ClientError::Api`] carrying the server's message.

mod session;

pub use session::{FileSessionStore, MemorySessionStore, Session, SessionError, SessionStore};

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handlers::stats::{PlatformStats, StoreStats};
use crate::images::{IncomingImage, IMAGE_FIELD};
use crate::models::account::{AuthPayload, LoginInput, RegisterInput, SessionInfo};
use crate::models::{ProductImage, ProductView, StoreView};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    /// The server answered with an error envelope.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// True when the server refused the credentials, as opposed to being unreachable.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: crate::models::Pagination,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let parsed = url::Url::parse(base)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base: parsed.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.request(method, format!("{}/api{path}", self.base));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn finish(request: reqwest::RequestBuilder) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::finish(request).await
    }

    async fn call<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (status, bytes) = self.send(method, path, body).await?;
        let envelope: Envelope<T> = decode(status, &bytes)?;
        envelope
            .data
            .ok_or_else(|| ClientError::Parse(format!("missing data in {path} response")))
    }

    async fn call_page<T: DeserializeOwned>(&self, path: &str) -> Result<Page<T>, ClientError> {
        let (status, bytes) = self.send::<()>(Method::GET, path, None).await?;
        let _: Envelope<serde_json::Value> = decode(status, &bytes)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(e.to_string()))
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<AuthPayload, ClientError> {
        self.call(Method::POST, "/auth/register", Some(input)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ClientError> {
        let input = LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.call(Method::POST, "/auth/login", Some(&input)).await
    }

    pub async fn me(&self) -> Result<SessionInfo, ClientError> {
        self.call::<_, ()>(Method::GET, "/auth/me", None).await
    }

    pub async fn my_store(&self) -> Result<StoreView, ClientError> {
        self.call::<_, ()>(Method::GET, "/stores/mine", None).await
    }

    pub async fn update_store<B: Serialize + ?Sized>(
        &self,
        store_id: &str,
        update: &B,
    ) -> Result<StoreView, ClientError> {
        self.call(Method::PUT, &format!("/stores/{store_id}"), Some(update))
            .await
    }

    pub async fn create_product<B: Serialize + ?Sized>(
        &self,
        store_id: &str,
        product: &B,
    ) -> Result<ProductView, ClientError> {
        self.call(Method::POST, &format!("/stores/{store_id}/products"), Some(product))
            .await
    }

    pub async fn my_products(&self, page: u64) -> Result<Page<ProductView>, ClientError> {
        self.call_page(&format!("/products?page={page}")).await
    }

    pub async fn update_product<B: Serialize + ?Sized>(
        &self,
        product_id: &str,
        update: &B,
    ) -> Result<ProductView, ClientError> {
        self.call(Method::PUT, &format!("/products/{product_id}"), Some(update))
            .await
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<(), ClientError> {
        self.call::<serde_json::Value, ()>(Method::DELETE, &format!("/products/{product_id}"), None)
            .await
            .map(|_| ())
    }

    /// Upload images to the caller's store folder in one multipart request.
    pub async fn upload_images(&self, images: &[IncomingImage]) -> Result<Vec<ProductImage>, ClientError> {
        let mut form = Form::new();
        for (i, image) in images.iter().enumerate() {
            let part = Part::bytes(image.bytes.clone())
                .file_name(format!("image-{i}"))
                .mime_str(&image.content_type)?;
            form = form.part(IMAGE_FIELD, part);
        }
        let request = self.request(Method::POST, "/uploads/images").multipart(form);
        let (status, bytes) = Self::finish(request).await?;
        let envelope: Envelope<Vec<ProductImage>> = decode(status, &bytes)?;
        envelope
            .data
            .ok_or_else(|| ClientError::Parse("missing data in upload response".to_string()))
    }

    pub async fn delete_image(&self, public_id: &str) -> Result<(), ClientError> {
        self.call::<serde_json::Value, ()>(Method::DELETE, &format!("/uploads/images/{public_id}"), None)
            .await
            .map(|_| ())
    }

    pub async fn my_stats(&self) -> Result<StoreStats, ClientError> {
        self.call::<_, ()>(Method::GET, "/stats/mine", None).await
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, ClientError> {
        self.call::<_, ()>(Method::GET, "/admin/stats", None).await
    }
}

/// Parse an envelope, turning error envelopes and non-2xx statuses into errors.
fn decode<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<Envelope<T>, ClientError> {
    match serde_json::from_slice::<Envelope<T>>(bytes) {
        Ok(envelope) if envelope.success && status.is_success() => Ok(envelope),
        Ok(envelope) => Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string()),
        }),
        Err(_) if !status.is_success() => Err(ClientError::Api {
            status: status.as_u16(),
            message: String::from_utf8_lossy(bytes).into_owned(),
        }),
        Err(e) => Err(ClientError::Parse(e.to_string())),
    }
}
