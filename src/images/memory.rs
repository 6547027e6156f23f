use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::lock::Mutex;

use super::{ImageHost, ImageHostError, IncomingImage};
use crate::models::ProductImage;

/// Keeps uploaded bytes in memory. Can be told to fail every request.
#[derive(Default)]
pub struct MemoryImageHost {
    assets: Mutex<HashMap<String, IncomingImage>>,
    failing: bool,
}

impl MemoryImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose every call is rejected, as if the provider were down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn contains(&self, public_id: &str) -> bool {
        self.assets.lock().await.contains_key(public_id)
    }

    pub async fn len(&self) -> usize {
        self.assets.lock().await.len()
    }

    fn rejection() -> ImageHostError {
        ImageHostError::Rejected {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

impl ImageHost for MemoryImageHost {
    fn upload<'a>(
        &'a self,
        folder: &'a str,
        image: &'a IncomingImage,
    ) -> BoxFuture<'a, Result<ProductImage, ImageHostError>> {
        Box::pin(async move {
            if self.failing {
                return Err(Self::rejection());
            }
            let public_id = format!("{folder}/{}", uuid::Uuid::new_v4().simple());
            self.assets
                .lock()
                .await
                .insert(public_id.clone(), image.clone());
            Ok(ProductImage {
                url: format!("memory://{public_id}"),
                public_id,
            })
        })
    }

    fn delete<'a>(&'a self, public_id: &'a str) -> BoxFuture<'a, Result<(), ImageHostError>> {
        Box::pin(async move {
            if self.failing {
                return Err(Self::rejection());
            }
            self.assets.lock().await.remove(public_id);
            Ok(())
        })
    }
}
