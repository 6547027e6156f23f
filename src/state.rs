use std::sync::Arc;

use chrono::Duration;
use mongodb::Database;

use crate::config::{Config, UploadLimits};
use crate::db::{
    AccountRepository, MemoryAccounts, MemoryProducts, MemoryStores, MongoAccounts, MongoProducts,
    MongoStores, ProductRepository, StoreRepository,
};
use crate::error::ErrorTranslator;
use crate::images::{CloudinaryHost, ImageHost, MemoryImageHost, UnconfiguredHost};
use crate::token::TokenService;

/// Shared, read-only state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub stores: Arc<dyn StoreRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub images: Arc<dyn ImageHost>,
    pub tokens: TokenService,
    pub translator: ErrorTranslator,
    pub uploads: UploadLimits,
}

impl AppState {
    pub fn new(config: &Config, db: &Database) -> Self {
        let images: Arc<dyn ImageHost> = match &config.cloudinary {
            Some(cloudinary) => Arc::new(CloudinaryHost::new(cloudinary.clone())),
            None => {
                log::warn!("Cloudinary credentials missing; image uploads are disabled");
                Arc::new(UnconfiguredHost)
            }
        };

        Self {
            accounts: Arc::new(MongoAccounts::new(db)),
            stores: Arc::new(MongoStores::new(db)),
            products: Arc::new(MongoProducts::new(db)),
            images,
            tokens: TokenService::new(
                &config.jwt_secret,
                Duration::days(config.jwt_expires_in_days),
            ),
            translator: ErrorTranslator::new(config.detailed_errors(), config.uploads),
            uploads: config.uploads,
        }
    }

    /// Everything in process: memory repositories and image host.
    pub fn in_memory(tokens: TokenService, detailed_errors: bool) -> Self {
        Self::in_memory_with_images(tokens, detailed_errors, Arc::new(MemoryImageHost::new()))
    }

    pub fn in_memory_with_images(
        tokens: TokenService,
        detailed_errors: bool,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        let uploads = UploadLimits::default();
        Self {
            accounts: Arc::new(MemoryAccounts::new()),
            stores: Arc::new(MemoryStores::new()),
            products: Arc::new(MemoryProducts::new()),
            images,
            tokens,
            translator: ErrorTranslator::new(detailed_errors, uploads),
            uploads,
        }
    }
}
