//! Document storage for accounts, stores and products.
//!
//! Handlers only see the repository traits below; `mongo` backs them with
//! MongoDB collections and `memory` keeps everything in process.

use futures::future::BoxFuture;
use mongodb::bson::oid::ObjectId;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{options::ClientOptions, Client, Database};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::Config;
use crate::models::product::ProductFilter;
use crate::models::{Account, PageQuery, Product, Store};

pub mod memory;
pub mod mongo;

pub use memory::{MemoryAccounts, MemoryProducts, MemoryStores};
pub use mongo::{ensure_indexes, MongoAccounts, MongoProducts, MongoStores};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A unique index rejected the write.
    #[error("duplicate key {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("MongoDB error: {0}")]
    Mongo(mongodb::error::Error),
}

static DUP_KEY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"dup key: \{\s*(?P<field>[\w.]+):\s*"?(?P<value>[^"}]*?)"?\s*\}"#).ok()
});

const DUPLICATE_KEY_CODE: i32 = 11000;

/// The server message of a duplicate-key failure, if `err` is one.
fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => {
            Some(e.message.as_str())
        }
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .as_ref()?
            .iter()
            .find(|e| e.code == DUPLICATE_KEY_CODE)
            .map(|e| e.message.as_str()),
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => Some(e.message.as_str()),
        _ => None,
    }
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        match duplicate_key_message(&err).and_then(parse_duplicate_key) {
            Some((field, value)) => Self::Duplicate { field, value },
            None => Self::Mongo(err),
        }
    }
}

/// Pull the offending field and value out of an E11000 server message.
pub fn parse_duplicate_key(message: &str) -> Option<(String, String)> {
    let captures = DUP_KEY.as_ref()?.captures(message)?;
    Some((
        captures.name("field")?.as_str().to_string(),
        captures.name("value")?.as_str().trim().to_string(),
    ))
}

/// A path segment that is not a 24-character hex ObjectId.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid id: {0}")]
pub struct InvalidId(pub String);

pub fn parse_id(raw: &str) -> Result<ObjectId, InvalidId> {
    ObjectId::parse_str(raw).map_err(|_| InvalidId(raw.to_string()))
}

pub trait AccountRepository: Send + Sync {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Account>>>;
    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, DbResult<Option<Account>>>;
    fn insert<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>>;
    fn replace<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>>;
    /// Newest first, plus the total count.
    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Account>, u64)>>;
    fn count(&self, only_active: bool) -> BoxFuture<'_, DbResult<u64>>;
}

pub trait StoreRepository: Send + Sync {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>>;
    fn find_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, DbResult<Option<Store>>>;
    fn find_by_owner(&self, owner: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>>;
    fn insert<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>>;
    fn replace<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>>;
    fn set_active_for_owner(&self, owner: ObjectId, active: bool) -> BoxFuture<'_, DbResult<u64>>;
    /// Shift the denormalized product count, clamped at zero.
    fn adjust_product_count(&self, id: ObjectId, delta: i64) -> BoxFuture<'_, DbResult<()>>;
    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Store>, u64)>>;
    fn count(&self) -> BoxFuture<'_, DbResult<u64>>;
}

pub trait ProductRepository: Send + Sync {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Product>>>;
    /// Products of one store matching `filter`, featured then newest first.
    fn list<'a>(
        &'a self,
        store: ObjectId,
        filter: &'a ProductFilter,
        page: PageQuery,
    ) -> BoxFuture<'a, DbResult<(Vec<Product>, u64)>>;
    fn all_for_store(&self, store: ObjectId) -> BoxFuture<'_, DbResult<Vec<Product>>>;
    fn insert<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>>;
    fn replace<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>>;
    fn delete(&self, id: ObjectId) -> BoxFuture<'_, DbResult<bool>>;
    fn increment_views(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>>;
    fn increment_clicks(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>>;
    fn count(&self) -> BoxFuture<'_, DbResult<u64>>;
}

pub async fn connect(config: &Config) -> Result<Database, mongodb::error::Error> {
    let client_options = ClientOptions::parse(&config.database_url).await?;
    let client = Client::with_options(client_options)?;
    Ok(client.database(&config.database_name))
}
