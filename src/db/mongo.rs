use futures::future::BoxFuture;
use futures::stream::StreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document, Regex as BsonRegex};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Cursor, Database, IndexModel};
use serde::de::DeserializeOwned;

use super::{AccountRepository, DbResult, ProductRepository, StoreRepository};
use crate::models::product::ProductFilter;
use crate::models::{Account, PageQuery, Product, Store};

pub const ACCOUNTS: &str = "accounts";
pub const STORES: &str = "stores";
pub const PRODUCTS: &str = "products";

async fn collect<T>(mut cursor: Cursor<T>) -> DbResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        items.push(result?);
    }
    Ok(items)
}

fn page_options(page: PageQuery, sort: Document) -> FindOptions {
    FindOptions::builder()
        .sort(sort)
        .skip(page.skip())
        .limit(i64::try_from(page.limit).unwrap_or(i64::MAX))
        .build()
}

/// Unique indexes back the email and slug invariants.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<Account>(ACCOUNTS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    let stores = db.collection::<Store>(STORES);
    stores
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;
    stores
        .create_index(IndexModel::builder().keys(doc! { "owner": 1 }).build(), None)
        .await?;

    db.collection::<Product>(PRODUCTS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "store": 1, "active": 1, "created_at": -1 })
                .build(),
            None,
        )
        .await?;

    log::info!("MongoDB indexes ensured");
    Ok(())
}

#[derive(Clone)]
pub struct MongoAccounts {
    collection: Collection<Account>,
}

impl MongoAccounts {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(ACCOUNTS),
        }
    }
}

impl AccountRepository for MongoAccounts {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Account>>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! { "_id": id }, None).await?) })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, DbResult<Option<Account>>> {
        Box::pin(async move {
            let email = email.trim().to_lowercase();
            Ok(self.collection.find_one(doc! { "email": email }, None).await?)
        })
    }

    fn insert<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection.insert_one(account, None).await?;
            Ok(())
        })
    }

    fn replace<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection
                .replace_one(doc! { "_id": account.id }, account, None)
                .await?;
            Ok(())
        })
    }

    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Account>, u64)>> {
        Box::pin(async move {
            let total = self.collection.count_documents(doc! {}, None).await?;
            let cursor = self
                .collection
                .find(doc! {}, page_options(page, doc! { "created_at": -1 }))
                .await?;
            Ok((collect(cursor).await?, total))
        })
    }

    fn count(&self, only_active: bool) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move {
            let filter = if only_active {
                doc! { "active": true }
            } else {
                doc! {}
            };
            Ok(self.collection.count_documents(filter, None).await?)
        })
    }
}

#[derive(Clone)]
pub struct MongoStores {
    collection: Collection<Store>,
}

impl MongoStores {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(STORES),
        }
    }
}

impl StoreRepository for MongoStores {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! { "_id": id }, None).await?) })
    }

    fn find_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, DbResult<Option<Store>>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! { "slug": slug }, None).await?) })
    }

    fn find_by_owner(&self, owner: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! { "owner": owner }, None).await?) })
    }

    fn insert<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection.insert_one(store, None).await?;
            Ok(())
        })
    }

    fn replace<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection
                .replace_one(doc! { "_id": store.id }, store, None)
                .await?;
            Ok(())
        })
    }

    fn set_active_for_owner(&self, owner: ObjectId, active: bool) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move {
            let result = self
                .collection
                .update_many(doc! { "owner": owner }, doc! { "$set": { "active": active } }, None)
                .await?;
            Ok(result.modified_count)
        })
    }

    fn adjust_product_count(&self, id: ObjectId, delta: i64) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            let pipeline = vec![doc! {
                "$set": {
                    "product_count": { "$max": [0, { "$add": ["$product_count", delta] }] }
                }
            }];
            self.collection
                .update_one(doc! { "_id": id }, pipeline, None)
                .await?;
            Ok(())
        })
    }

    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Store>, u64)>> {
        Box::pin(async move {
            let total = self.collection.count_documents(doc! {}, None).await?;
            let cursor = self
                .collection
                .find(doc! {}, page_options(page, doc! { "created_at": -1 }))
                .await?;
            Ok((collect(cursor).await?, total))
        })
    }

    fn count(&self) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move { Ok(self.collection.count_documents(doc! {}, None).await?) })
    }
}

#[derive(Clone)]
pub struct MongoProducts {
    collection: Collection<Product>,
}

impl MongoProducts {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(PRODUCTS),
        }
    }
}

/// Translate catalog filters into a query document.
pub fn product_query(store: ObjectId, filter: &ProductFilter) -> Document {
    let mut query = doc! { "store": store };
    if filter.only_active {
        query.insert("active", true);
    }
    if let Some(category) = filter.category {
        query.insert("category", category.as_str());
    }
    if let Some(featured) = filter.featured {
        query.insert("featured", featured);
    }
    if let Some(in_stock) = filter.in_stock {
        query.insert("in_stock", in_stock);
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = BsonRegex {
            pattern: regex::escape(term),
            options: "i".to_string(),
        };
        query.insert(
            "$or",
            vec![
                doc! { "name": pattern.clone() },
                doc! { "description": pattern },
            ],
        );
    }
    query
}

impl ProductRepository for MongoProducts {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Product>>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! { "_id": id }, None).await?) })
    }

    fn list<'a>(
        &'a self,
        store: ObjectId,
        filter: &'a ProductFilter,
        page: PageQuery,
    ) -> BoxFuture<'a, DbResult<(Vec<Product>, u64)>> {
        Box::pin(async move {
            let query = product_query(store, filter);
            let total = self.collection.count_documents(query.clone(), None).await?;
            let cursor = self
                .collection
                .find(
                    query,
                    page_options(page, doc! { "featured": -1, "created_at": -1 }),
                )
                .await?;
            Ok((collect(cursor).await?, total))
        })
    }

    fn all_for_store(&self, store: ObjectId) -> BoxFuture<'_, DbResult<Vec<Product>>> {
        Box::pin(async move {
            let cursor = self.collection.find(doc! { "store": store }, None).await?;
            collect(cursor).await
        })
    }

    fn insert<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection.insert_one(product, None).await?;
            Ok(())
        })
    }

    fn replace<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.collection
                .replace_one(doc! { "_id": product.id }, product, None)
                .await?;
            Ok(())
        })
    }

    fn delete(&self, id: ObjectId) -> BoxFuture<'_, DbResult<bool>> {
        Box::pin(async move {
            let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
            Ok(result.deleted_count == 1)
        })
    }

    fn increment_views(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            self.collection
                .update_one(doc! { "_id": id }, doc! { "$inc": { "views": 1 } }, None)
                .await?;
            Ok(())
        })
    }

    fn increment_clicks(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            self.collection
                .update_one(doc! { "_id": id }, doc! { "$inc": { "clicks": 1 } }, None)
                .await?;
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move { Ok(self.collection.count_documents(doc! {}, None).await?) })
    }
}
