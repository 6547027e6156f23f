//! In-process repositories with the same uniqueness rules as the MongoDB indexes.

use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::lock::Mutex;
use mongodb::bson::oid::ObjectId;

use super::{AccountRepository, DbError, DbResult, ProductRepository, StoreRepository};
use crate::models::product::ProductFilter;
use crate::models::{Account, PageQuery, Product, Store};

fn paginate<T: Clone>(items: Vec<T>, page: PageQuery) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    (items.into_iter().skip(skip).take(limit).collect(), total)
}

#[derive(Default)]
pub struct MemoryAccounts {
    items: Mutex<HashMap<ObjectId, Account>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for MemoryAccounts {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Account>>> {
        Box::pin(async move { Ok(self.items.lock().await.get(&id).cloned()) })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, DbResult<Option<Account>>> {
        Box::pin(async move {
            let email = email.trim().to_lowercase();
            let items = self.items.lock().await;
            Ok(items.values().find(|a| a.email == email).cloned())
        })
    }

    fn insert<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            let mut items = self.items.lock().await;
            if items.values().any(|a| a.email == account.email) {
                return Err(DbError::Duplicate {
                    field: "email".to_string(),
                    value: account.email.clone(),
                });
            }
            items.insert(account.id, account.clone());
            Ok(())
        })
    }

    fn replace<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            let mut items = self.items.lock().await;
            if items
                .values()
                .any(|a| a.id != account.id && a.email == account.email)
            {
                return Err(DbError::Duplicate {
                    field: "email".to_string(),
                    value: account.email.clone(),
                });
            }
            if let Some(existing) = items.get_mut(&account.id) {
                *existing = account.clone();
            }
            Ok(())
        })
    }

    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Account>, u64)>> {
        Box::pin(async move {
            let mut accounts: Vec<Account> = self.items.lock().await.values().cloned().collect();
            accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(paginate(accounts, page))
        })
    }

    fn count(&self, only_active: bool) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move {
            let items = self.items.lock().await;
            Ok(items.values().filter(|a| !only_active || a.active).count() as u64)
        })
    }
}

#[derive(Default)]
pub struct MemoryStores {
    items: Mutex<HashMap<ObjectId, Store>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreRepository for MemoryStores {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>> {
        Box::pin(async move { Ok(self.items.lock().await.get(&id).cloned()) })
    }

    fn find_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, DbResult<Option<Store>>> {
        Box::pin(async move {
            let items = self.items.lock().await;
            Ok(items.values().find(|s| s.slug == slug).cloned())
        })
    }

    fn find_by_owner(&self, owner: ObjectId) -> BoxFuture<'_, DbResult<Option<Store>>> {
        Box::pin(async move {
            let items = self.items.lock().await;
            Ok(items.values().find(|s| s.owner == owner).cloned())
        })
    }

    fn insert<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            let mut items = self.items.lock().await;
            if items.values().any(|s| s.slug == store.slug) {
                return Err(DbError::Duplicate {
                    field: "slug".to_string(),
                    value: store.slug.clone(),
                });
            }
            items.insert(store.id, store.clone());
            Ok(())
        })
    }

    fn replace<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            if let Some(existing) = self.items.lock().await.get_mut(&store.id) {
                *existing = store.clone();
            }
            Ok(())
        })
    }

    fn set_active_for_owner(&self, owner: ObjectId, active: bool) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move {
            let mut items = self.items.lock().await;
            let mut modified = 0;
            for store in items.values_mut().filter(|s| s.owner == owner) {
                if store.active != active {
                    store.active = active;
                    modified += 1;
                }
            }
            Ok(modified)
        })
    }

    fn adjust_product_count(&self, id: ObjectId, delta: i64) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            if let Some(store) = self.items.lock().await.get_mut(&id) {
                store.product_count = store.product_count.saturating_add(delta).max(0);
            }
            Ok(())
        })
    }

    fn list(&self, page: PageQuery) -> BoxFuture<'_, DbResult<(Vec<Store>, u64)>> {
        Box::pin(async move {
            let mut stores: Vec<Store> = self.items.lock().await.values().cloned().collect();
            stores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(paginate(stores, page))
        })
    }

    fn count(&self) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move { Ok(self.items.lock().await.len() as u64) })
    }
}

#[derive(Default)]
pub struct MemoryProducts {
    items: Mutex<HashMap<ObjectId, Product>>,
}

impl MemoryProducts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductRepository for MemoryProducts {
    fn find_by_id(&self, id: ObjectId) -> BoxFuture<'_, DbResult<Option<Product>>> {
        Box::pin(async move { Ok(self.items.lock().await.get(&id).cloned()) })
    }

    fn list<'a>(
        &'a self,
        store: ObjectId,
        filter: &'a ProductFilter,
        page: PageQuery,
    ) -> BoxFuture<'a, DbResult<(Vec<Product>, u64)>> {
        Box::pin(async move {
            let mut products: Vec<Product> = self
                .items
                .lock()
                .await
                .values()
                .filter(|p| p.store == store && filter.matches(p))
                .cloned()
                .collect();
            products.sort_by(|a, b| {
                b.featured
                    .cmp(&a.featured)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            Ok(paginate(products, page))
        })
    }

    fn all_for_store(&self, store: ObjectId) -> BoxFuture<'_, DbResult<Vec<Product>>> {
        Box::pin(async move {
            let items = self.items.lock().await;
            Ok(items.values().filter(|p| p.store == store).cloned().collect())
        })
    }

    fn insert<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            self.items.lock().await.insert(product.id, product.clone());
            Ok(())
        })
    }

    fn replace<'a>(&'a self, product: &'a Product) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            if let Some(existing) = self.items.lock().await.get_mut(&product.id) {
                *existing = product.clone();
            }
            Ok(())
        })
    }

    fn delete(&self, id: ObjectId) -> BoxFuture<'_, DbResult<bool>> {
        Box::pin(async move { Ok(self.items.lock().await.remove(&id).is_some()) })
    }

    fn increment_views(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            if let Some(product) = self.items.lock().await.get_mut(&id) {
                product.views += 1;
            }
            Ok(())
        })
    }

    fn increment_clicks(&self, id: ObjectId) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move {
            if let Some(product) = self.items.lock().await.get_mut(&id) {
                product.clicks += 1;
            }
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, DbResult<u64>> {
        Box::pin(async move { Ok(self.items.lock().await.len() as u64) })
    }
}
