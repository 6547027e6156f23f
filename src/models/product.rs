use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{double_option, FieldError, ValidationErrors};
use crate::images::store_folder;

pub const MAX_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ropa,
    Calzado,
    Accesorios,
    Electronica,
    Hogar,
    Belleza,
    Alimentos,
    Deportes,
    Juguetes,
    Otros,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ropa => "ropa",
            Self::Calzado => "calzado",
            Self::Accesorios => "accesorios",
            Self::Electronica => "electronica",
            Self::Hogar => "hogar",
            Self::Belleza => "belleza",
            Self::Alimentos => "alimentos",
            Self::Deportes => "deportes",
            Self::Juguetes => "juguetes",
            Self::Otros => "otros",
        }
    }
}

/// A hosted image. `public_id` is the asset id used to delete it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub store: ObjectId,
    pub owner: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub sale_price: Option<f64>,
    pub stock: i64,
    pub in_stock: bool,
    pub category: Category,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub active: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(store: ObjectId, owner: ObjectId, input: ProductInput) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: ObjectId::new(),
            store,
            owner,
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            sale_price: input.sale_price,
            stock: input.stock,
            in_stock: false,
            category: input.category,
            images: input.images,
            active: input.active.unwrap_or(true),
            featured: input.featured,
            views: 0,
            clicks: 0,
            created_at: now,
            updated_at: now,
        };
        product.touch();
        product
    }

    /// Recompute derived fields. Called on every write.
    pub fn touch(&mut self) {
        self.in_stock = self.stock > 0;
        self.updated_at = Utc::now();
    }

    pub fn apply(&mut self, update: ProductUpdate) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(sale_price) = update.sale_price {
            self.sale_price = sale_price;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(images) = update.images {
            self.images = images;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(featured) = update.featured {
            self.featured = featured;
        }
        self.touch();
    }

    /// Set stock absolutely, or shift it by `delta`. Never goes below zero.
    pub fn adjust_stock(&mut self, change: StockChange) {
        self.stock = match change {
            StockChange::Set(stock) => stock,
            StockChange::Delta(delta) => self.stock.saturating_add(delta),
        }
        .max(0);
        self.touch();
    }

    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if !(2..=100).contains(&self.name.chars().count()) {
            errors.push(FieldError::new(
                "name",
                "El nombre del producto debe tener entre 2 y 100 caracteres",
            ));
        }
        if self.description.as_ref().is_some_and(|d| d.chars().count() > 2000) {
            errors.push(FieldError::new(
                "description",
                "La descripción no puede superar 2000 caracteres",
            ));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            errors.push(FieldError::new("price", "El precio no puede ser negativo"));
        }
        if let Some(sale_price) = self.sale_price {
            if !sale_price.is_finite() || sale_price < 0.0 {
                errors.push(FieldError::new(
                    "sale_price",
                    "El precio de oferta no puede ser negativo",
                ));
            } else if sale_price >= self.price {
                errors.push(FieldError::new(
                    "sale_price",
                    "El precio de oferta debe ser menor al precio regular",
                ));
            }
        }
        if self.stock < 0 {
            errors.push(FieldError::new("stock", "El stock no puede ser negativo"));
        }
        if self.images.len() > MAX_IMAGES {
            errors.push(FieldError::new(
                "images",
                format!("Máximo {MAX_IMAGES} imágenes por producto"),
            ));
        }
        let folder = format!("{}/", store_folder(&self.store.to_hex()));
        if self.images.iter().any(|img| !img.public_id.starts_with(&folder)) {
            errors.push(FieldError::new(
                "images",
                "Las imágenes deben pertenecer a la tienda del producto",
            ));
        }
        ValidationErrors::check(errors)
    }

    /// Message a buyer sends when clicking through to WhatsApp.
    pub fn inquiry_message(&self) -> String {
        format!(
            "Hola! Me interesa el producto \"{}\" (${:.2}). ¿Está disponible?",
            self.name,
            self.effective_price()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Set(i64),
    Delta(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub stock: i64,
    pub category: Category,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub sale_price: Option<Option<f64>>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub images: Option<Vec<ProductImage>>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StockInput {
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub delta: Option<i64>,
}

impl StockInput {
    pub fn change(self) -> Option<StockChange> {
        match (self.stock, self.delta) {
            (Some(stock), None) => Some(StockChange::Set(stock)),
            (None, Some(delta)) => Some(StockChange::Delta(delta)),
            _ => None,
        }
    }
}

/// Catalog filters; `search` matches name or description, case-insensitively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(skip)]
    pub only_active: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.only_active && !product.active {
            return false;
        }
        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        if self.featured.is_some_and(|f| f != product.featured) {
            return false;
        }
        if self.in_stock.is_some_and(|s| s != product.in_stock) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductView {
    pub id: String,
    pub store: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub sale_price: Option<f64>,
    pub discount_percent: Option<u8>,
    pub stock: i64,
    pub in_stock: bool,
    pub category: Category,
    pub images: Vec<ProductImage>,
    pub active: bool,
    pub featured: bool,
    pub views: i64,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let discount_percent = product
            .sale_price
            .filter(|sale| product.price > 0.0 && *sale < product.price)
            .map(|sale| ((1.0 - sale / product.price) * 100.0).round().clamp(0.0, 100.0) as u8);

        Self {
            id: product.id.to_hex(),
            store: product.store.to_hex(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            sale_price: product.sale_price,
            discount_percent,
            stock: product.stock,
            in_stock: product.in_stock,
            category: product.category,
            images: product.images.clone(),
            active: product.active,
            featured: product.featured,
            views: product.views,
            clicks: product.clicks,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}
