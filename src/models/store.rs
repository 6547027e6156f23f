use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{double_option, is_valid_phone, normalize_phone, FieldError, ValidationErrors};

const MAX_SLUG_LENGTH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub tiktok: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub owner: ObjectId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub social: SocialLinks,
    #[serde(default)]
    pub branding: Branding,
    pub active: bool,
    #[serde(default)]
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn new(owner: ObjectId, name: &str, slug: String, whatsapp: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            owner,
            name: name.trim().to_string(),
            slug,
            description: None,
            whatsapp: whatsapp.map(normalize_phone),
            social: SocialLinks::default(),
            branding: Branding::default(),
            active: true,
            product_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: StoreUpdate) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(whatsapp) = update.whatsapp {
            self.whatsapp = whatsapp.as_deref().map(normalize_phone);
        }
        if let Some(social) = update.social {
            self.social = social;
        }
        if let Some(branding) = update.branding {
            self.branding = branding;
        }
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if !(2..=60).contains(&self.name.chars().count()) {
            errors.push(FieldError::new(
                "name",
                "El nombre de la tienda debe tener entre 2 y 60 caracteres",
            ));
        }
        if self.description.as_ref().is_some_and(|d| d.chars().count() > 500) {
            errors.push(FieldError::new(
                "description",
                "La descripción no puede superar 500 caracteres",
            ));
        }
        if let Some(whatsapp) = &self.whatsapp {
            if !is_valid_phone(whatsapp) {
                errors.push(FieldError::new("whatsapp", "Número de WhatsApp inválido"));
            }
        }
        if let Some(color) = &self.branding.primary_color {
            if !is_hex_color(color) {
                errors.push(FieldError::new(
                    "branding.primary_color",
                    "El color debe tener formato #RRGGBB",
                ));
            }
        }
        ValidationErrors::check(errors)
    }

    /// Link that opens a WhatsApp chat with the store, prefilled with `message`.
    pub fn whatsapp_link(&self, message: &str) -> Option<String> {
        let number = self.whatsapp.as_deref()?;
        let mut link = url::Url::parse("https://wa.me/").ok()?;
        link.set_path(number);
        link.query_pairs_mut().append_pair("text", message);
        Some(link.into())
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color.chars().skip(1).all(|c| c.is_ascii_hexdigit())
}

/// Partial update sent by the store owner. `null` clears optional fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub whatsapp: Option<Option<String>>,
    #[serde(default)]
    pub social: Option<SocialLinks>,
    #[serde(default)]
    pub branding: Option<Branding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreView {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub whatsapp: Option<String>,
    pub social: SocialLinks,
    pub branding: Branding,
    pub product_count: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub active: Option<bool>,
}

impl StoreView {
    /// Dashboard view for the owner or an administrator.
    pub fn private(store: &Store) -> Self {
        Self {
            owner: Some(store.owner.to_hex()),
            active: Some(store.active),
            ..Self::public(store)
        }
    }

    /// Catalog view for buyers: no owner id, no moderation state.
    pub fn public(store: &Store) -> Self {
        Self {
            id: store.id.to_hex(),
            name: store.name.clone(),
            slug: store.slug.clone(),
            description: store.description.clone(),
            whatsapp: store.whatsapp.clone(),
            social: store.social.clone(),
            branding: store.branding.clone(),
            product_count: store.product_count,
            owner: None,
            active: None,
        }
    }
}

/// Derive a URL slug from a store name: lowercase ASCII, words joined by `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let c = match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug: String = slug.chars().take(MAX_SLUG_LENGTH).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "tienda".to_string()
    } else {
        slug
    }
}

/// Candidate slugs for a base slug: `base`, `base-2`, `base-3`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((2..).map(move |n| format!("{base}-{n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_accents_and_symbols() {
        assert_eq!(slugify("La Tienda de Ñandú!"), "la-tienda-de-nandu");
        assert_eq!(slugify("  Café   & Té  "), "cafe-te");
        assert_eq!(slugify("!!!"), "tienda");
    }

    #[test]
    fn slugify_truncates_without_trailing_dash() {
        let slug = slugify(&"ab ".repeat(40));
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn candidates_append_counter() {
        let candidates: Vec<String> = slug_candidates("ana").take(3).collect();
        assert_eq!(candidates, vec!["ana", "ana-2", "ana-3"]);
    }

    #[test]
    fn name_length_counts_characters() {
        let mut store = Store::new(ObjectId::new(), "Ana", "ana".into(), None);
        store.name = "Ñandú".repeat(12);
        assert!(store.validate().is_ok());
        store.name = "ñ".repeat(61);
        assert!(store.validate().is_err());
    }

    #[test]
    fn whatsapp_link_is_encoded() {
        let store = Store::new(ObjectId::new(), "Ana", "ana".into(), Some("+54 11 5555-1234"));
        let link = store.whatsapp_link("Hola! Me interesa: Remera").unwrap();
        assert_eq!(
            link,
            "https://wa.me/541155551234?text=Hola%21+Me+interesa%3A+Remera"
        );
    }

    #[test]
    fn update_clears_nullable_fields() {
        let mut store = Store::new(ObjectId::new(), "Ana", "ana".into(), Some("541155551234"));
        let update: StoreUpdate =
            serde_json::from_str(r#"{"whatsapp": null, "description": "Ropa"}"#).unwrap();
        store.apply(update);

        assert_eq!(store.whatsapp, None);
        assert_eq!(store.description.as_deref(), Some("Ropa"));
    }

    #[test]
    fn validate_reports_each_field() {
        let mut store = Store::new(ObjectId::new(), "A", "a".into(), Some("123"));
        store.branding.primary_color = Some("red".into());
        let errors = store.validate().unwrap_err();
        let fields: Vec<&str> = errors.0.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "whatsapp", "branding.primary_color"]);
    }

    #[test]
    fn public_view_hides_owner() {
        let store = Store::new(ObjectId::new(), "Ana", "ana".into(), None);
        assert!(StoreView::public(&store).owner.is_none());
        assert!(StoreView::private(&store).owner.is_some());
    }
}
