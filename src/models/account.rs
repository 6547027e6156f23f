use argon2::{self, Config as ArgonConfig};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{is_valid_email, is_valid_phone, normalize_phone, StoreView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name,
            email: email.trim().to_lowercase(),
            password_hash,
            role: Role::User,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The account attached to an authenticated request. Carries no secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl AuthenticatedAccount {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Account> for AuthenticatedAccount {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
            active: account.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_hex(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            active: account.active,
            created_at: Some(account.created_at),
        }
    }
}

impl From<&AuthenticatedAccount> for AccountView {
    fn from(account: &AuthenticatedAccount) -> Self {
        Self {
            id: account.id.to_hex(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            active: account.active,
            created_at: None,
        }
    }
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthPayload {
    pub token: String,
    pub user: AccountView,
    pub store: Option<StoreView>,
}

/// The signed-in account and its store, as returned by `/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub user: AccountView,
    pub store: Option<StoreView>,
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub store_name: String,
    #[serde(default)]
    pub whatsapp: Option<String>,
}

impl RegisterInput {
    /// Request-level checks, reported as a list of messages.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let name = self.name.trim();
        if !(2..=50).contains(&name.chars().count()) {
            problems.push("El nombre debe tener entre 2 y 50 caracteres".to_string());
        }
        if !is_valid_email(self.email.trim()) {
            problems.push("Email inválido".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            problems.push(format!(
                "La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"
            ));
        }
        let store_name = self.store_name.trim();
        if !(2..=60).contains(&store_name.chars().count()) {
            problems.push("El nombre de la tienda debe tener entre 2 y 60 caracteres".to_string());
        }
        if let Some(whatsapp) = &self.whatsapp {
            if !is_valid_phone(&normalize_phone(whatsapp)) {
                problems.push("Número de WhatsApp inválido".to_string());
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

impl ProfileUpdateInput {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(name) = &self.name {
            let name = name.trim();
            if !(2..=50).contains(&name.chars().count()) {
                problems.push("El nombre debe tener entre 2 y 50 caracteres".to_string());
            }
        }
        if let Some(new_password) = &self.new_password {
            if new_password.chars().count() < MIN_PASSWORD_LENGTH {
                problems.push(format!(
                    "La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"
                ));
            }
            if self.current_password.is_none() {
                problems.push("Se requiere la contraseña actual".to_string());
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AccountStatusInput {
    pub active: bool,
}

pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let config = ArgonConfig::default();
    argon2::hash_encoded(password.as_bytes(), &salt, &config)
}

/// A hash that fails to parse counts as a mismatch.
pub fn verify_password(hash: &str, password: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or(false)
}
