use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

use super::{ApiClient, ClientError};
use crate::models::account::{AuthPayload, SessionInfo};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a signed-in client keeps its token between runs.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SessionError>;
    fn set(&self, token: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<String>, SessionError> {
        let token = self.token.read().unwrap_or_else(|e| e.into_inner());
        Ok(token.clone())
    }

    fn set(&self, token: &str) -> Result<(), SessionError> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Keeps the token in a single file. A missing or blank file means signed out.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// An [`ApiClient`] bound to a [`SessionStore`].
pub struct Session<S> {
    client: ApiClient,
    store: S,
}

impl<S: SessionStore> Session<S> {
    /// Attach the stored token, if any. Call [`Session::revalidate`] before
    /// trusting it.
    pub fn restore(mut client: ApiClient, store: S) -> Result<Self, SessionError> {
        client.set_token(store.get()?);
        Ok(Self { client, store })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_signed_in(&self) -> bool {
        self.client.token().is_some()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthPayload, ClientError> {
        let payload = self.client.login(email, password).await?;
        self.store.set(&payload.token)?;
        self.client.set_token(Some(payload.token.clone()));
        Ok(payload)
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.client.set_token(None);
        self.store.clear()
    }

    /// Ask the server who the stored token belongs to. A rejected token is
    /// dropped from the store and `None` is returned; transport failures are
    /// returned as errors and leave the token in place.
    pub async fn revalidate(&mut self) -> Result<Option<SessionInfo>, ClientError> {
        if !self.is_signed_in() {
            return Ok(None);
        }
        match self.client.me().await {
            Ok(info) => Ok(Some(info)),
            Err(err) if err.is_unauthorized() => {
                log::info!("Stored session rejected: {}", err);
                self.logout()?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
