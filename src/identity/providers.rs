//! Storage capabilities the identity service depends on.
//!
//! Each trait covers one concern so tests can swap a single capability for a
//! failing or counting stand-in. `Database` implements all of them.

use async_trait::async_trait;

use crate::db::{App, Database, User, is_unique_violation};

/// Failure reported by a storage capability.
#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    AlreadyExists,
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_unique_violation(&e) {
            Self::AlreadyExists
        } else {
            Self::Database(e)
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "record already exists"),
            Self::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            Self::AlreadyExists => None,
        }
    }
}

#[async_trait]
pub trait UserSaver: Send + Sync {
    /// Persist a new user. Returns the user ID.
    async fn save_user(&self, email: &str, pass_hash: &str) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// `None` if the user does not exist.
    async fn is_admin(&self, user_id: i64) -> Result<Option<bool>, StoreError>;
}

#[async_trait]
pub trait AppProvider: Send + Sync {
    async fn app(&self, app_id: i32) -> Result<Option<App>, StoreError>;
}

/// Refresh token persistence.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn save_refresh_token(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
        expires_at: u64,
    ) -> Result<i64, StoreError>;

    async fn is_refresh_token_valid(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, StoreError>;

    /// Returns whether a still-active token was revoked. Revoking an unknown
    /// or already revoked token is not an error.
    async fn revoke_refresh_token(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, StoreError>;

    /// Revoke every active token of a user for one application.
    /// Returns how many were revoked.
    async fn revoke_all_refresh_tokens(&self, user_id: i64, app_id: i32)
    -> Result<u64, StoreError>;
}

#[async_trait]
impl UserSaver for Database {
    async fn save_user(&self, email: &str, pass_hash: &str) -> Result<i64, StoreError> {
        Ok(self.users().create(email, pass_hash).await?)
    }
}

#[async_trait]
impl UserProvider for Database {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().get_by_email(email).await?)
    }

    async fn is_admin(&self, user_id: i64) -> Result<Option<bool>, StoreError> {
        Ok(self.users().is_admin(user_id).await?)
    }
}

#[async_trait]
impl AppProvider for Database {
    async fn app(&self, app_id: i32) -> Result<Option<App>, StoreError> {
        Ok(self.apps().get(app_id).await?)
    }
}

#[async_trait]
impl TokenStorage for Database {
    async fn save_refresh_token(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
        expires_at: u64,
    ) -> Result<i64, StoreError> {
        Ok(self
            .tokens()
            .save(user_id, app_id, token, expires_at)
            .await?)
    }

    async fn is_refresh_token_valid(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.tokens().is_valid(user_id, app_id, token).await?)
    }

    async fn revoke_refresh_token(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.tokens().revoke(user_id, app_id, token).await?)
    }

    async fn revoke_all_refresh_tokens(
        &self,
        user_id: i64,
        app_id: i32,
    ) -> Result<u64, StoreError> {
        Ok(self.tokens().revoke_all(user_id, app_id).await?)
    }
}
