//! Refresh token storage for rotation and revocation.
//!
//! Only refresh tokens are stored. Access tokens are stateless and expire on
//! their own. Every check re-queries the table; nothing is cached.

use sqlx::sqlite::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};

/// Store for issued refresh tokens.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a newly issued refresh token. Returns the record ID.
    pub async fn save(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, app_id, token, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(app_id)
        .bind(token)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// True iff a matching record exists that is neither revoked nor expired.
    pub async fn is_valid(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens
             WHERE user_id = ? AND app_id = ? AND token = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(user_id)
        .bind(app_id)
        .bind(token)
        .bind(unix_now())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    /// Mark a token revoked. Returns whether a still-active row was changed;
    /// revoking an unknown or already revoked token is not an error.
    pub async fn revoke(
        &self,
        user_id: i64,
        app_id: i32,
        token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1
             WHERE user_id = ? AND app_id = ? AND token = ? AND revoked = 0",
        )
        .bind(user_id)
        .bind(app_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every token of a user for one application (logout everywhere).
    pub async fn revoke_all(&self, user_id: i64, app_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND app_id = ? AND revoked = 0",
        )
        .bind(user_id)
        .bind(app_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete all expired tokens of an application.
    pub async fn delete_expired(&self, app_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE app_id = ? AND expires_at <= ?")
            .bind(app_id)
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
