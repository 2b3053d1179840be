//! Identity operations: register, login, token rotation and validation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::IdentityError;
use super::providers::{AppProvider, StoreError, TokenStorage, UserProvider, UserSaver};
use crate::db::{App, Database};
use crate::jwt::{self, Claims, TokenPair};
use crate::password::{hash_password, verify_password};

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime (30 days).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }
}

/// Who an access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
}

#[derive(Clone)]
pub struct IdentityService {
    config: IdentityConfig,
    user_saver: Arc<dyn UserSaver>,
    user_provider: Arc<dyn UserProvider>,
    app_provider: Arc<dyn AppProvider>,
    tokens: Arc<dyn TokenStorage>,
}

impl IdentityService {
    pub fn new(
        config: IdentityConfig,
        user_saver: Arc<dyn UserSaver>,
        user_provider: Arc<dyn UserProvider>,
        app_provider: Arc<dyn AppProvider>,
        tokens: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            config,
            user_saver,
            user_provider,
            app_provider,
            tokens,
        }
    }

    /// Build a service whose every capability is backed by `db`.
    pub fn with_database(db: Database, config: IdentityConfig) -> Self {
        let db = Arc::new(db);
        Self::new(config, db.clone(), db.clone(), db.clone(), db)
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Create a user account. Returns the new user ID.
    pub async fn register(&self, email: &str, password: &str) -> Result<i64, IdentityError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(IdentityError::Validation("email is required"));
        }
        if password.is_empty() {
            return Err(IdentityError::Validation("password is required"));
        }

        let password = password.to_string();
        let pass_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {}", e);
                IdentityError::internal("register", e)
            })?
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                IdentityError::internal("register", e)
            })?;

        match self.user_saver.save_user(email, &pass_hash).await {
            Ok(user_id) => {
                info!(user_id, "User registered");
                debug!(user_id, email = %email, "Registered email");
                Ok(user_id)
            }
            Err(StoreError::AlreadyExists) => {
                warn!("Registration rejected: user already exists");
                Err(IdentityError::AlreadyExists)
            }
            Err(e) => {
                error!("Failed to save user: {}", e);
                Err(IdentityError::storage("register", e))
            }
        }
    }

    /// Check credentials and issue a token pair for `app_id`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        app_id: i32,
    ) -> Result<TokenPair, IdentityError> {
        let user = self
            .user_provider
            .user_by_email(email.trim())
            .await
            .map_err(|e| {
                error!("Failed to get user: {}", e);
                IdentityError::storage("login", e)
            })?
            .ok_or_else(|| {
                warn!(app_id, "Login failed: unknown user");
                IdentityError::InvalidCredentials
            })?;

        let password = password.to_string();
        let pass_hash = user.pass_hash.clone();
        let password_ok =
            tokio::task::spawn_blocking(move || verify_password(&password, &pass_hash))
                .await
                .map_err(|e| {
                    error!(user_id = user.id, "Password verification task failed: {}", e);
                    IdentityError::internal("login", e)
                })?
                .map_err(|e| {
                    error!(user_id = user.id, "Failed to verify password: {}", e);
                    IdentityError::internal("login", e)
                })?;
        if !password_ok {
            warn!(user_id = user.id, app_id, "Login failed: wrong password");
            return Err(IdentityError::InvalidCredentials);
        }

        let app = self.app(app_id, "login").await?;
        let pair = self.issue_and_store(&user, &app, "login").await?;

        info!(user_id = user.id, app_id, "User logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, revoking the old token.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        app_id: i32,
    ) -> Result<TokenPair, IdentityError> {
        let app = self.app(app_id, "refresh").await?;

        let claims = jwt::parse_and_verify(refresh_token, app.secret.as_bytes()).map_err(|e| {
            warn!(app_id, "Refresh token rejected: {}", e);
            IdentityError::InvalidToken
        })?;

        let claims = match claims {
            Claims::Refresh(claims) => claims,
            Claims::Access(_) => {
                warn!(app_id, "Refresh attempted with an access token");
                return Err(IdentityError::InvalidTokenType);
            }
        };

        let user = self
            .user_provider
            .user_by_email(&claims.email)
            .await
            .map_err(|e| {
                error!("Failed to get user: {}", e);
                IdentityError::storage("refresh", e)
            })?
            .ok_or_else(|| {
                warn!(user_id = claims.uid, app_id, "Refresh token for missing user");
                IdentityError::UserNotFound
            })?;

        let valid = self
            .tokens
            .is_refresh_token_valid(user.id, app.id, refresh_token)
            .await
            .map_err(|e| {
                error!("Failed to check refresh token: {}", e);
                IdentityError::storage("refresh", e)
            })?;
        if !valid {
            warn!(user_id = user.id, app_id, "Refresh token revoked, unknown or expired");
            return Err(IdentityError::TokenNotValid);
        }

        // A concurrent refresh that revoked the token first wins. A store
        // failure leaves the old token usable until it expires.
        match self
            .tokens
            .revoke_refresh_token(user.id, app.id, refresh_token)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = user.id, app_id, "Refresh token revoked concurrently");
                return Err(IdentityError::TokenNotValid);
            }
            Err(e) => {
                warn!(user_id = user.id, app_id, "Failed to revoke old refresh token: {}", e);
            }
        }

        let pair = self.issue_and_store(&user, &app, "refresh").await?;

        info!(user_id = user.id, app_id, "Tokens rotated");
        Ok(pair)
    }

    /// Verify an access token. No store lookup is made.
    pub async fn validate_token(
        &self,
        access_token: &str,
        app_id: i32,
    ) -> Result<AuthenticatedUser, IdentityError> {
        let app = self.app(app_id, "validate").await?;

        let claims = jwt::parse_and_verify(access_token, app.secret.as_bytes())
            .map_err(IdentityError::from_access_check)?;

        match claims {
            Claims::Access(claims) => Ok(AuthenticatedUser {
                user_id: claims.uid,
                email: claims.email,
            }),
            Claims::Refresh(_) => Err(IdentityError::InvalidTokenType),
        }
    }

    /// Whether the user has admin rights. An unknown user is reported as
    /// `InvalidAppId`.
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, IdentityError> {
        let is_admin = self
            .user_provider
            .is_admin(user_id)
            .await
            .map_err(|e| {
                error!("Failed to check admin flag: {}", e);
                IdentityError::storage("is admin", e)
            })?
            .ok_or_else(|| {
                warn!(user_id, "Admin check for unknown user");
                IdentityError::InvalidAppId
            })?;

        debug!(user_id, is_admin, "Admin check");
        Ok(is_admin)
    }

    /// Revoke a refresh token. Revoking an already revoked token succeeds.
    pub async fn logout(&self, refresh_token: &str, app_id: i32) -> Result<(), IdentityError> {
        let app = self.app(app_id, "logout").await?;

        let claims = match jwt::parse_and_verify(refresh_token, app.secret.as_bytes()) {
            Ok(Claims::Refresh(claims)) => claims,
            Ok(Claims::Access(_)) => return Err(IdentityError::InvalidTokenType),
            Err(_) => return Err(IdentityError::InvalidToken),
        };

        self.tokens
            .revoke_refresh_token(claims.uid, app.id, refresh_token)
            .await
            .map_err(|e| {
                error!("Failed to revoke refresh token: {}", e);
                IdentityError::storage("logout", e)
            })?;

        info!(user_id = claims.uid, app_id, "User logged out");
        Ok(())
    }

    /// Revoke every refresh token the user holds for `app_id`. The presented
    /// token must still be live. Returns how many tokens were revoked.
    pub async fn logout_all(&self, refresh_token: &str, app_id: i32) -> Result<u64, IdentityError> {
        let app = self.app(app_id, "logout all").await?;

        let claims = match jwt::parse_and_verify(refresh_token, app.secret.as_bytes()) {
            Ok(Claims::Refresh(claims)) => claims,
            Ok(Claims::Access(_)) => return Err(IdentityError::InvalidTokenType),
            Err(_) => return Err(IdentityError::InvalidToken),
        };

        let valid = self
            .tokens
            .is_refresh_token_valid(claims.uid, app.id, refresh_token)
            .await
            .map_err(|e| {
                error!("Failed to check refresh token: {}", e);
                IdentityError::storage("logout all", e)
            })?;
        if !valid {
            warn!(user_id = claims.uid, app_id, "Logout everywhere with a dead refresh token");
            return Err(IdentityError::TokenNotValid);
        }

        let revoked = self
            .tokens
            .revoke_all_refresh_tokens(claims.uid, app.id)
            .await
            .map_err(|e| {
                error!("Failed to revoke refresh tokens: {}", e);
                IdentityError::storage("logout all", e)
            })?;

        info!(user_id = claims.uid, app_id, revoked, "User logged out everywhere");
        Ok(revoked)
    }

    async fn app(&self, app_id: i32, op: &str) -> Result<App, IdentityError> {
        self.app_provider
            .app(app_id)
            .await
            .map_err(|e| {
                error!("Failed to get app: {}", e);
                IdentityError::storage(op, e)
            })?
            .ok_or_else(|| {
                warn!(app_id, "Unknown app");
                IdentityError::InvalidAppId
            })
    }

    /// Issue a pair and persist its refresh half. Nothing is returned unless
    /// the refresh token was stored.
    async fn issue_and_store(
        &self,
        user: &crate::db::User,
        app: &App,
        op: &str,
    ) -> Result<TokenPair, IdentityError> {
        let issued = jwt::issue_pair(user, app, self.config.access_ttl, self.config.refresh_ttl)
            .map_err(|e| {
                error!(app_id = app.id, "Failed to sign tokens: {}", e);
                IdentityError::internal(op, e)
            })?;

        self.tokens
            .save_refresh_token(
                user.id,
                app.id,
                &issued.pair.refresh_token,
                issued.refresh_expires_at,
            )
            .await
            .map_err(|e| {
                error!(user_id = user.id, app_id = app.id, "Failed to save refresh token: {}", e);
                IdentityError::storage(op, e)
            })?;

        Ok(issued.pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const APP_ID: i32 = 1;
    const SECRET: &str = "an-application-secret-of-32-bytes!";

    async fn test_db() -> Database {
        let db = Database::open(":memory:").await.unwrap();
        db.apps().create(APP_ID, "forum", SECRET).await.unwrap();
        db
    }

    /// Token storage that delegates reads to a real database and fails the
    /// selected writes.
    struct FlakyTokens {
        db: Database,
        fail_save: bool,
        fail_revoke: bool,
        /// Report every token as valid, like a check that lost a race
        stale_validity: bool,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl TokenStorage for FlakyTokens {
        async fn save_refresh_token(
            &self,
            user_id: i64,
            app_id: i32,
            token: &str,
            expires_at: u64,
        ) -> Result<i64, StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            self.db
                .save_refresh_token(user_id, app_id, token, expires_at)
                .await
        }

        async fn is_refresh_token_valid(
            &self,
            user_id: i64,
            app_id: i32,
            token: &str,
        ) -> Result<bool, StoreError> {
            if self.stale_validity {
                return Ok(true);
            }
            self.db.is_refresh_token_valid(user_id, app_id, token).await
        }

        async fn revoke_refresh_token(
            &self,
            user_id: i64,
            app_id: i32,
            token: &str,
        ) -> Result<bool, StoreError> {
            if self.fail_revoke {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            self.db.revoke_refresh_token(user_id, app_id, token).await
        }

        async fn revoke_all_refresh_tokens(
            &self,
            user_id: i64,
            app_id: i32,
        ) -> Result<u64, StoreError> {
            self.db.revoke_all_refresh_tokens(user_id, app_id).await
        }
    }

    fn service_with_tokens(db: &Database, tokens: Arc<dyn TokenStorage>) -> IdentityService {
        let db = Arc::new(db.clone());
        IdentityService::new(
            IdentityConfig::default(),
            db.clone(),
            db.clone(),
            db,
            tokens,
        )
    }

    #[tokio::test]
    async fn test_register_rejects_empty_input() {
        let service = IdentityService::with_database(test_db().await, IdentityConfig::default());

        assert_eq!(
            service.register("", "pw").await.unwrap_err(),
            IdentityError::Validation("email is required")
        );
        assert_eq!(
            service.register("   ", "pw").await.unwrap_err(),
            IdentityError::Validation("email is required")
        );
        assert_eq!(
            service.register("a@example.com", "").await.unwrap_err(),
            IdentityError::Validation("password is required")
        );
    }

    #[tokio::test]
    async fn test_login_withholds_tokens_when_save_fails() {
        let db = test_db().await;
        let tokens = Arc::new(FlakyTokens {
            db: db.clone(),
            fail_save: true,
            fail_revoke: false,
            stale_validity: false,
            saves: AtomicUsize::new(0),
        });
        let service = service_with_tokens(&db, tokens.clone());

        service.register("alice@example.com", "pw").await.unwrap();
        let err = service
            .login("alice@example.com", "pw", APP_ID)
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Storage(_)));
        assert_eq!(tokens.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_survives_failed_revoke() {
        let db = test_db().await;
        let tokens = Arc::new(FlakyTokens {
            db: db.clone(),
            fail_save: false,
            fail_revoke: true,
            stale_validity: false,
            saves: AtomicUsize::new(0),
        });
        let service = service_with_tokens(&db, tokens);

        service.register("alice@example.com", "pw").await.unwrap();
        let pair = service
            .login("alice@example.com", "pw", APP_ID)
            .await
            .unwrap();

        let rotated = service
            .refresh_tokens(&pair.refresh_token, APP_ID)
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // Revoke failed, so the old token is still accepted
        assert!(
            service
                .refresh_tokens(&pair.refresh_token, APP_ID)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_loses_race_to_concurrent_revoke() {
        let db = test_db().await;
        let tokens = Arc::new(FlakyTokens {
            db: db.clone(),
            fail_save: false,
            fail_revoke: false,
            stale_validity: true,
            saves: AtomicUsize::new(0),
        });
        let service = service_with_tokens(&db, tokens.clone());

        service.register("alice@example.com", "pw").await.unwrap();
        let pair = service
            .login("alice@example.com", "pw", APP_ID)
            .await
            .unwrap();
        service
            .refresh_tokens(&pair.refresh_token, APP_ID)
            .await
            .unwrap();

        // The validity check passes, but the revoke finds nothing left to revoke
        assert_eq!(
            service
                .refresh_tokens(&pair.refresh_token, APP_ID)
                .await
                .unwrap_err(),
            IdentityError::TokenNotValid
        );
        // No pair was issued for the losing refresh
        assert_eq!(tokens.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_password_hashing_leaves_runtime_responsive() {
        let service = IdentityService::with_database(test_db().await, IdentityConfig::default());
        service.register("alice@example.com", "pw").await.unwrap();

        let finished = AtomicUsize::new(0);
        let timer = async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            finished.fetch_add(1, Ordering::SeqCst)
        };
        let (service, finished) = (&service, &finished);
        let login = || async move {
            service
                .login("alice@example.com", "pw", APP_ID)
                .await
                .unwrap();
            finished.fetch_add(1, Ordering::SeqCst)
        };

        let (timer_rank, _, _, _) = tokio::join!(timer, login(), login(), login());
        assert_eq!(timer_rank, 0);
    }

    #[tokio::test]
    async fn test_logout_all_revokes_every_session() {
        let db = test_db().await;
        let service = IdentityService::with_database(db.clone(), IdentityConfig::default());
        service.register("alice@example.com", "pw").await.unwrap();
        let laptop = service
            .login("alice@example.com", "pw", APP_ID)
            .await
            .unwrap();
        let phone = service
            .login("alice@example.com", "pw", APP_ID)
            .await
            .unwrap();

        assert_eq!(
            service
                .logout_all(&phone.refresh_token, APP_ID)
                .await
                .unwrap(),
            2
        );
        for pair in [&laptop, &phone] {
            assert_eq!(
                service
                    .refresh_tokens(&pair.refresh_token, APP_ID)
                    .await
                    .unwrap_err(),
                IdentityError::TokenNotValid
            );
        }

        // A dead token cannot trigger another sweep
        assert_eq!(
            service
                .logout_all(&laptop.refresh_token, APP_ID)
                .await
                .unwrap_err(),
            IdentityError::TokenNotValid
        );
        assert_eq!(
            service
                .logout_all(&laptop.access_token, APP_ID)
                .await
                .unwrap_err(),
            IdentityError::InvalidTokenType
        );
    }

    #[tokio::test]
    async fn test_errors_never_echo_secrets() {
        let service = IdentityService::with_database(test_db().await, IdentityConfig::default());
        service
            .register("alice@example.com", "hunter2-password")
            .await
            .unwrap();

        let err = service
            .login("alice@example.com", "wrong-password", APP_ID)
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("wrong-password"));

        let err = service
            .refresh_tokens("not.a.token", APP_ID)
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("not.a.token"));
    }
}
