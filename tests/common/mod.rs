#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use forum_identity::db::Database;
use forum_identity::identity::{AuthenticatedUser, IdentityConfig, IdentityService};
use forum_identity::jwt::TokenPair;
use forum_identity::rate_limit::RateLimitConfig;
use forum_identity::rpc::{IdentityClient, RpcCode, RpcError};
use forum_identity::{ForumServerConfig, create_forum_app};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const APP_ID: i32 = 1;
pub const APP_SECRET: &str = "forum-app-secret-that-is-long-enough";
pub const OTHER_APP_ID: i32 = 2;
pub const OTHER_APP_SECRET: &str = "mobile-app-secret-that-is-long-enough";
pub const PASSWORD: &str = "correct horse battery staple";

/// Identity database with the forum and a second application registered.
pub async fn identity_db() -> Database {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    db.apps()
        .create(APP_ID, "forum", APP_SECRET)
        .await
        .expect("Failed to create app");
    db.apps()
        .create(OTHER_APP_ID, "mobile", OTHER_APP_SECRET)
        .await
        .expect("Failed to create app");
    db
}

pub async fn identity_service() -> (IdentityService, Database) {
    let db = identity_db().await;
    let service = IdentityService::with_database(db.clone(), IdentityConfig::default());
    (service, db)
}

/// Identity client wrapping an in-process service. Counts calls, can be
/// slowed down to trip deadlines, and can start rejecting validations.
pub struct CountingClient {
    pub inner: IdentityService,
    pub validates: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub admin_checks: AtomicUsize,
    pub delay: Option<Duration>,
    /// Validate calls from this (1-based) call number on fail as unauthenticated.
    pub reject_validations_from: Option<usize>,
}

impl CountingClient {
    pub fn new(inner: IdentityService) -> Self {
        Self {
            inner,
            validates: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            admin_checks: AtomicUsize::new(0),
            delay: None,
            reject_validations_from: None,
        }
    }

    pub fn slow(inner: IdentityService, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(inner)
        }
    }

    pub fn rejecting_validations_from(inner: IdentityService, call: usize) -> Self {
        Self {
            reject_validations_from: Some(call),
            ..Self::new(inner)
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn admin_check_count(&self) -> usize {
        self.admin_checks.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl IdentityClient for CountingClient {
    async fn register(&self, email: &str, password: &str) -> Result<i64, RpcError> {
        self.pause().await;
        IdentityClient::register(&self.inner, email, password).await
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        self.pause().await;
        IdentityClient::login(&self.inner, email, password, app_id).await
    }

    async fn refresh_tokens(
        &self,
        refresh_token: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        IdentityClient::refresh_tokens(&self.inner, refresh_token, app_id).await
    }

    async fn validate_token(
        &self,
        access_token: &str,
        app_id: i32,
    ) -> Result<AuthenticatedUser, RpcError> {
        let call = self.validates.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause().await;
        if self.reject_validations_from.is_some_and(|from| call >= from) {
            return Err(RpcError::new(RpcCode::Unauthenticated, "token rejected"));
        }
        IdentityClient::validate_token(&self.inner, access_token, app_id).await
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool, RpcError> {
        self.admin_checks.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        IdentityClient::is_admin(&self.inner, user_id).await
    }

    async fn logout(&self, refresh_token: &str, app_id: i32) -> Result<(), RpcError> {
        self.pause().await;
        IdentityClient::logout(&self.inner, refresh_token, app_id).await
    }

    async fn logout_all(&self, refresh_token: &str, app_id: i32) -> Result<u64, RpcError> {
        self.pause().await;
        IdentityClient::logout_all(&self.inner, refresh_token, app_id).await
    }
}

/// Forum app talking to `client`, with its own in-memory database.
pub async fn forum_app(client: Arc<dyn IdentityClient>) -> Router {
    forum_app_with(client, Duration::from_secs(5), RateLimitConfig::default()).await
}

pub async fn forum_app_with(
    client: Arc<dyn IdentityClient>,
    rpc_timeout: Duration,
    rate_limits: RateLimitConfig,
) -> Router {
    forum_app_for(client, APP_ID, rpc_timeout, rate_limits).await
}

/// Forum app that identifies itself to the identity service as `app_id`.
pub async fn forum_app_for(
    client: Arc<dyn IdentityClient>,
    app_id: i32,
    rpc_timeout: Duration,
    rate_limits: RateLimitConfig,
) -> Router {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open forum database");
    let config = ForumServerConfig {
        db,
        identity: client,
        app_id,
        rpc_timeout,
        cors_origin: None,
        rate_limits,
    };
    create_forum_app(&config)
}

/// Register `email` and log in for the forum app.
pub async fn register_and_login(service: &IdentityService, email: &str) -> (i64, TokenPair) {
    let user_id = service
        .register(email, PASSWORD)
        .await
        .expect("Failed to register");
    let pair = service
        .login(email, PASSWORD, APP_ID)
        .await
        .expect("Failed to login");
    (user_id, pair)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(
    method: &str,
    uri: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", access_token));
    if let Some(refresh) = refresh_token {
        builder = builder.header("x-refresh-token", refresh);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Send and expect `status`, returning the JSON body.
pub async fn expect_json(app: &Router, request: Request<Body>, status: StatusCode) -> serde_json::Value {
    let response = send(app, request).await;
    assert_eq!(response.status(), status);
    body_json(response).await
}
