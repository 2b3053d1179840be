//! Auth proxy endpoints forwarding to the identity service.
//!
//! - POST `/auth/register` - Create an account
//! - POST `/auth/login` - Exchange credentials for a token pair
//! - POST `/auth/refresh` - Rotate a token pair
//! - POST `/auth/logout` - Revoke a refresh token
//! - POST `/auth/logout-all` - Revoke every session of the token's owner
//!
//! These live under the gateway's public prefix and need no access token.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ForumState;
use super::error::ApiError;
use crate::jwt::TokenPair;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

pub fn routes(limits: RateLimitConfig) -> Router<ForumState> {
    Router::new()
        .route(
            "/auth/register",
            post(register).layer(middleware::from_fn_with_state(
                limits.clone(),
                rate_limit_register,
            )),
        )
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(limits, rate_limit_login)),
        )
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user_id: i64,
}

#[derive(Serialize)]
struct LogoutAllResponse {
    revoked: u64,
}

/// Unwrap a JSON body. The rejection text is dropped since it can quote
/// the submitted password or token.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(req)| req)
        .map_err(|_| ApiError::BadRequest("invalid request body".into()))
}

async fn register(
    State(state): State<ForumState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    let user_id = state.gateway.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

async fn login(
    State(state): State<ForumState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let req = body(payload)?;
    Ok(Json(state.gateway.login(&req.email, &req.password).await?))
}

async fn refresh(
    State(state): State<ForumState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let req = body(payload)?;
    Ok(Json(state.gateway.refresh_tokens(&req.refresh_token).await?))
}

async fn logout(
    State(state): State<ForumState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let req = body(payload)?;
    state.gateway.logout(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn logout_all(
    State(state): State<ForumState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let req = body(payload)?;
    let revoked = state.gateway.logout_all(&req.refresh_token).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}
