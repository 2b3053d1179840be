//! Axum handlers exposing `IdentityService` over RPC.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use super::{
    IsAdminRequest, IsAdminResponse, LoginRequest, LogoutAllResponse, LogoutRequest,
    LogoutResponse, RefreshRequest, RegisterRequest, RegisterResponse, RpcCode, RpcError,
    ValidateRequest,
};
use crate::identity::{AuthenticatedUser, IdentityService};
use crate::jwt::TokenPair;

/// Router with every identity RPC under `/rpc`.
pub fn router(service: IdentityService) -> Router {
    Router::new()
        .route("/rpc/register", post(register))
        .route("/rpc/login", post(login))
        .route("/rpc/refresh", post(refresh))
        .route("/rpc/validate", post(validate))
        .route("/rpc/is_admin", post(is_admin))
        .route("/rpc/logout", post(logout))
        .route("/rpc/logout_all", post(logout_all))
        .with_state(service)
}

/// Turn a body rejection into an RPC error so clients always get `{code, message}`.
/// The rejection text is not forwarded since serde errors can quote field values.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(req)| req)
        .map_err(|_| RpcError::new(RpcCode::InvalidArgument, "invalid request body"))
}

async fn register(
    State(service): State<IdentityService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, RpcError> {
    let req = body(payload)?;
    let user_id = service.register(&req.email, &req.password).await?;
    Ok(Json(RegisterResponse { user_id }))
}

async fn login(
    State(service): State<IdentityService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, RpcError> {
    let req = body(payload)?;
    let pair = service.login(&req.email, &req.password, req.app_id).await?;
    Ok(Json(pair))
}

async fn refresh(
    State(service): State<IdentityService>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, RpcError> {
    let req = body(payload)?;
    let pair = service
        .refresh_tokens(&req.refresh_token, req.app_id)
        .await?;
    Ok(Json(pair))
}

async fn validate(
    State(service): State<IdentityService>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<AuthenticatedUser>, RpcError> {
    let req = body(payload)?;
    let user = service.validate_token(&req.access_token, req.app_id).await?;
    Ok(Json(user))
}

async fn is_admin(
    State(service): State<IdentityService>,
    payload: Result<Json<IsAdminRequest>, JsonRejection>,
) -> Result<Json<IsAdminResponse>, RpcError> {
    let req = body(payload)?;
    let is_admin = service.is_admin(req.user_id).await?;
    Ok(Json(IsAdminResponse { is_admin }))
}

async fn logout(
    State(service): State<IdentityService>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<LogoutResponse>, RpcError> {
    let req = body(payload)?;
    service.logout(&req.refresh_token, req.app_id).await?;
    Ok(Json(LogoutResponse {}))
}

async fn logout_all(
    State(service): State<IdentityService>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<LogoutAllResponse>, RpcError> {
    let req = body(payload)?;
    let revoked = service.logout_all(&req.refresh_token, req.app_id).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}
