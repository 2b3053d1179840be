//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::forum::ForumError;
use crate::rpc::{RpcCode, RpcError};

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
    GatewayTimeout(String),
}

impl ApiError {
    pub fn internal_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }
}

impl From<RpcError> for ApiError {
    fn from(e: RpcError) -> Self {
        match e.code {
            RpcCode::InvalidArgument => Self::BadRequest(e.message),
            RpcCode::Unauthenticated | RpcCode::NotFound => Self::Unauthorized(e.message),
            RpcCode::AlreadyExists => Self::Conflict(e.message),
            RpcCode::DeadlineExceeded => {
                warn!("Identity call timed out");
                Self::GatewayTimeout("identity service timed out".into())
            }
            RpcCode::Internal => Self::internal_error("Identity service error", e),
        }
    }
}

impl From<ForumError> for ApiError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::Validation(msg) => Self::BadRequest(msg.into()),
            ForumError::NotFound(what) => Self::NotFound(format!("{} not found", what)),
            ForumError::NotAuthorized => Self::Forbidden("not authorized".into()),
            ForumError::DeadlineExceeded => {
                Self::GatewayTimeout("identity service timed out".into())
            }
            ForumError::Internal(msg) => {
                error!("Forum operation failed: {}", msg);
                Self::Internal("Internal error".into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
