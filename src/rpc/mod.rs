//! RPC surface of the identity service.
//!
//! Calls are JSON over HTTP: `POST /rpc/<method>` with a JSON request body.
//! Failures carry a `{code, message}` body; the HTTP status mirrors the code.

mod client;
mod server;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityError;

pub use client::{HttpIdentityClient, IdentityClient};
pub use server::router;

/// Outcome class of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcCode {
    InvalidArgument,
    Unauthenticated,
    AlreadyExists,
    NotFound,
    Internal,
    /// The caller's deadline passed before an answer arrived
    DeadlineExceeded,
}

impl RpcCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthenticated => "unauthenticated",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(RpcCode::DeadlineExceeded, "deadline exceeded")
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.code == RpcCode::Unauthenticated
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<IdentityError> for RpcError {
    fn from(e: IdentityError) -> Self {
        let code = match &e {
            IdentityError::Validation(_) | IdentityError::InvalidAppId => RpcCode::InvalidArgument,
            IdentityError::AlreadyExists => RpcCode::AlreadyExists,
            IdentityError::UserNotFound => RpcCode::NotFound,
            IdentityError::Storage(_) | IdentityError::Internal(_) => RpcCode::Internal,
            _ if e.is_unauthenticated() => RpcCode::Unauthenticated,
            _ => RpcCode::Internal,
        };
        // Server-side details stay in the identity service logs
        let message = match code {
            RpcCode::Internal => "internal error".to_string(),
            _ => e.to_string(),
        };
        Self::new(code, message)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

// Request and response bodies. Types holding passwords or tokens do not
// derive Debug.

#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub app_id: i32,
}

#[derive(Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub app_id: i32,
}

#[derive(Serialize, Deserialize)]
pub struct ValidateRequest {
    pub access_token: String,
    pub app_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsAdminRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

#[derive(Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
    pub app_id: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogoutResponse {}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}
