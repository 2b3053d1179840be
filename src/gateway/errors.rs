//! Gateway rejection responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why the gateway refused to run the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    MissingAccessToken,
    Unauthorized,
    RefreshFailed,
    InvalidRefreshedToken,
    /// An identity call did not answer within the RPC deadline
    DeadlineExceeded,
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingAccessToken => "missing access token",
            Self::Unauthorized => "unauthorized",
            Self::RefreshFailed => "token refresh failed",
            Self::InvalidRefreshedToken => "invalid refreshed token",
            Self::DeadlineExceeded => "identity service timed out",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
