//! Identity resolution for protected forum routes.
//!
//! Every request outside the public prefix must carry `Authorization: Bearer`.
//! When the access token is rejected as unauthenticated and the client also
//! sent `X-Refresh-Token`, the pair is rotated on the fly: the handler still
//! runs and the response carries the replacement tokens in `X-New-*` headers.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use super::errors::GatewayError;
use super::headers::{
    NEW_ACCESS_TOKEN_HEADER, NEW_REFRESH_TOKEN_HEADER, bearer_token, refresh_token,
};
use super::state::IdentityGateway;
use crate::identity::AuthenticatedUser;
use crate::jwt::TokenPair;
use crate::rpc::{RpcCode, RpcError};

/// Requests under this prefix skip identity resolution.
pub const PUBLIC_PREFIX: &str = "/auth/";

/// Middleware resolving the caller before protected handlers run.
///
/// On success the `AuthenticatedUser` is stored in request extensions.
pub async fn require_identity(
    State(gateway): State<IdentityGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.uri().path().starts_with(PUBLIC_PREFIX) {
        return next.run(request).await;
    }

    let Some(access_token) = bearer_token(request.headers()).map(str::to_string) else {
        return GatewayError::MissingAccessToken.into_response();
    };
    let refresh = refresh_token(request.headers()).map(str::to_string);

    let err = match gateway.validate_token(&access_token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            return next.run(request).await;
        }
        Err(e) => e,
    };

    if is_deadline(&err) {
        return GatewayError::DeadlineExceeded.into_response();
    }
    let Some(refresh) = refresh.filter(|_| err.is_unauthenticated()) else {
        debug!(code = err.code.as_str(), "Access token rejected, no refresh possible");
        return GatewayError::Unauthorized.into_response();
    };

    let pair = match gateway.refresh_tokens(&refresh).await {
        Ok(pair) => pair,
        Err(e) if is_deadline(&e) => return GatewayError::DeadlineExceeded.into_response(),
        Err(e) => {
            warn!(code = e.code.as_str(), "Transparent refresh failed");
            return GatewayError::RefreshFailed.into_response();
        }
    };

    let user = match gateway.validate_token(&pair.access_token).await {
        Ok(user) => user,
        Err(e) => {
            let rejection = if is_deadline(&e) {
                GatewayError::DeadlineExceeded
            } else {
                warn!(code = e.code.as_str(), "Refreshed access token rejected");
                GatewayError::InvalidRefreshedToken
            };
            // The old refresh token is already revoked, so hand out the new pair anyway
            return with_new_tokens(rejection.into_response(), &pair);
        }
    };

    match HeaderValue::from_str(&format!("Bearer {}", pair.access_token)) {
        Ok(value) => {
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        Err(_) => return GatewayError::InvalidRefreshedToken.into_response(),
    }

    info!(user_id = user.user_id, "Access token refreshed transparently");
    request.extensions_mut().insert(user);

    with_new_tokens(next.run(request).await, &pair)
}

fn is_deadline(e: &RpcError) -> bool {
    e.code == RpcCode::DeadlineExceeded
}

/// Attach the rotated pair to a response.
fn with_new_tokens(mut response: Response, pair: &TokenPair) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&pair.access_token) {
        headers.insert(NEW_ACCESS_TOKEN_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&pair.refresh_token) {
        headers.insert(NEW_REFRESH_TOKEN_HEADER, value);
    }
    response
}

/// Extractor for the caller resolved by `require_identity`.
/// Rejects with 401 on routes the middleware does not cover.
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(GatewayError::Unauthorized)
    }
}
