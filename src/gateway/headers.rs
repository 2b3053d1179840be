//! Token transport headers.

use axum::http::{HeaderMap, HeaderName, header};

/// Optional refresh token sent by the client alongside the access token.
pub const REFRESH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refresh-token");

/// Replacement access token after a transparent refresh.
pub const NEW_ACCESS_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-new-access-token");

/// Replacement refresh token after a transparent refresh.
pub const NEW_REFRESH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-new-refresh-token");

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Non-empty value of the refresh token header.
pub fn refresh_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(&REFRESH_TOKEN_HEADER)?
        .to_str()
        .ok()
        .filter(|v| !v.is_empty())
}
