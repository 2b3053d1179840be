//! Identity service error type.

use crate::jwt::JwtError;

/// Errors returned by identity operations.
///
/// Messages never contain passwords or token strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Empty or malformed input
    Validation(&'static str),
    /// Unknown email or wrong password (deliberately indistinguishable)
    InvalidCredentials,
    AlreadyExists,
    InvalidAppId,
    /// Refresh token failed codec verification
    InvalidToken,
    InvalidTokenType,
    InvalidSignature,
    Expired,
    MalformedClaims,
    UserNotFound,
    /// Refresh token is revoked, unknown or past its stored expiry
    TokenNotValid,
    /// Durable store failure, with the operation that hit it
    Storage(String),
    Internal(String),
}

impl IdentityError {
    pub(crate) fn storage(op: &str, e: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{}: {}", op, e))
    }

    pub(crate) fn internal(op: &str, e: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{}: {}", op, e))
    }

    /// Whether the caller failed to prove who they are, as opposed to
    /// sending bad input or hitting a server-side failure.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::InvalidToken
                | Self::InvalidTokenType
                | Self::InvalidSignature
                | Self::Expired
                | Self::MalformedClaims
                | Self::TokenNotValid
        )
    }

    /// Map a codec failure while validating an access token, keeping the
    /// distinct reason.
    pub(crate) fn from_access_check(e: JwtError) -> Self {
        match e {
            JwtError::Expired => Self::Expired,
            JwtError::MalformedClaims => Self::MalformedClaims,
            JwtError::InvalidSignature | JwtError::Signing(_) => Self::InvalidSignature,
            JwtError::TimeError => Self::internal("validate token", e),
        }
    }
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {}", msg),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::AlreadyExists => write!(f, "user already exists"),
            Self::InvalidAppId => write!(f, "invalid app id"),
            Self::InvalidToken => write!(f, "invalid token"),
            Self::InvalidTokenType => write!(f, "invalid token type"),
            Self::InvalidSignature => write!(f, "invalid token signature"),
            Self::Expired => write!(f, "token expired"),
            Self::MalformedClaims => write!(f, "malformed token claims"),
            Self::UserNotFound => write!(f, "user not found"),
            Self::TokenNotValid => write!(f, "refresh token is not valid"),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}
