//! Access/refresh token generation and verification.
//!
//! Tokens are HS256 JWTs signed with the secret of the application they were
//! issued for. Access tokens carry the application id and are never stored.
//! Refresh tokens carry a `jti` so every issued string is unique; they are
//! scoped to an application by the refresh token store, not by their claims.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::{App, User};

/// The only signing algorithm accepted by this codec.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token type, serialized into the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims of a short-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    /// User ID
    pub uid: i64,
    pub email: String,
    /// Application the token was issued for
    pub app_id: i32,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    /// User ID
    pub uid: i64,
    pub email: String,
    /// Unique token id, makes every issued refresh token a distinct string
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
}

/// Parsed token payload, discriminated by the `typ` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "lowercase")]
pub enum Claims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl Claims {
    pub fn token_type(&self) -> TokenType {
        match self {
            Claims::Access(_) => TokenType::Access,
            Claims::Refresh(_) => TokenType::Refresh,
        }
    }

    pub fn expires_at(&self) -> u64 {
        match self {
            Claims::Access(c) => c.exp,
            Claims::Refresh(c) => c.exp,
        }
    }
}

/// An access/refresh token pair handed to clients.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    // Tokens are bearer credentials and must not end up in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Result of issuing a pair: the pair itself plus the expiry timestamps the
/// refresh token store needs.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub pair: TokenPair,
    pub access_expires_at: u64,
    pub refresh_expires_at: u64,
}

/// Signing and verification keys derived from one application secret.
#[derive(Clone)]
pub struct AppKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AppKeys {
    /// Build keys from an application secret. An empty secret cannot sign.
    pub fn new(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::Signing("application secret is empty".into()));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Issue a token pair using the current time.
    pub fn issue_pair(
        &self,
        user: &User,
        app_id: i32,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<IssuedPair, JwtError> {
        self.issue_pair_at(user, app_id, access_ttl, refresh_ttl, now_secs()?)
    }

    /// Issue a token pair as if the current time were `now` (Unix seconds).
    pub fn issue_pair_at(
        &self,
        user: &User,
        app_id: i32,
        access_ttl: Duration,
        refresh_ttl: Duration,
        now: u64,
    ) -> Result<IssuedPair, JwtError> {
        let access_expires_at = now + access_ttl.as_secs();
        let refresh_expires_at = now + refresh_ttl.as_secs();

        let access = Claims::Access(AccessClaims {
            uid: user.id,
            email: user.email.clone(),
            app_id,
            iat: now,
            exp: access_expires_at,
        });
        let refresh = Claims::Refresh(RefreshClaims {
            uid: user.id,
            email: user.email.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: refresh_expires_at,
        });

        Ok(IssuedPair {
            pair: TokenPair {
                access_token: self.sign(&access)?,
                refresh_token: self.sign(&refresh)?,
            },
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature and expiry and decode the typed claims.
    ///
    /// The header is inspected before anything else: tokens declaring any
    /// algorithm other than HS256 (including "none") are rejected outright.
    pub fn parse_and_verify(&self, token: &str) -> Result<Claims, JwtError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| JwtError::InvalidSignature)?;
        if header.alg != ALGORITHM {
            return Err(JwtError::InvalidSignature);
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify_decode_error)?;

        // jsonwebtoken still accepts a token at the second it expires
        if claims.expires_at() <= now_secs()? {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }
}

/// Issue a token pair for `user` signed with the application's secret.
pub fn issue_pair(
    user: &User,
    app: &App,
    access_ttl: Duration,
    refresh_ttl: Duration,
) -> Result<IssuedPair, JwtError> {
    AppKeys::new(app.secret.as_bytes())?.issue_pair(user, app.id, access_ttl, refresh_ttl)
}

/// Verify `token` against an application secret and decode its claims.
pub fn parse_and_verify(token: &str, secret: &[u8]) -> Result<Claims, JwtError> {
    AppKeys::new(secret)
        .map_err(|_| JwtError::InvalidSignature)?
        .parse_and_verify(token)
}

fn classify_decode_error(e: jsonwebtoken::errors::Error) -> JwtError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => JwtError::MalformedClaims,
        _ => JwtError::InvalidSignature,
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// The token could not be signed (unusable secret)
    Signing(String),
    /// Unexpected algorithm, bad signature, or undecodable token
    InvalidSignature,
    /// The `exp` claim has passed
    Expired,
    /// Claims are missing, unknown, or of the wrong type
    MalformedClaims,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Signing(e) => write!(f, "Failed to sign token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
            JwtError::Expired => write!(f, "Token is expired"),
            JwtError::MalformedClaims => write!(f, "Malformed token claims"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
