//! Identity service.
//!
//! Owns users, client applications and refresh tokens. Access tokens are
//! short-lived and stateless; refresh tokens are stored per (user, app) and
//! rotated on every use, so a replayed refresh token is rejected.

mod error;
mod providers;
mod service;

pub use error::IdentityError;
pub use providers::{AppProvider, StoreError, TokenStorage, UserProvider, UserSaver};
pub use service::{
    AuthenticatedUser, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, IdentityConfig, IdentityService,
};
