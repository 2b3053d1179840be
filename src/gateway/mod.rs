//! Forum-side authentication gateway.
//!
//! Access tokens are validated by the identity service over RPC on every
//! protected request. Expired access tokens are renewed transparently when the
//! client also presents a refresh token.

mod errors;
mod headers;
mod ip;
mod middleware;
mod state;

pub use errors::GatewayError;
pub use headers::{
    NEW_ACCESS_TOKEN_HEADER, NEW_REFRESH_TOKEN_HEADER, REFRESH_TOKEN_HEADER, bearer_token,
};
pub use ip::{HasHeadersAndExtensions, client_ip};
pub use middleware::{CurrentUser, PUBLIC_PREFIX, require_identity};
pub use state::{DEFAULT_RPC_TIMEOUT, IdentityGateway, with_deadline};
