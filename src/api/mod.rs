mod auth;
mod error;
mod topics;

use axum::{Router, middleware};

use crate::forum::ForumService;
use crate::gateway::{IdentityGateway, require_identity};
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// State shared by forum API handlers.
#[derive(Clone)]
pub struct ForumState {
    pub forum: ForumService,
    pub gateway: IdentityGateway,
}

/// Create the forum API router.
///
/// Topic writes and the auth proxy run behind `require_identity`; the auth
/// proxy passes through it by path prefix. Reads are merged in unguarded.
pub fn create_forum_router(state: ForumState, rate_limits: RateLimitConfig) -> Router {
    let gateway = state.gateway.clone();

    let guarded = topics::protected_routes()
        .merge(auth::routes(rate_limits))
        .with_state(state.clone())
        .route_layer(middleware::from_fn_with_state(gateway, require_identity));

    Router::new()
        .merge(topics::public_routes().with_state(state))
        .merge(guarded)
}
