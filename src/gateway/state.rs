//! Deadline-bound access to the identity service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::identity::AuthenticatedUser;
use crate::jwt::TokenPair;
use crate::rpc::{IdentityClient, RpcError};

/// Default deadline for a single identity call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity client bound to this service's application ID. Every call carries
/// the configured deadline.
#[derive(Clone)]
pub struct IdentityGateway {
    client: Arc<dyn IdentityClient>,
    app_id: i32,
    rpc_timeout: Duration,
}

impl IdentityGateway {
    pub fn new(client: Arc<dyn IdentityClient>, app_id: i32, rpc_timeout: Duration) -> Self {
        Self {
            client,
            app_id,
            rpc_timeout,
        }
    }

    pub fn app_id(&self) -> i32 {
        self.app_id
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<i64, RpcError> {
        with_deadline(self.rpc_timeout, self.client.register(email, password)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, RpcError> {
        with_deadline(
            self.rpc_timeout,
            self.client.login(email, password, self.app_id),
        )
        .await
    }

    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, RpcError> {
        with_deadline(
            self.rpc_timeout,
            self.client.refresh_tokens(refresh_token, self.app_id),
        )
        .await
    }

    pub async fn validate_token(&self, access_token: &str) -> Result<AuthenticatedUser, RpcError> {
        with_deadline(
            self.rpc_timeout,
            self.client.validate_token(access_token, self.app_id),
        )
        .await
    }

    pub async fn is_admin(&self, user_id: i64) -> Result<bool, RpcError> {
        with_deadline(self.rpc_timeout, self.client.is_admin(user_id)).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), RpcError> {
        with_deadline(
            self.rpc_timeout,
            self.client.logout(refresh_token, self.app_id),
        )
        .await
    }

    pub async fn logout_all(&self, refresh_token: &str) -> Result<u64, RpcError> {
        with_deadline(
            self.rpc_timeout,
            self.client.logout_all(refresh_token, self.app_id),
        )
        .await
    }
}

/// Run an RPC future, failing with `DeadlineExceeded` once `timeout` passes.
pub async fn with_deadline<T, F>(timeout: Duration, call: F) -> Result<T, RpcError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| Err(RpcError::deadline_exceeded()))
}
