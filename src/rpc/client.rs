//! Clients for the identity RPC surface.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::warn;

use super::{
    IsAdminRequest, IsAdminResponse, LoginRequest, LogoutAllResponse, LogoutRequest,
    LogoutResponse, RefreshRequest, RegisterRequest, RegisterResponse, RpcCode, RpcError,
    ValidateRequest,
};
use crate::identity::{AuthenticatedUser, IdentityService};
use crate::jwt::TokenPair;

/// The identity operations as seen by the forum service.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<i64, RpcError>;

    async fn login(&self, email: &str, password: &str, app_id: i32)
    -> Result<TokenPair, RpcError>;

    async fn refresh_tokens(&self, refresh_token: &str, app_id: i32)
    -> Result<TokenPair, RpcError>;

    async fn validate_token(
        &self,
        access_token: &str,
        app_id: i32,
    ) -> Result<AuthenticatedUser, RpcError>;

    async fn is_admin(&self, user_id: i64) -> Result<bool, RpcError>;

    async fn logout(&self, refresh_token: &str, app_id: i32) -> Result<(), RpcError>;

    /// Revoke every session of the token's owner. Returns how many were revoked.
    async fn logout_all(&self, refresh_token: &str, app_id: i32) -> Result<u64, RpcError>;
}

/// Calls a remote identity service over HTTP.
#[derive(Clone)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpIdentityClient {
    /// `timeout` bounds each call; hitting it yields `DeadlineExceeded`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn call<Req, Resp>(&self, method: &str, req: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/rpc/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(req)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;

        if response.status().is_success() {
            return response
                .json::<Resp>()
                .await
                .map_err(|e| transport_error(method, e));
        }

        let status = response.status();
        match response.json::<RpcError>().await {
            Ok(err) => Err(err),
            Err(e) if e.is_timeout() => Err(RpcError::deadline_exceeded()),
            Err(_) => {
                warn!(method, status = %status, "Identity service returned an unexpected body");
                Err(RpcError::internal(format!(
                    "identity service returned {}",
                    status
                )))
            }
        }
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        return RpcError::deadline_exceeded();
    }
    let e = e.without_url();
    warn!(method, "Identity RPC failed: {}", e);
    RpcError::new(RpcCode::Internal, "identity service unavailable")
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn register(&self, email: &str, password: &str) -> Result<i64, RpcError> {
        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: RegisterResponse = self.call("register", &req).await?;
        Ok(resp.user_id)
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            app_id,
        };
        self.call("login", &req).await
    }

    async fn refresh_tokens(
        &self,
        refresh_token: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        let req = RefreshRequest {
            refresh_token: refresh_token.to_string(),
            app_id,
        };
        self.call("refresh", &req).await
    }

    async fn validate_token(
        &self,
        access_token: &str,
        app_id: i32,
    ) -> Result<AuthenticatedUser, RpcError> {
        let req = ValidateRequest {
            access_token: access_token.to_string(),
            app_id,
        };
        self.call("validate", &req).await
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool, RpcError> {
        let resp: IsAdminResponse = self.call("is_admin", &IsAdminRequest { user_id }).await?;
        Ok(resp.is_admin)
    }

    async fn logout(&self, refresh_token: &str, app_id: i32) -> Result<(), RpcError> {
        let req = LogoutRequest {
            refresh_token: refresh_token.to_string(),
            app_id,
        };
        let _: LogoutResponse = self.call("logout", &req).await?;
        Ok(())
    }

    async fn logout_all(&self, refresh_token: &str, app_id: i32) -> Result<u64, RpcError> {
        let req = LogoutRequest {
            refresh_token: refresh_token.to_string(),
            app_id,
        };
        let resp: LogoutAllResponse = self.call("logout_all", &req).await?;
        Ok(resp.revoked)
    }
}

/// In-process calls, for single-process deployments and tests.
#[async_trait]
impl IdentityClient for IdentityService {
    async fn register(&self, email: &str, password: &str) -> Result<i64, RpcError> {
        Ok(IdentityService::register(self, email, password).await?)
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        Ok(IdentityService::login(self, email, password, app_id).await?)
    }

    async fn refresh_tokens(
        &self,
        refresh_token: &str,
        app_id: i32,
    ) -> Result<TokenPair, RpcError> {
        Ok(IdentityService::refresh_tokens(self, refresh_token, app_id).await?)
    }

    async fn validate_token(
        &self,
        access_token: &str,
        app_id: i32,
    ) -> Result<AuthenticatedUser, RpcError> {
        Ok(IdentityService::validate_token(self, access_token, app_id).await?)
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool, RpcError> {
        Ok(IdentityService::is_admin(self, user_id).await?)
    }

    async fn logout(&self, refresh_token: &str, app_id: i32) -> Result<(), RpcError> {
        Ok(IdentityService::logout(self, refresh_token, app_id).await?)
    }

    async fn logout_all(&self, refresh_token: &str, app_id: i32) -> Result<u64, RpcError> {
        Ok(IdentityService::logout_all(self, refresh_token, app_id).await?)
    }
}
