pub mod api;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod forum;
pub mod gateway;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod rpc;

use api::{ForumState, create_forum_router};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use db::Database;
use forum::ForumService;
use gateway::{IdentityGateway, NEW_ACCESS_TOKEN_HEADER, NEW_REFRESH_TOKEN_HEADER};
use identity::{IdentityConfig, IdentityService};
use rate_limit::RateLimitConfig;
use rpc::IdentityClient;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub struct IdentityServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token lifetimes
    pub identity: IdentityConfig,
    /// Interval between expired token cleanups
    pub cleanup_interval: Duration,
}

pub struct ForumServerConfig {
    /// Forum database (topics and comments)
    pub db: Database,
    /// Identity service client
    pub identity: Arc<dyn IdentityClient>,
    /// Application ID tokens are issued for
    pub app_id: i32,
    /// Deadline for each identity call
    pub rpc_timeout: Duration,
    /// Allowed CORS origin; any origin when None
    pub cors_origin: Option<String>,
    pub rate_limits: RateLimitConfig,
}

async fn ping() -> &'static str {
    "pong"
}

/// Create the identity service router.
pub fn create_identity_app(config: &IdentityServerConfig) -> Router {
    let service = IdentityService::with_database(config.db.clone(), config.identity.clone());

    rpc::router(service)
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
}

/// Create the forum service router.
pub fn create_forum_app(config: &ForumServerConfig) -> Router {
    let gateway = IdentityGateway::new(config.identity.clone(), config.app_id, config.rpc_timeout);
    let state = ForumState {
        forum: ForumService::new(config.db.clone(), gateway.clone()),
        gateway,
    };

    create_forum_router(state, config.rate_limits.clone())
        .route("/ping", get(ping))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config.cors_origin.as_deref())),
        )
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            warn!("Invalid CORS origin, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            gateway::REFRESH_TOKEN_HEADER,
        ])
        .expose_headers([NEW_ACCESS_TOKEN_HEADER, NEW_REFRESH_TOKEN_HEADER])
}

/// Run cleanup once and spawn the background scheduler.
/// Call this before starting the identity server.
pub async fn init_cleanup(db: &Database, every: Duration) -> tokio::task::JoinHandle<()> {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone(), every)
}

/// Serve `app` on the given listener until `shutdown` resolves.
pub async fn run_server<F>(app: Router, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Start the identity server on the given port in a background task. Use port 0
/// to let the OS choose a random port. Returns the actual address.
pub async fn start_identity_server(
    config: IdentityServerConfig,
    port: u16,
) -> std::io::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    init_cleanup(&config.db, config.cleanup_interval).await;
    start(create_identity_app(&config), port).await
}

/// Start the forum server on the given port in a background task.
pub async fn start_forum_server(
    config: ForumServerConfig,
    port: u16,
) -> std::io::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    start(create_forum_app(&config), port).await
}

async fn start(
    app: Router,
    port: u16,
) -> std::io::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(app, listener, std::future::pending()).await {
            error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
