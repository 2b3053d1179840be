use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use forum_identity::cli::{
    AdminCommand, AppCommand, Args, Command, ForumArgs, IdentityArgs, build_identity_config,
    handle_admin_grant, handle_app_add, init_logging, load_app_secret, open_database,
};
use forum_identity::rate_limit::RateLimitConfig;
use forum_identity::rpc::HttpIdentityClient;
use forum_identity::{
    ForumServerConfig, IdentityServerConfig, create_forum_app, create_identity_app, init_cleanup,
    run_server, shutdown_signal,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let ok = match args.command {
        Command::Identity(identity) => run_identity(identity).await,
        Command::Forum(forum) => run_forum(forum).await,
        Command::App {
            command:
                AppCommand::Add {
                    id,
                    name,
                    secret_file,
                    database,
                },
        } => {
            let Some(secret) = load_app_secret(secret_file.as_deref()) else {
                std::process::exit(1);
            };
            let Some(db) = open_database(&database).await else {
                std::process::exit(1);
            };
            handle_app_add(&db, id, &name, &secret).await
        }
        Command::Admin {
            command: AdminCommand::Grant { email, database },
        } => {
            let Some(db) = open_database(&database).await else {
                std::process::exit(1);
            };
            handle_admin_grant(&db, &email).await
        }
    };

    if !ok {
        std::process::exit(1);
    }
}

async fn bind(port: u16) -> Option<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    match TcpListener::bind(&addr).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            error!(address = %addr, error = %e, "Failed to bind");
            None
        }
    }
}

async fn run_identity(args: IdentityArgs) -> bool {
    let Some(db) = open_database(&args.database).await else {
        return false;
    };

    let config = IdentityServerConfig {
        db,
        identity: build_identity_config(&args),
        cleanup_interval: Duration::from_secs(args.cleanup_interval.max(1)),
    };
    let cleanup = init_cleanup(&config.db, config.cleanup_interval).await;
    let app = create_identity_app(&config);

    let Some(listener) = bind(args.port).await else {
        return false;
    };
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Identity service listening");
    }

    let result = run_server(app, listener, shutdown_signal()).await;
    cleanup.abort();
    match result {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Server error");
            false
        }
    }
}

async fn run_forum(args: ForumArgs) -> bool {
    let Some(db) = open_database(&args.database).await else {
        return false;
    };

    let rpc_timeout = Duration::from_millis(args.rpc_timeout);
    let config = ForumServerConfig {
        db,
        identity: Arc::new(HttpIdentityClient::new(&args.identity_url, rpc_timeout)),
        app_id: args.app_id,
        rpc_timeout,
        cors_origin: args.cors_origin,
        rate_limits: RateLimitConfig::default(),
    };
    let app = create_forum_app(&config);

    let Some(listener) = bind(args.port).await else {
        return false;
    };
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, identity_url = %args.identity_url, app_id = args.app_id, "Forum service listening");
    }

    match run_server(app, listener, shutdown_signal()).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Server error");
            false
        }
    }
}
