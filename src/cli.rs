//! CLI argument parsing, validation, and startup helpers.

use crate::db::Database;
use crate::identity::IdentityConfig;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::{Parser, Subcommand};
use rand::RngCore;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

const MIN_APP_SECRET_LENGTH: usize = 32;

/// Random bytes in a generated application secret.
const GENERATED_SECRET_BYTES: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug)]
#[command(
    name = "forum-identity",
    about = "Forum with a token-issuing identity service"
)]
pub struct Args {
    /// Log output format
    #[arg(short, long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the identity service
    Identity(IdentityArgs),
    /// Run the forum service
    Forum(ForumArgs),
    /// Manage client applications
    App {
        #[command(subcommand)]
        command: AppCommand,
    },
    /// Manage admin rights
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "7301", env = "IDENTITY_PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "identity.db", env = "IDENTITY_DATABASE")]
    pub database: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "900", env = "ACCESS_TOKEN_TTL")]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "2592000", env = "REFRESH_TOKEN_TTL")]
    pub refresh_ttl: u64,

    /// Seconds between expired token cleanups
    #[arg(long, default_value = "3600")]
    pub cleanup_interval: u64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ForumArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "7302", env = "FORUM_PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "forum.db", env = "FORUM_DATABASE")]
    pub database: String,

    /// Base URL of the identity service
    #[arg(long, default_value = "http://127.0.0.1:7301", env = "IDENTITY_URL",
        value_parser = validate_identity_url)]
    pub identity_url: String,

    /// Application ID this forum signs in as
    #[arg(long, default_value = "1", env = "FORUM_APP_ID")]
    pub app_id: i32,

    /// Deadline for each identity call, in milliseconds
    #[arg(long, default_value = "5000")]
    pub rpc_timeout: u64,

    /// Allowed CORS origin (any origin when unset)
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Register an application. The secret is read from APP_SECRET,
    /// --secret-file, or generated and printed once.
    Add {
        #[arg(long)]
        id: i32,

        #[arg(long)]
        name: String,

        /// Path to file containing the secret. Prefer using APP_SECRET env var instead
        #[arg(long)]
        secret_file: Option<String>,

        /// Path to the identity database
        #[arg(short, long, default_value = "identity.db")]
        database: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Give an existing user admin rights
    Grant {
        #[arg(long)]
        email: String,

        /// Path to the identity database
        #[arg(short, long, default_value = "identity.db")]
        database: String,
    },
}

fn validate_identity_url(s: &str) -> Result<String, String> {
    let url = Url::parse(s).map_err(|e| format!("Invalid identity URL {}: {}", s, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("Identity URL must use http or https: {}", s));
    }
    Ok(s.trim_end_matches('/').to_string())
}

/// Initialize logging based on the specified format.
/// Verbosity follows RUST_LOG and defaults to info.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Build the identity service configuration from validated arguments.
pub fn build_identity_config(args: &IdentityArgs) -> IdentityConfig {
    IdentityConfig {
        access_ttl: Duration::from_secs(args.access_ttl),
        refresh_ttl: Duration::from_secs(args.refresh_ttl),
    }
}

/// Where an application secret came from.
pub enum AppSecret {
    Provided(String),
    /// Freshly generated; the operator must be shown it once
    Generated(String),
}

impl AppSecret {
    pub fn value(&self) -> &str {
        match self {
            Self::Provided(s) | Self::Generated(s) => s,
        }
    }
}

/// Load an application secret from environment variable or file, or
/// generate one. Returns None and logs an error if the secret is unusable.
pub fn load_app_secret(secret_file: Option<&str>) -> Option<AppSecret> {
    let secret = if let Ok(secret) = std::env::var("APP_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("APP_SECRET") };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read app secret file");
                return None;
            }
        }
    } else {
        return Some(AppSecret::Generated(generate_secret()));
    };

    if secret.len() < MIN_APP_SECRET_LENGTH {
        error!(
            "App secret is shorter than {} characters. Use a longer secret",
            MIN_APP_SECRET_LENGTH
        );
        return None;
    }

    Some(AppSecret::Provided(secret))
}

/// URL-safe random secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Handle `app add`: register an application and print a generated secret.
pub async fn handle_app_add(db: &Database, id: i32, name: &str, secret: &AppSecret) -> bool {
    match db.apps().create(id, name, secret.value()).await {
        Ok(()) => {
            info!(app_id = id, name = %name, "Application registered");
            if let AppSecret::Generated(value) = secret {
                println!();
                println!("Application {} ({}) registered", name, id);
                println!("Secret: {}", value);
                println!();
            }
            true
        }
        Err(e) => {
            error!(app_id = id, error = %e, "Failed to register application");
            false
        }
    }
}

/// Handle `admin grant`: set the admin flag for an existing user.
pub async fn handle_admin_grant(db: &Database, email: &str) -> bool {
    match db.users().set_admin(email, true).await {
        Ok(true) => {
            println!("Admin rights granted");
            true
        }
        Ok(false) => {
            error!("No user with that email");
            false
        }
        Err(e) => {
            error!(error = %e, "Failed to grant admin rights");
            false
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
