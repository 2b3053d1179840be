//! Scheduled cleanup of expired refresh tokens.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Default interval between cleanup runs.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Delete expired refresh tokens of every application once.
/// Returns the number of deleted tokens.
pub async fn run_cleanup(db: &Database) -> u64 {
    let app_ids = match db.apps().list_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!("Failed to list apps for cleanup: {}", e);
            return 0;
        }
    };

    let mut total = 0;
    for app_id in app_ids {
        match db.tokens().delete_expired(app_id).await {
            Ok(count) if count > 0 => {
                info!(app_id, "Cleaned up {} expired tokens", count);
                total += count;
            }
            Ok(_) => {}
            Err(e) => error!(app_id, "Failed to clean up expired tokens: {}", e),
        }
    }
    total
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately; startup already ran a pass
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
