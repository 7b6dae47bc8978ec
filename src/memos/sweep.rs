//! Background expiry sweep — archives distributed memos past their
//! expiry date.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::store::Database;

/// Spawn the periodic sweep task. Returns the handle so callers can keep
/// it alive or abort it.
pub fn spawn_expiry_sweep(db: Arc<dyn Database>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately, which doubles as a catch-up
        // after downtime.
        loop {
            ticker.tick().await;
            match db.archive_expired_memos().await {
                Ok(0) => debug!("Expiry sweep found nothing to archive"),
                Ok(count) => tracing::info!(count, "Expiry sweep archived memos"),
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}
