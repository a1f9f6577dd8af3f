use fotowand_db::client::DbClient;
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodically hard-deletes expired stories and sessions. Visibility never
/// depends on this task; every read filters on expiry itself.
pub async fn run(db: Arc<DbClient>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {
                match db.delete_expired_stories().await {
                    Ok(0) => {}
                    Ok(deleted) => debug!(deleted, "Removed expired stories"),
                    Err(error) => warn!(%error, "Failed to remove expired stories"),
                }

                match db.delete_expired_sessions().await {
                    Ok(0) => {}
                    Ok(deleted) => debug!(deleted, "Removed expired sessions"),
                    Err(error) => warn!(%error, "Failed to remove expired sessions"),
                }
            }
        }
    }
}
