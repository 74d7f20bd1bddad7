use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use zerowaste_api::AppState;

/// Background task that expires donations past their pickup deadline.
pub async fn run_expiry_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = state.clone();
        let result =
            tokio::task::spawn_blocking(move || db.db.expire_overdue_donations(Utc::now())).await;

        match result {
            Ok(Ok(count)) => debug!("Sweep done, {} expired", count),
            Ok(Err(e)) => warn!("Sweep error: {:#}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
