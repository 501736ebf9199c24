use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::SharedState;

/// How often the store health is checked.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Probe the session store forever, toggling degraded mode as it fails and recovers.
///
/// While the store is failing, checks back off exponentially up to 30 s.
pub async fn run(state: SharedState) {
    let mut delay = HEALTH_POLL_INTERVAL;
    let mut failures: u32 = 0;

    loop {
        match state.store().health_check().await {
            Ok(()) => {
                if failures > 0 || state.is_degraded() {
                    info!(failures, "storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                failures = 0;
                delay = HEALTH_POLL_INTERVAL;
            }
            Err(err) => {
                if failures == 0 {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt = failures, error = %err, "storage still unavailable");
                }
                failures += 1;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }

        sleep(delay).await;
    }
}
