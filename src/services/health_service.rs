use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState, state::state_machine::SessionState};

/// Report degraded mode and the number of running sessions, probing the store on the way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.store().health_check().await {
        warn!(error = %err, "storage health check failed");
        state.update_degraded(true);
    }

    let active_sessions = state
        .registry()
        .entries()
        .await
        .iter()
        .filter(|entry| entry.state != SessionState::End)
        .count();

    HealthResponse::new(state.is_degraded(), active_sessions)
}
