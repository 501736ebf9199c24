use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct HealthResponse {
    /// "ok", or "degraded" while session snapshots cannot be persisted.
    pub status: String,
    /// Sessions that have not ended.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag and the running session count.
    pub fn new(degraded: bool, active_sessions: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            active_sessions,
        }
    }
}
