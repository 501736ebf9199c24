use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Administrator payloads.
pub mod admin;
/// Health check payload.
pub mod health;
/// Guest player payloads.
pub mod player;
/// Server-sent event payloads.
pub mod sse;
/// Custom validators.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
