/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Guest join, answer submission and player-facing queries.
pub mod player_service;
/// Administrator result queries.
pub mod results_service;
/// Session lifecycle and timer-driven transitions.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Periodic session store health probing.
pub mod storage_supervisor;
