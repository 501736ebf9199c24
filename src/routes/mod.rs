use axum::Router;

use crate::state::SharedState;

/// Admin routes.
pub mod admin;
/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// Guest routes.
pub mod player;
/// Event stream route.
pub mod sse;

/// Every route of the service, bound to `state`.
pub fn router(state: SharedState) -> Router<()> {
    Router::new()
        .merge(health::router())
        .merge(sse::router())
        .merge(player::router())
        .merge(admin::router(state.clone()))
        .merge(docs::router())
        .with_state(state)
}
