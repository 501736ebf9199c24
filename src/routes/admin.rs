use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::admin::{
        ActionRequest, ListSessionsQuery, ResetResponse, SessionListResponse,
        SessionStatusResponse, StartSessionRequest, StartSessionResponse,
    },
    error::AppError,
    services::{results_service, session_service},
    state::{
        SharedState,
        results::FinalResults,
        scoring::QuestionResult,
        session::SessionId,
    },
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for starting, driving and inspecting sessions.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route(
            "/admin/sessions",
            get(list_sessions).post(start_session).delete(reset_sessions),
        )
        .route("/admin/sessions/{id}", get(session_status))
        .route("/admin/sessions/{id}/action", post(dispatch_action))
        .route("/admin/sessions/{id}/results", get(final_results))
        .route(
            "/admin/sessions/{id}/question-results",
            get(question_results),
        )
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Start a live session from a quiz definition.
#[utoipa::path(
    post,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Shared admin token, when configured")),
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Invalid quiz or limits exceeded"),
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<StartSessionRequest>>,
) -> Result<(StatusCode, Json<StartSessionResponse>), AppError> {
    let response = session_service::start_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List session ids, split between running and ended sessions.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Shared admin token, when configured"),
        ListSessionsQuery,
    ),
    responses((status = 200, description = "Known sessions", body = SessionListResponse))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Query(query): Query<ListSessionsQuery>,
) -> Json<SessionListResponse> {
    Json(session_service::list_sessions(&state, query.quiz_id).await)
}

/// End every session and restart id numbering.
#[utoipa::path(
    delete,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Shared admin token, when configured")),
    responses((status = 200, description = "Registry reset", body = ResetResponse))
)]
pub async fn reset_sessions(State(state): State<SharedState>) -> Json<ResetResponse> {
    Json(session_service::reset(&state).await)
}

/// Retrieve the status of a session.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Shared admin token, when configured"),
        ("id" = u64, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn session_status(
    State(state): State<SharedState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(session_service::session_status(&state, id).await?))
}

/// Apply an administrator action to a session.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/action",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Shared admin token, when configured"),
        ("id" = u64, Path, description = "Session identifier"),
    ),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action applied", body = SessionStatusResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Action not allowed in the current state"),
    )
)]
pub async fn dispatch_action(
    State(state): State<SharedState>,
    Path(id): Path<SessionId>,
    Json(payload): Json<ActionRequest>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        session_service::dispatch_action(&state, id, payload.action).await?,
    ))
}

/// Final scoreboard, available while the final results are displayed.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}/results",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Shared admin token, when configured"),
        ("id" = u64, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Final results", body = FinalResults),
        (status = 409, description = "Final results not displayed"),
    )
)]
pub async fn final_results(
    State(state): State<SharedState>,
    Path(id): Path<SessionId>,
) -> Result<Json<FinalResults>, AppError> {
    Ok(Json(results_service::final_results(&state, id).await?))
}

/// Result of the question currently displayed.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}/question-results",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Shared admin token, when configured"),
        ("id" = u64, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Question result", body = QuestionResult),
        (status = 409, description = "No answer displayed"),
    )
)]
pub async fn question_results(
    State(state): State<SharedState>,
    Path(id): Path<SessionId>,
) -> Result<Json<QuestionResult>, AppError> {
    Ok(Json(results_service::question_results(&state, id).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin token".into()))
    }
}
