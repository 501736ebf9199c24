use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::player::{JoinRequest, JoinResponse, PlayerStatusResponse, SubmitAnswerRequest},
    error::AppError,
    services::player_service,
    state::{
        SharedState,
        results::{FinalResults, QuestionInfo},
        scoring::QuestionResult,
        session::PlayerId,
    },
};

/// Guest endpoints: join, answer and read results.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/players/join", post(join))
        .route("/players/{id}", get(status))
        .route("/players/{id}/questions/{position}", get(question_info))
        .route(
            "/players/{id}/questions/{position}/answer",
            put(submit_answer),
        )
        .route(
            "/players/{id}/questions/{position}/results",
            get(question_results),
        )
        .route("/players/{id}/results", get(final_results))
}

/// Join a session lobby as a guest.
#[utoipa::path(
    post,
    path = "/players/join",
    tag = "players",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Joined", body = JoinResponse),
        (status = 400, description = "Name invalid or taken"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already started"),
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let response = player_service::join(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Where the player's session currently is.
#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = u64, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Player status", body = PlayerStatusResponse),
        (status = 404, description = "Unknown player"),
    )
)]
pub async fn status(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<PlayerStatusResponse>, AppError> {
    Ok(Json(player_service::status(&state, id).await?))
}

/// Question being displayed, without correctness flags.
#[utoipa::path(
    get,
    path = "/players/{id}/questions/{position}",
    tag = "players",
    params(
        ("id" = u64, Path, description = "Player identifier"),
        ("position" = usize, Path, description = "1-based question position"),
    ),
    responses(
        (status = 200, description = "Question", body = QuestionInfo),
        (status = 409, description = "Question not displayed"),
    )
)]
pub async fn question_info(
    State(state): State<SharedState>,
    Path((id, position)): Path<(PlayerId, usize)>,
) -> Result<Json<QuestionInfo>, AppError> {
    Ok(Json(player_service::question_info(&state, id, position).await?))
}

/// Submit or replace an answer while the question is open.
#[utoipa::path(
    put,
    path = "/players/{id}/questions/{position}/answer",
    tag = "players",
    params(
        ("id" = u64, Path, description = "Player identifier"),
        ("position" = usize, Path, description = "1-based question position"),
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 204, description = "Answer recorded"),
        (status = 400, description = "Empty, duplicate or unknown answer ids"),
        (status = 409, description = "Question not open"),
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path((id, position)): Path<(PlayerId, usize)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<StatusCode, AppError> {
    player_service::submit_answer(&state, id, position, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Result of the current question once its answer is shown.
#[utoipa::path(
    get,
    path = "/players/{id}/questions/{position}/results",
    tag = "players",
    params(
        ("id" = u64, Path, description = "Player identifier"),
        ("position" = usize, Path, description = "1-based question position"),
    ),
    responses(
        (status = 200, description = "Question result", body = QuestionResult),
        (status = 409, description = "Result not available yet"),
    )
)]
pub async fn question_results(
    State(state): State<SharedState>,
    Path((id, position)): Path<(PlayerId, usize)>,
) -> Result<Json<QuestionResult>, AppError> {
    Ok(Json(
        player_service::question_results(&state, id, position).await?,
    ))
}

/// Final scoreboard of the player's session.
#[utoipa::path(
    get,
    path = "/players/{id}/results",
    tag = "players",
    params(("id" = u64, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Final results", body = FinalResults),
        (status = 409, description = "Final results not displayed"),
    )
)]
pub async fn final_results(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<FinalResults>, AppError> {
    Ok(Json(player_service::final_results(&state, id).await?))
}
