use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    dao::models::SessionEntity,
    dto::player::{JoinRequest, JoinResponse, PlayerStatusResponse, SubmitAnswerRequest},
    error::ServiceError,
    services::{
        session_service::{commit, drive, session_slot},
        sse_events,
    },
    state::{
        SessionSlot, SharedState,
        results::{self, FinalResults, QuestionInfo},
        scoring::QuestionResult,
        session::PlayerId,
        state_machine::SessionAction,
    },
};

/// Add a guest to a session lobby, starting the first question when the auto-start count is reached.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<JoinResponse, ServiceError> {
    let session_id = request.session_id;
    let slot = session_slot(state, session_id)?;

    let mut session = slot.lock().await;
    let player_id = state.registry().allocate_player_id();
    let name = session.join(player_id, &request.name, &mut rand::rng())?;
    state.registry().register_player(player_id, session_id);
    let joined = SessionEntity::from(&*session);

    info!(session_id, player_id, name = %name, "player joined");
    sse_events::broadcast_player_joined(state, &joined, player_id);

    let auto_started = if session.auto_start_due() {
        match drive(state, &mut session, SessionAction::NextQuestion.into()) {
            Ok(transition) => Some((transition, SessionEntity::from(&*session))),
            Err(err) => {
                warn!(session_id, error = %err, "auto-start failed");
                None
            }
        }
    } else {
        None
    };

    match auto_started {
        Some((transition, entity)) => {
            info!(session_id, players = entity.players.len(), "auto-start threshold reached");
            commit(state, Some(&transition), entity).await;
        }
        None => commit(state, None, joined).await,
    }
    drop(session);

    Ok(JoinResponse { player_id, name })
}

/// State of the session `player_id` belongs to.
pub async fn status(
    state: &SharedState,
    player_id: PlayerId,
) -> Result<PlayerStatusResponse, ServiceError> {
    let slot = player_slot(state, player_id)?;
    let session = slot.lock().await;
    let player = session
        .player(player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player {player_id}")))?;

    Ok(PlayerStatusResponse {
        state: session.state(),
        num_questions: session.questions().len(),
        at_question: player.at_question(),
    })
}

/// Question at `position` as shown to `player_id`.
pub async fn question_info(
    state: &SharedState,
    player_id: PlayerId,
    position: usize,
) -> Result<QuestionInfo, ServiceError> {
    let slot = player_slot(state, player_id)?;
    let session = slot.lock().await;
    Ok(results::question_info(&session, position)?)
}

/// Record `player_id`'s answer to the question at `position`.
pub async fn submit_answer(
    state: &SharedState,
    player_id: PlayerId,
    position: usize,
    request: SubmitAnswerRequest,
) -> Result<(), ServiceError> {
    let received_at = Instant::now();
    let slot = player_slot(state, player_id)?;

    let mut session = slot.lock().await;
    session
        .submit_answer(player_id, position, &request.answer_ids, received_at)
        .inspect_err(|err| {
            debug!(session_id = session.id(), player_id, position, error = %err, "answer refused");
        })?;
    let entity = SessionEntity::from(&*session);

    debug!(session_id = entity.id, player_id, position, "answer recorded");
    commit(state, None, entity).await;
    drop(session);
    Ok(())
}

/// Result of the question at `position`, which must be the current one.
pub async fn question_results(
    state: &SharedState,
    player_id: PlayerId,
    position: usize,
) -> Result<QuestionResult, ServiceError> {
    let slot = player_slot(state, player_id)?;
    let session = slot.lock().await;
    Ok(results::question_result_at(&session, position)?.clone())
}

/// Final scoreboard of the session `player_id` belongs to.
pub async fn final_results(
    state: &SharedState,
    player_id: PlayerId,
) -> Result<FinalResults, ServiceError> {
    let slot = player_slot(state, player_id)?;
    let session = slot.lock().await;
    Ok(results::final_results(&session)?)
}

fn player_slot(state: &SharedState, player_id: PlayerId) -> Result<SessionSlot, ServiceError> {
    let session_id = state
        .registry()
        .session_of_player(player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player {player_id}")))?;
    session_slot(state, session_id)
}
