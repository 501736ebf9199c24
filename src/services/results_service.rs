use crate::{
    error::ServiceError,
    services::session_service::session_slot,
    state::{
        SharedState,
        results::{self, FinalResults},
        scoring::QuestionResult,
        session::SessionId,
    },
};

/// Result of the question `session_id` is displaying.
pub async fn question_results(
    state: &SharedState,
    session_id: SessionId,
) -> Result<QuestionResult, ServiceError> {
    let slot = session_slot(state, session_id)?;
    let session = slot.lock().await;
    Ok(results::question_result(&session)?.clone())
}

/// Final scoreboard of `session_id`.
pub async fn final_results(
    state: &SharedState,
    session_id: SessionId,
) -> Result<FinalResults, ServiceError> {
    let slot = session_slot(state, session_id)?;
    let session = slot.lock().await;
    Ok(results::final_results(&session)?)
}
