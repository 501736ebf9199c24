use crate::{
    dao::models::SessionEntity,
    dto::sse::{PlayerJoinedEvent, QuestionClosedEvent, StateChangedEvent, SystemStatus},
    state::{
        SharedState,
        session::PlayerId,
        state_machine::{SessionEvent, Transition},
    },
};

const EVENT_STATE_CHANGED: &str = "session.state_changed";
const EVENT_QUESTION_CLOSED: &str = "session.question_closed";
const EVENT_PLAYER_JOINED: &str = "session.player_joined";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast an applied transition.
pub fn broadcast_state_changed(state: &SharedState, session: &SessionEntity, transition: &Transition) {
    let action = match transition.event {
        SessionEvent::Action(action) => Some(action),
        SessionEvent::CountdownElapsed | SessionEvent::QuestionTimeUp => None,
    };
    let payload = StateChangedEvent {
        session_id: session.id,
        from: transition.from,
        to: transition.to,
        action,
        at_question: session.at_question,
        version: session.version,
    };
    state.public_sse().publish(EVENT_STATE_CHANGED, &payload);
}

/// Broadcast the stored result of the question the session is on, if any.
pub fn broadcast_question_closed(state: &SharedState, session: &SessionEntity) {
    let Some(result) = session
        .at_question
        .checked_sub(1)
        .and_then(|index| session.questions.get(index))
        .and_then(|question| question.result.clone())
    else {
        return;
    };

    let payload = QuestionClosedEvent {
        session_id: session.id,
        position: session.at_question,
        result,
    };
    state.public_sse().publish(EVENT_QUESTION_CLOSED, &payload);
}

/// Broadcast that `player_id` joined the lobby of `session`.
pub fn broadcast_player_joined(state: &SharedState, session: &SessionEntity, player_id: PlayerId) {
    let Some(player) = session.players.iter().find(|player| player.id == player_id) else {
        return;
    };
    let payload = PlayerJoinedEvent {
        session_id: session.id,
        player_id,
        name: player.name.clone(),
        player_count: session.players.len(),
    };
    state.public_sse().publish(EVENT_PLAYER_JOINED, &payload);
}

/// Broadcast the degraded flag.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    state
        .public_sse()
        .publish(EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}
