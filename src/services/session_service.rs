//! Session lifecycle: start, administrator actions, timer firings, listing and reset.
//!
//! Every mutation runs under the session's own lock, and the lock stays held
//! until the snapshot is persisted and the events are broadcast, so stores and
//! subscribers observe mutations of one session in the order they were applied.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::SessionEntity,
    dto::admin::{
        ResetResponse, SessionListResponse, SessionStatusResponse, StartSessionRequest,
        StartSessionResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SessionSlot, SharedState,
        session::{QuizDefinition, Session, SessionError, SessionId},
        state_machine::{SessionAction, SessionEvent, SessionState, Transition},
        timer::{TimerEffect, TimerHandle, TimerKind, TimerRequest},
    },
};

/// Freeze the quiz in `request` into a new session waiting in the lobby.
pub async fn start_session(
    state: &SharedState,
    request: StartSessionRequest,
) -> Result<StartSessionResponse, ServiceError> {
    let auto_start_num = request.auto_start_num;
    let quiz = QuizDefinition::from(request);
    quiz.validate()?;

    let config = state.config();
    if auto_start_num > config.max_auto_start_num {
        return Err(ServiceError::InvalidInput(format!(
            "auto_start_num must be at most {} (got {auto_start_num})",
            config.max_auto_start_num
        )));
    }

    // Held until the new session is registered so the count below stays accurate.
    let _starts = state.registry().lock_starts().await;
    let active = state.registry().active_for_quiz(quiz.quiz_id).await;
    if active >= config.max_active_sessions_per_quiz {
        return Err(ServiceError::InvalidInput(format!(
            "quiz {} already has {active} active sessions",
            quiz.quiz_id
        )));
    }

    let session_id = state.registry().allocate_session_id();
    let session = Session::new(session_id, quiz, auto_start_num, config.countdown);
    let entity = SessionEntity::from(&session);

    info!(
        session_id,
        quiz_id = %entity.quiz_id,
        questions = entity.questions.len(),
        auto_start_num,
        "session started"
    );
    // Persisted before the session becomes reachable by any other request.
    state.persist_session(entity).await;
    state.registry().insert(session);

    Ok(StartSessionResponse { session_id })
}

/// Apply an administrator action to a session.
pub async fn dispatch_action(
    state: &SharedState,
    session_id: SessionId,
    action: SessionAction,
) -> Result<SessionStatusResponse, ServiceError> {
    let slot = session_slot(state, session_id)?;
    let mut session = slot.lock().await;

    let transition = drive(state, &mut session, action.into()).inspect_err(|err| {
        debug!(session_id, ?action, error = %err, "action refused");
    })?;
    let entity = SessionEntity::from(&*session);

    info!(
        session_id,
        ?action,
        from = ?transition.from,
        to = ?transition.to,
        "session action applied"
    );
    let status = SessionStatusResponse::from(&entity);
    commit(state, Some(&transition), entity).await;
    drop(session);
    Ok(status)
}

/// Administrator view of a session.
pub async fn session_status(
    state: &SharedState,
    session_id: SessionId,
) -> Result<SessionStatusResponse, ServiceError> {
    let slot = session_slot(state, session_id)?;
    let session = slot.lock().await;
    Ok(SessionStatusResponse::from(&SessionEntity::from(&*session)))
}

/// Ids of every session, optionally restricted to one quiz, split by whether they ended.
pub async fn list_sessions(state: &SharedState, quiz_id: Option<Uuid>) -> SessionListResponse {
    let mut listing = SessionListResponse::default();
    for entry in state.registry().entries().await {
        if quiz_id.is_some_and(|quiz_id| quiz_id != entry.quiz_id) {
            continue;
        }
        if entry.state == SessionState::End {
            listing.inactive_sessions.push(entry.id);
        } else {
            listing.active_sessions.push(entry.id);
        }
    }
    listing
}

/// End every session, drop them all and restart id numbering.
pub async fn reset(state: &SharedState) -> ResetResponse {
    let _starts = state.registry().lock_starts().await;
    let ended_sessions = end_all(state).await;

    state.registry().clear();
    if let Err(err) = state.store().clear().await {
        warn!(error = %err, "failed to clear stored sessions");
        state.update_degraded(true);
    }

    info!(ended_sessions, "session registry reset");
    ResetResponse { ended_sessions }
}

/// Apply `END` to every session still running, persisting each ended snapshot.
///
/// Returns how many sessions were ended.
pub async fn end_all(state: &SharedState) -> usize {
    let mut ended_sessions = 0;
    for (session_id, slot) in state.registry().slots() {
        let mut session = slot.lock().await;
        if session.state() == SessionState::End {
            continue;
        }
        match drive(state, &mut session, SessionAction::End.into()) {
            Ok(transition) => {
                ended_sessions += 1;
                commit(state, Some(&transition), SessionEntity::from(&*session)).await;
            }
            Err(err) => warn!(session_id, error = %err, "failed to end session"),
        }
    }
    ended_sessions
}

/// Register every stored session so it can be driven again after a restart.
///
/// Timers do not survive a restart, so a snapshot taken during a countdown or
/// an open question is closed with `END`. Returns how many sessions were restored.
pub async fn restore_sessions(state: &SharedState) -> Result<usize, ServiceError> {
    let stored = state.store().list_sessions().await?;
    let mut restored = 0;

    for item in stored {
        let Some(snapshot) = state.store().find_session(item.id).await? else {
            warn!(session_id = item.id, "listed session vanished before it could be read");
            continue;
        };

        let slot = state
            .registry()
            .adopt(Session::restore(snapshot, state.config().countdown));
        restored += 1;

        let mut session = slot.lock().await;
        if !matches!(
            session.state(),
            SessionState::QuestionCountdown | SessionState::QuestionOpen
        ) {
            continue;
        }
        match drive(state, &mut session, SessionAction::End.into()) {
            Ok(transition) => {
                info!(session_id = item.id, from = ?transition.from, "ended interrupted session");
                commit(state, Some(&transition), SessionEntity::from(&*session)).await;
            }
            Err(err) => warn!(session_id = item.id, error = %err, "failed to end restored session"),
        }
    }

    Ok(restored)
}

/// Registered slot of `session_id`.
pub(crate) fn session_slot(
    state: &SharedState,
    session_id: SessionId,
) -> Result<SessionSlot, ServiceError> {
    state
        .registry()
        .get(session_id)
        .ok_or_else(|| ServiceError::NotFound(format!("session {session_id}")))
}

/// Dispatch `event` on a locked session, wiring its timer effects to the shared scheduler.
pub(crate) fn drive(
    state: &SharedState,
    session: &mut Session,
    event: SessionEvent,
) -> Result<Transition, SessionError> {
    let session_id = session.id();
    session.dispatch(
        event,
        Instant::now(),
        |request| {
            let handle = state.timers().schedule(
                request.delay,
                timer_effect(Arc::clone(state), session_id, request),
            );
            debug!(
                session_id,
                timer = %handle,
                kind = ?request.kind,
                delay_ms = request.delay.as_millis() as u64,
                "timer armed"
            );
            handle
        },
        |handle| {
            state.timers().cancel(handle);
            debug!(session_id, timer = %handle, "timer cancelled");
        },
    )
}

/// Broadcast and persist the outcome of a mutation. Call while still holding the session lock.
pub(crate) async fn commit(
    state: &SharedState,
    transition: Option<&Transition>,
    entity: SessionEntity,
) {
    if let Some(transition) = transition {
        sse_events::broadcast_state_changed(state, &entity, transition);
        if transition.closes_question() {
            sse_events::broadcast_question_closed(state, &entity);
        }
    }
    state.persist_session(entity).await;
}

fn timer_effect(state: SharedState, session_id: SessionId, request: TimerRequest) -> TimerEffect {
    Box::new(move |handle| Box::pin(on_timer_fired(state, session_id, request, handle)))
}

async fn on_timer_fired(
    state: SharedState,
    session_id: SessionId,
    request: TimerRequest,
    handle: TimerHandle,
) {
    let Some(slot) = state.registry().get(session_id) else {
        debug!(session_id, timer = %handle, "timer fired for a dropped session");
        return;
    };

    let mut session = slot.lock().await;
    if !session.release_timer(request.kind, handle, request.at_question) {
        debug!(
            session_id,
            timer = %handle,
            state = ?session.state(),
            "stale timer fired; ignoring"
        );
        return;
    }

    let event = match request.kind {
        TimerKind::Countdown => SessionEvent::CountdownElapsed,
        TimerKind::Open => SessionEvent::QuestionTimeUp,
    };
    let transition = match drive(&state, &mut session, event) {
        Ok(transition) => transition,
        Err(err) => {
            warn!(session_id, timer = %handle, error = %err, "timer transition failed");
            return;
        }
    };
    let entity = SessionEntity::from(&*session);

    info!(
        session_id,
        from = ?transition.from,
        to = ?transition.to,
        at_question = entity.at_question,
        "timer transition applied"
    );
    commit(&state, Some(&transition), entity).await;
}
