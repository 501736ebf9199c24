use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    scoring::QuestionResult,
    session::{PlayerId, SessionId},
    state_machine::{SessionAction, SessionState},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed events use the default `message` type.
    pub event: Option<String>,
    /// JSON-encoded payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether session persistence is currently failing.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the service enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether session persistence is currently failing.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after every applied transition, whether triggered by an admin or a timer.
pub struct StateChangedEvent {
    /// Session that moved.
    pub session_id: SessionId,
    /// Previous state.
    pub from: SessionState,
    /// New state.
    pub to: SessionState,
    /// Admin action behind the change; absent for timer-driven transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SessionAction>,
    /// 1-based current question after the transition.
    pub at_question: usize,
    /// Session version after the transition.
    pub version: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a question has been scored.
pub struct QuestionClosedEvent {
    /// Session the question belongs to.
    pub session_id: SessionId,
    /// 1-based position of the scored question.
    pub position: usize,
    /// Stored result of the question.
    pub result: QuestionResult,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a guest joins a session lobby.
pub struct PlayerJoinedEvent {
    /// Session that was joined.
    pub session_id: SessionId,
    /// New player's identifier.
    pub player_id: PlayerId,
    /// New player's display name.
    pub name: String,
    /// Players in the lobby, including the new one.
    pub player_count: usize,
}
