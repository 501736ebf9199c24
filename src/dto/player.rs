use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_player_name,
    state::{
        session::{AnswerId, PlayerId, SessionId},
        state_machine::SessionState,
    },
};

/// Guest join request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Session to join.
    pub session_id: SessionId,
    /// Requested display name; blank to get a generated one.
    #[serde(default)]
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Identity handed to a guest that joined.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Player identifier used by every later guest request.
    pub player_id: PlayerId,
    /// Name the player ended up with.
    pub name: String,
}

/// Where a player's session currently is.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct PlayerStatusResponse {
    /// Current lifecycle state of the session.
    pub state: SessionState,
    /// Number of questions in the session.
    pub num_questions: usize,
    /// Question position shown to the player, 0 in the lobby.
    pub at_question: usize,
}

/// Answer ids selected for a question. Replaces any earlier submission.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Selected answer ids, non-empty and without duplicates.
    pub answer_ids: Vec<AnswerId>,
}
