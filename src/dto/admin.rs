use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SessionEntity,
    dto::{format_system_time, validation::validate_unique_ids},
    state::{
        session::{AnswerOption, QuestionBody, QuizDefinition, SessionId},
        state_machine::{SessionAction, SessionState},
    },
};

/// Quiz content and options used to start a live session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    /// Identifier of the source quiz.
    pub quiz_id: Uuid,
    /// Quiz display name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Questions in play order.
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
    /// Number of joined players that starts the first question automatically (0 disables it).
    #[serde(default)]
    pub auto_start_num: usize,
}

/// Question of the quiz being started.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_question_answer_ids"))]
pub struct QuestionInput {
    /// Question identifier, unique within the quiz.
    pub id: u64,
    /// Question text.
    #[validate(length(min = 1))]
    pub text: String,
    /// How long the question stays open, in milliseconds.
    #[validate(range(min = 1))]
    pub duration_ms: u64,
    /// Points for the fastest fully-correct player.
    pub points: u32,
    /// Answer options in display order.
    #[validate(length(min = 1), nested)]
    pub answers: Vec<AnswerInput>,
}

/// Answer option of a question.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct AnswerInput {
    /// Answer identifier, unique within the question.
    pub id: u64,
    /// Answer text.
    #[validate(length(min = 1))]
    pub text: String,
    /// Whether this option must be selected to be fully correct.
    #[serde(default)]
    pub correct: bool,
}

fn validate_question_answer_ids(question: &QuestionInput) -> Result<(), validator::ValidationError> {
    let ids: Vec<u64> = question.answers.iter().map(|answer| answer.id).collect();
    validate_unique_ids(&ids)
}

impl From<StartSessionRequest> for QuizDefinition {
    fn from(request: StartSessionRequest) -> Self {
        Self {
            quiz_id: request.quiz_id,
            name: request.name,
            questions: request
                .questions
                .into_iter()
                .map(|question| QuestionBody {
                    id: question.id,
                    text: question.text,
                    duration: Duration::from_millis(question.duration_ms),
                    points: question.points,
                    answers: question
                        .answers
                        .into_iter()
                        .map(|answer| AnswerOption {
                            id: answer.id,
                            text: answer.text,
                            correct: answer.correct,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Identifier of a newly started session.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResponse {
    /// Identifier of the new session.
    pub session_id: SessionId,
}

/// Administrator command against a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionRequest {
    /// Action to apply.
    pub action: SessionAction,
}

/// Query parameters of the session listing.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// Restrict the listing to sessions of this quiz.
    pub quiz_id: Option<Uuid>,
}

/// Session ids split by whether they have ended.
#[derive(Debug, Default, Serialize, ToSchema, PartialEq, Eq)]
pub struct SessionListResponse {
    /// Sessions that have not ended.
    pub active_sessions: Vec<SessionId>,
    /// Ended sessions.
    pub inactive_sessions: Vec<SessionId>,
}

/// Administrator view of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    /// Session identifier.
    pub session_id: SessionId,
    /// Source quiz.
    pub quiz_id: Uuid,
    /// Source quiz name.
    pub quiz_name: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Number of transitions applied.
    pub version: usize,
    /// 1-based current question, 0 in the lobby.
    pub at_question: usize,
    /// Number of questions in the session.
    pub question_count: usize,
    /// Auto-start player threshold (0 when disabled).
    pub auto_start_num: usize,
    /// Player names, sorted.
    pub players: Vec<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last mutation.
    pub updated_at: String,
}

impl From<&SessionEntity> for SessionStatusResponse {
    fn from(entity: &SessionEntity) -> Self {
        let mut players: Vec<String> = entity
            .players
            .iter()
            .map(|player| player.name.clone())
            .collect();
        players.sort();

        Self {
            session_id: entity.id,
            quiz_id: entity.quiz_id,
            quiz_name: entity.quiz_name.clone(),
            state: entity.state,
            version: entity.version,
            at_question: entity.at_question,
            question_count: entity.questions.len(),
            auto_start_num: entity.auto_start_num,
            players,
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}

/// Confirmation returned once the registry has been reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    /// Number of sessions that were still running and got ended.
    pub ended_sessions: usize,
}
