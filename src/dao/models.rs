use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    scoring::QuestionResult,
    session::{AnswerId, PlayerId, QuestionId, Session, SessionId},
    state_machine::SessionState,
};

/// Persisted snapshot of a session, written after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEntity {
    /// Session identifier.
    pub id: SessionId,
    /// Quiz the session was started from.
    pub quiz_id: Uuid,
    /// Quiz display name.
    pub quiz_name: String,
    /// Lifecycle state at snapshot time.
    pub state: SessionState,
    /// Number of transitions applied.
    pub version: usize,
    /// 1-based position of the current question, 0 in the lobby.
    pub at_question: usize,
    /// Auto-start player threshold (0 when disabled).
    pub auto_start_num: usize,
    /// Frozen questions with their stored results.
    pub questions: Vec<QuestionEntity>,
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last mutation time.
    pub updated_at: SystemTime,
}

/// Question copy stored with its session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntity {
    /// Question identifier from the quiz.
    pub id: QuestionId,
    /// Question text.
    pub text: String,
    /// How long the question stays open, in milliseconds.
    pub duration_ms: u64,
    /// Points for the fastest fully-correct player.
    pub points: u32,
    /// Answer options in display order.
    pub answers: Vec<AnswerEntity>,
    /// Wall-clock time the question opened.
    pub opened_at: Option<SystemTime>,
    /// Write-once result, present once closed.
    pub result: Option<QuestionResult>,
}

/// Answer option stored with its question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Answer identifier.
    pub id: AnswerId,
    /// Answer text.
    pub text: String,
    /// Whether the option is part of the correct set.
    pub correct: bool,
}

/// Player stored with its session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Accumulated points.
    pub score: f64,
    /// Question position shown to the player.
    pub at_question: usize,
}

/// Listing row returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionListItemEntity {
    /// Session identifier.
    pub id: SessionId,
    /// Source quiz.
    pub quiz_id: Uuid,
    /// State in the stored snapshot.
    pub state: SessionState,
}

impl From<&Session> for SessionEntity {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id(),
            quiz_id: session.quiz_id(),
            quiz_name: session.quiz_name().to_string(),
            state: session.state(),
            version: session.version(),
            at_question: session.at_question(),
            auto_start_num: session.auto_start_num(),
            questions: session
                .questions()
                .iter()
                .map(|question| {
                    let body = question.body();
                    QuestionEntity {
                        id: body.id,
                        text: body.text.clone(),
                        duration_ms: u64::try_from(body.duration.as_millis()).unwrap_or(u64::MAX),
                        points: body.points,
                        answers: body
                            .answers
                            .iter()
                            .map(|answer| AnswerEntity {
                                id: answer.id,
                                text: answer.text.clone(),
                                correct: answer.correct,
                            })
                            .collect(),
                        opened_at: question.opened_at().map(|opened| opened.wall),
                        result: question.result().cloned(),
                    }
                })
                .collect(),
            players: session
                .players()
                .map(|player| PlayerEntity {
                    id: player.id(),
                    name: player.name().to_string(),
                    score: player.score(),
                    at_question: player.at_question(),
                })
                .collect(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}

impl From<&SessionEntity> for SessionListItemEntity {
    fn from(entity: &SessionEntity) -> Self {
        Self {
            id: entity.id,
            quiz_id: entity.quiz_id,
            state: entity.state,
        }
    }
}
