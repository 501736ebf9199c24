//! Read-only projections over a session's stored results.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{
    scoring::QuestionResult,
    session::{AnswerId, PlayerId, QuestionId, Session, SessionError},
    state_machine::SessionState,
};

/// Cumulative score of a player at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerStanding {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Player display name.
    pub name: String,
    /// Total points over every question.
    pub score: f64,
}

/// Whole-session scoreboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinalResults {
    /// Players by score descending, then player id.
    pub players_ranked: Vec<PlayerStanding>,
    /// Stored question results in question order.
    pub question_results: Vec<QuestionResult>,
}

/// Answer option as shown to players, without its correctness flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnswerChoice {
    /// Answer identifier.
    pub id: AnswerId,
    /// Answer text.
    pub text: String,
}

/// Question as shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuestionInfo {
    /// Question identifier.
    pub question_id: QuestionId,
    /// 1-based position inside the session.
    pub position: usize,
    /// Question text.
    pub text: String,
    /// How long the question stays open, in milliseconds.
    pub duration_ms: u64,
    /// Points for the fastest fully-correct player.
    pub points: u32,
    /// Options in display order.
    pub answers: Vec<AnswerChoice>,
}

fn illegal(session: &Session, reason: &str) -> SessionError {
    SessionError::IllegalState {
        state: session.state(),
        reason: reason.to_string(),
    }
}

/// Result of the question currently displayed.
pub fn question_result(session: &Session) -> Result<&QuestionResult, SessionError> {
    if !matches!(
        session.state(),
        SessionState::AnswerShow | SessionState::FinalResults | SessionState::End
    ) {
        return Err(illegal(
            session,
            "question results are only available once the answer is shown",
        ));
    }

    session
        .current_question()
        .and_then(|question| question.result())
        .ok_or_else(|| illegal(session, "the current question has no stored result"))
}

/// Result of the question at `position`, which must be the current one.
pub fn question_result_at(session: &Session, position: usize) -> Result<&QuestionResult, SessionError> {
    check_current_position(session, position)?;
    question_result(session)
}

/// Question at `position` as shown to players.
pub fn question_info(session: &Session, position: usize) -> Result<QuestionInfo, SessionError> {
    check_current_position(session, position)?;
    if matches!(
        session.state(),
        SessionState::Lobby
            | SessionState::QuestionCountdown
            | SessionState::FinalResults
            | SessionState::End
    ) {
        return Err(illegal(session, "no question is being displayed"));
    }

    let question = session
        .current_question()
        .ok_or_else(|| SessionError::NotFound(format!("question {position}")))?
        .body();

    Ok(QuestionInfo {
        question_id: question.id,
        position,
        text: question.text.clone(),
        duration_ms: u64::try_from(question.duration.as_millis()).unwrap_or(u64::MAX),
        points: question.points,
        answers: question
            .answers
            .iter()
            .map(|answer| AnswerChoice {
                id: answer.id,
                text: answer.text.clone(),
            })
            .collect(),
    })
}

/// Whole-session scoreboard, only while the final results are displayed.
pub fn final_results(session: &Session) -> Result<FinalResults, SessionError> {
    if session.state() != SessionState::FinalResults {
        return Err(illegal(
            session,
            "final results are only available while they are displayed",
        ));
    }

    let mut players_ranked: Vec<PlayerStanding> = session
        .players()
        .map(|player| PlayerStanding {
            player_id: player.id(),
            name: player.name().to_string(),
            score: player.score(),
        })
        .collect();
    players_ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.player_id.cmp(&b.player_id))
    });

    let question_results = session
        .questions()
        .iter()
        .filter_map(|question| question.result().cloned())
        .collect();

    Ok(FinalResults {
        players_ranked,
        question_results,
    })
}

fn check_current_position(session: &Session, position: usize) -> Result<(), SessionError> {
    if position == 0 || position > session.questions().len() {
        return Err(SessionError::Validation(format!(
            "question position {position} is not valid for session {}",
            session.id()
        )));
    }
    if position != session.at_question() {
        return Err(illegal(
            session,
            &format!("session is on question {}", session.at_question()),
        ));
    }
    Ok(())
}
