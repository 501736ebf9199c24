//! Scoring of a closed question.
//!
//! Pure functions over the question body and the players' pending submissions;
//! the caller is responsible for storing the result once and crediting scores.

use std::{cmp::Ordering, collections::HashSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::session::{AnswerId, Player, PlayerId, QuestionBody, QuestionId};

/// Fully-correct respondents credited for one correct answer option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnswerInformation {
    /// Correct answer option.
    pub answer_id: AnswerId,
    /// Names of the fully-correct respondents, fastest first.
    pub players_correct: Vec<String>,
}

/// Points a player earned on one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerAward {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Player display name.
    pub name: String,
    /// Points awarded for this question, rounded to one decimal.
    pub points: f64,
}

/// Outcome of a question, written once when it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionResult {
    /// Question this result belongs to.
    pub question_id: QuestionId,
    /// One entry per correct answer id.
    pub answer_information: Vec<AnswerInformation>,
    /// Mean latency over every respondent, 0 when nobody answered.
    pub average_answer_time_ms: f64,
    /// Share of all session players that were fully correct, in `[0, 100]`.
    pub percent_correct: f64,
    /// Every player, by points awarded descending then player id.
    pub player_ranking: Vec<PlayerAward>,
}

struct Respondent<'a> {
    player: &'a Player,
    latency_ms: u64,
    fully_correct: bool,
}

/// Score `question` from the pending submissions of `players`.
pub fn score_question<'a, I>(question: &QuestionBody, players: I) -> QuestionResult
where
    I: IntoIterator<Item = &'a Player>,
{
    let correct: HashSet<AnswerId> = question.correct_answer_ids().collect();
    let players: Vec<&Player> = players.into_iter().collect();

    let respondents: Vec<Respondent<'_>> = players
        .iter()
        .filter_map(|player| {
            let submission = player.submission()?;
            if submission.answer_ids.is_empty() {
                return None;
            }
            let selected: HashSet<AnswerId> = submission.answer_ids.iter().copied().collect();
            Some(Respondent {
                player,
                latency_ms: submission.latency_ms,
                // Extra wrong selections do not disqualify.
                fully_correct: correct.is_subset(&selected),
            })
        })
        .collect();

    let average_answer_time_ms = if respondents.is_empty() {
        0.0
    } else {
        respondents.iter().map(|r| r.latency_ms as f64).sum::<f64>() / respondents.len() as f64
    };

    let mut ranked: Vec<&Respondent<'_>> = respondents.iter().filter(|r| r.fully_correct).collect();
    ranked.sort_by_key(|r| (r.latency_ms, r.player.id()));

    let percent_correct = if players.is_empty() {
        0.0
    } else {
        ranked.len() as f64 / players.len() as f64 * 100.0
    };

    let answer_information = question
        .correct_answer_ids()
        .map(|answer_id| AnswerInformation {
            answer_id,
            players_correct: ranked
                .iter()
                .map(|r| r.player.name().to_string())
                .collect(),
        })
        .collect();

    let mut player_ranking: Vec<PlayerAward> = players
        .iter()
        .map(|player| {
            let points = ranked
                .iter()
                .position(|r| r.player.id() == player.id())
                .map(|index| points_for_rank(question.points, index + 1))
                .unwrap_or(0.0);
            PlayerAward {
                player_id: player.id(),
                name: player.name().to_string(),
                points,
            }
        })
        .collect();
    player_ranking.sort_by(|a, b| {
        b.points
            .partial_cmp(&a.points)
            .unwrap_or(Ordering::Equal)
            .then(a.player_id.cmp(&b.player_id))
    });

    QuestionResult {
        question_id: question.id,
        answer_information,
        average_answer_time_ms,
        percent_correct,
        player_ranking,
    }
}

/// `points / rank`, rounded to one decimal place.
pub fn points_for_rank(points: u32, rank: usize) -> f64 {
    round_one_decimal(f64::from(points) / rank as f64)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
