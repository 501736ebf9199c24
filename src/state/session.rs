use std::{collections::HashSet, time::Duration, time::SystemTime};

use indexmap::IndexMap;
use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::dao::models::SessionEntity;
use crate::state::{
    names,
    scoring::{self, QuestionResult},
    state_machine::{
        Effect, InvalidTransition, Progress, SessionEvent, SessionState,
        SessionStateMachine, Transition,
    },
    timer::{TimerHandle, TimerKind, TimerRequest},
};

/// Identifier of a live session.
pub type SessionId = u64;
/// Identifier of a guest player, unique across sessions.
pub type PlayerId = u64;
/// Identifier of a question inside its quiz definition.
pub type QuestionId = u64;
/// Identifier of an answer option inside its question.
pub type AnswerId = u64;

/// Errors raised by the session core. None of them leave the session modified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Malformed input, e.g. empty or unknown answer ids.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The requested action is not part of the transition table for the current state.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The requested operation or query is not allowed in the current state.
    #[error("not allowed while {state:?}: {reason}")]
    IllegalState {
        /// State the session was in.
        state: SessionState,
        /// Why the operation was refused.
        reason: String,
    },
    /// Unknown session, player or question.
    #[error("not found: {0}")]
    NotFound(String),
}

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    /// Identifier, unique within the question.
    pub id: AnswerId,
    /// Text shown to players.
    pub text: String,
    /// Whether selecting this option is required to be fully correct.
    pub correct: bool,
}

/// Immutable content of a question, copied from the quiz definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBody {
    /// Identifier inside the quiz definition.
    pub id: QuestionId,
    /// Question text.
    pub text: String,
    /// How long the question stays open.
    pub duration: Duration,
    /// Points awarded to the fastest fully-correct player.
    pub points: u32,
    /// Answer options in display order.
    pub answers: Vec<AnswerOption>,
}

impl QuestionBody {
    /// Identifiers of every correct option.
    pub fn correct_answer_ids(&self) -> impl Iterator<Item = AnswerId> + '_ {
        self.answers
            .iter()
            .filter(|answer| answer.correct)
            .map(|answer| answer.id)
    }

    fn has_answer(&self, id: AnswerId) -> bool {
        self.answers.iter().any(|answer| answer.id == id)
    }
}

/// Quiz content handed over by the quiz provider when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDefinition {
    /// Identifier of the source quiz.
    pub quiz_id: Uuid,
    /// Display name of the quiz.
    pub name: String,
    /// Ordered questions.
    pub questions: Vec<QuestionBody>,
}

impl QuizDefinition {
    /// Check the invariants the lifecycle relies on.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.questions.is_empty() {
            return Err(SessionError::Validation(
                "a quiz needs at least one question to be started".into(),
            ));
        }

        let mut question_ids = HashSet::new();
        for question in &self.questions {
            if !question_ids.insert(question.id) {
                return Err(SessionError::Validation(format!(
                    "duplicate question id {}",
                    question.id
                )));
            }
            if question.duration.is_zero() {
                return Err(SessionError::Validation(format!(
                    "question {} must have a strictly positive duration",
                    question.id
                )));
            }
            if question.answers.is_empty() {
                return Err(SessionError::Validation(format!(
                    "question {} has no answers",
                    question.id
                )));
            }
            let mut answer_ids = HashSet::new();
            if let Some(dup) = question.answers.iter().find(|a| !answer_ids.insert(a.id)) {
                return Err(SessionError::Validation(format!(
                    "question {} declares answer id {} twice",
                    question.id, dup.id
                )));
            }
            if question.correct_answer_ids().next().is_none() {
                return Err(SessionError::Validation(format!(
                    "question {} has no correct answer",
                    question.id
                )));
            }
        }

        Ok(())
    }
}

/// Moment a question opened, on both clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedAt {
    /// Monotonic instant used to measure response latency.
    pub instant: Instant,
    /// Wall-clock time reported to storage.
    pub wall: SystemTime,
}

/// Session-scoped question: frozen body plus per-run state.
#[derive(Debug, Clone)]
pub struct Question {
    body: QuestionBody,
    opened_at: Option<OpenedAt>,
    result: Option<QuestionResult>,
}

impl Question {
    fn new(body: QuestionBody) -> Self {
        Self {
            body,
            opened_at: None,
            result: None,
        }
    }

    /// Frozen question content.
    pub fn body(&self) -> &QuestionBody {
        &self.body
    }

    /// When the question opened, if it has.
    pub fn opened_at(&self) -> Option<OpenedAt> {
        self.opened_at
    }

    /// Stored result, present once the question has been closed.
    pub fn result(&self) -> Option<&QuestionResult> {
        self.result.as_ref()
    }
}

/// Pending answer of a player for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Selected answer ids, without duplicates.
    pub answer_ids: Vec<AnswerId>,
    /// Milliseconds between the question opening and the submission.
    pub latency_ms: u64,
}

/// Guest taking part in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    id: PlayerId,
    name: String,
    score: f64,
    submission: Option<Submission>,
    at_question: usize,
}

impl Player {
    fn new(id: PlayerId, name: String, at_question: usize) -> Self {
        Self {
            id,
            name,
            score: 0.0,
            submission: None,
            at_question,
        }
    }

    /// Player identifier.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Display name, unique within the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sum of the points awarded so far.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Answer submitted for the current question, if any.
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    /// Question position shown to the player.
    pub fn at_question(&self) -> usize {
        self.at_question
    }
}

/// The single outstanding timer of a session, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTimer {
    /// No timer armed.
    #[default]
    Idle,
    /// Countdown before the current question opens.
    Countdown(TimerHandle),
    /// Current question duration.
    Open(TimerHandle),
}

impl ActiveTimer {
    fn take(&mut self) -> Option<TimerHandle> {
        match std::mem::take(self) {
            ActiveTimer::Idle => None,
            ActiveTimer::Countdown(handle) | ActiveTimer::Open(handle) => Some(handle),
        }
    }

    fn matches(&self, kind: TimerKind, handle: TimerHandle) -> bool {
        match (self, kind) {
            (ActiveTimer::Countdown(current), TimerKind::Countdown)
            | (ActiveTimer::Open(current), TimerKind::Open) => *current == handle,
            _ => false,
        }
    }
}

/// One live run of a quiz.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    quiz_id: Uuid,
    quiz_name: String,
    machine: SessionStateMachine,
    at_question: usize,
    questions: Vec<Question>,
    players: IndexMap<PlayerId, Player>,
    timer: ActiveTimer,
    auto_start_num: usize,
    countdown: Duration,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl Session {
    /// Freeze `quiz` into a new session waiting in the lobby.
    pub fn new(
        id: SessionId,
        quiz: QuizDefinition,
        auto_start_num: usize,
        countdown: Duration,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            quiz_id: quiz.quiz_id,
            quiz_name: quiz.name,
            machine: SessionStateMachine::new(),
            at_question: 0,
            questions: quiz.questions.into_iter().map(Question::new).collect(),
            players: IndexMap::new(),
            timer: ActiveTimer::Idle,
            auto_start_num,
            countdown,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a session from its stored snapshot.
    ///
    /// No timer is armed and pending submissions are not part of snapshots.
    pub fn restore(snapshot: SessionEntity, countdown: Duration) -> Self {
        let questions = snapshot
            .questions
            .into_iter()
            .map(|question| Question {
                body: QuestionBody {
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
                },
                opened_at: question.opened_at.map(|wall| OpenedAt {
                    instant: instant_of(wall),
                    wall,
                }),
                result: question.result,
            })
            .collect();

        let players = snapshot
            .players
            .into_iter()
            .map(|player| {
                let mut restored = Player::new(player.id, player.name, player.at_question);
                restored.score = player.score;
                (player.id, restored)
            })
            .collect();

        Self {
            id: snapshot.id,
            quiz_id: snapshot.quiz_id,
            quiz_name: snapshot.quiz_name,
            machine: SessionStateMachine::restore(snapshot.state, snapshot.version),
            at_question: snapshot.at_question,
            questions,
            players,
            timer: ActiveTimer::Idle,
            auto_start_num: snapshot.auto_start_num,
            countdown,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Identifier of the quiz this session was started from.
    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    /// Name of the quiz this session was started from.
    pub fn quiz_name(&self) -> &str {
        &self.quiz_name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.machine.version()
    }

    /// 1-based position of the current question, 0 before the first one.
    pub fn at_question(&self) -> usize {
        self.at_question
    }

    /// Frozen questions with their per-run state.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of players in the session.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Look a player up by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Outstanding timer, if any.
    pub fn active_timer(&self) -> ActiveTimer {
        self.timer
    }

    /// Player count that triggers the first question automatically (0 disables it).
    pub fn auto_start_num(&self) -> usize {
        self.auto_start_num
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time of the last mutation.
    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    /// Question currently addressed by the index, if the session has started.
    pub fn current_question(&self) -> Option<&Question> {
        self.at_question
            .checked_sub(1)
            .and_then(|index| self.questions.get(index))
    }

    fn progress(&self) -> Progress {
        Progress {
            at_question: self.at_question,
            total: self.questions.len(),
        }
    }

    /// Validate `event` against the transition table, apply it and run its effects.
    ///
    /// `arm` schedules a timer and returns its handle; `cancel` cancels one.
    /// Fails without touching the session when the event is illegal.
    pub fn dispatch<A, C>(
        &mut self,
        event: SessionEvent,
        now: Instant,
        mut arm: A,
        mut cancel: C,
    ) -> Result<Transition, SessionError>
    where
        A: FnMut(TimerRequest) -> TimerHandle,
        C: FnMut(TimerHandle),
    {
        let transition = self.machine.fire(event, self.progress())?;

        for effect in &transition.effects {
            match effect {
                Effect::AdvanceQuestion => {
                    self.at_question += 1;
                    for player in self.players.values_mut() {
                        player.at_question = self.at_question;
                    }
                }
                Effect::ScheduleCountdown => {
                    if let Some(stale) = self.timer.take() {
                        cancel(stale);
                    }
                    let handle = arm(TimerRequest {
                        kind: TimerKind::Countdown,
                        delay: self.countdown,
                        at_question: self.at_question,
                    });
                    self.timer = ActiveTimer::Countdown(handle);
                }
                Effect::OpenQuestion => {
                    if let Some(index) = self.at_question.checked_sub(1) {
                        if let Some(question) = self.questions.get_mut(index) {
                            question.opened_at = Some(OpenedAt {
                                instant: now,
                                wall: SystemTime::now(),
                            });
                        }
                    }
                }
                Effect::ScheduleOpenTimer => {
                    if let Some(stale) = self.timer.take() {
                        cancel(stale);
                    }
                    let delay = self
                        .current_question()
                        .map(|question| question.body.duration)
                        .unwrap_or_default();
                    let handle = arm(TimerRequest {
                        kind: TimerKind::Open,
                        delay,
                        at_question: self.at_question,
                    });
                    self.timer = ActiveTimer::Open(handle);
                }
                Effect::CancelTimers => {
                    if let Some(handle) = self.timer.take() {
                        cancel(handle);
                    }
                }
                Effect::CloseQuestion => {
                    self.close_question();
                }
            }
        }

        self.updated_at = SystemTime::now();
        Ok(transition)
    }

    /// Clear the outstanding timer if it is the one that just fired.
    ///
    /// Returns `false` when the firing is stale: another timer replaced it,
    /// it was cancelled, the session moved on, or it targets another question.
    pub fn release_timer(&mut self, kind: TimerKind, handle: TimerHandle, at_question: usize) -> bool {
        let expected_state = match kind {
            TimerKind::Countdown => SessionState::QuestionCountdown,
            TimerKind::Open => SessionState::QuestionOpen,
        };

        if self.state() != expected_state
            || self.at_question != at_question
            || !self.timer.matches(kind, handle)
        {
            return false;
        }

        self.timer = ActiveTimer::Idle;
        true
    }

    /// Score the current question once. Later calls for the same question do nothing.
    ///
    /// Returns whether a result was written.
    pub fn close_question(&mut self) -> bool {
        let Some(index) = self.at_question.checked_sub(1) else {
            return false;
        };
        let Some(question) = self.questions.get(index) else {
            return false;
        };
        if question.result.is_some() {
            return false;
        }

        let result = scoring::score_question(&question.body, self.players.values());
        for award in &result.player_ranking {
            if let Some(player) = self.players.get_mut(&award.player_id) {
                player.score += award.points;
            }
        }
        self.questions[index].result = Some(result);

        for player in self.players.values_mut() {
            player.submission = None;
        }

        true
    }

    /// Record `player_id`'s answer to the question at `position`, replacing any earlier one.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        position: usize,
        answer_ids: &[AnswerId],
        now: Instant,
    ) -> Result<(), SessionError> {
        if !self.players.contains_key(&player_id) {
            return Err(SessionError::NotFound(format!(
                "player {player_id} is not part of session {}",
                self.id
            )));
        }

        if position == 0 || position < self.at_question || position > self.questions.len() {
            return Err(SessionError::Validation(format!(
                "question position {position} is not valid for session {}",
                self.id
            )));
        }

        if answer_ids.is_empty() {
            return Err(SessionError::Validation(
                "at least one answer must be selected".into(),
            ));
        }

        let mut unique = HashSet::with_capacity(answer_ids.len());
        if let Some(dup) = answer_ids.iter().find(|id| !unique.insert(**id)) {
            return Err(SessionError::Validation(format!(
                "answer id {dup} was selected more than once"
            )));
        }

        if position != self.at_question {
            return Err(SessionError::IllegalState {
                state: self.state(),
                reason: format!(
                    "session is on question {}, not {position}",
                    self.at_question
                ),
            });
        }

        if self.state() != SessionState::QuestionOpen {
            return Err(SessionError::IllegalState {
                state: self.state(),
                reason: "answers are only accepted while the question is open".into(),
            });
        }

        let question = &self.questions[position - 1];
        if let Some(unknown) = answer_ids.iter().find(|id| !question.body.has_answer(**id)) {
            return Err(SessionError::Validation(format!(
                "answer id {unknown} does not belong to question {position}"
            )));
        }

        let opened_at = question.opened_at.ok_or_else(|| SessionError::IllegalState {
            state: self.state(),
            reason: "question has not been opened".into(),
        })?;
        let latency_ms = u64::try_from(now.saturating_duration_since(opened_at.instant).as_millis())
            .unwrap_or(u64::MAX);

        if let Some(player) = self.players.get_mut(&player_id) {
            player.submission = Some(Submission {
                answer_ids: answer_ids.to_vec(),
                latency_ms,
            });
        }
        self.updated_at = SystemTime::now();

        Ok(())
    }

    /// Add a guest under `requested` name, generating one when it is blank.
    ///
    /// Returns the name the player ended up with.
    pub fn join<R: Rng + ?Sized>(
        &mut self,
        player_id: PlayerId,
        requested: &str,
        rng: &mut R,
    ) -> Result<String, SessionError> {
        if self.state() != SessionState::Lobby {
            return Err(SessionError::IllegalState {
                state: self.state(),
                reason: "players can only join while the session is in the lobby".into(),
            });
        }

        let requested = requested.trim();
        let name = if requested.is_empty() {
            names::generate_unique(rng, |candidate| self.has_player_named(candidate))
        } else if self.has_player_named(requested) {
            return Err(SessionError::Validation(format!(
                "name `{requested}` is already taken in this session"
            )));
        } else {
            requested.to_string()
        };

        self.players.insert(
            player_id,
            Player::new(player_id, name.clone(), self.at_question),
        );
        self.updated_at = SystemTime::now();
        Ok(name)
    }

    /// Whether enough players joined for the first question to start on its own.
    pub fn auto_start_due(&self) -> bool {
        self.auto_start_num > 0
            && self.state() == SessionState::Lobby
            && self.players.len() >= self.auto_start_num
    }

    fn has_player_named(&self, name: &str) -> bool {
        self.players.values().any(|player| player.name == name)
    }
}

/// Monotonic instant matching a past wall-clock time, clamped to now.
fn instant_of(wall: SystemTime) -> Instant {
    let now = Instant::now();
    SystemTime::now()
        .duration_since(wall)
        .ok()
        .and_then(|elapsed| now.checked_sub(elapsed))
        .unwrap_or(now)
}
