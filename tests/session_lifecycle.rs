//! End-to-end session scenarios driven through the service layer with paused tokio time.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::time::sleep;
use uuid::Uuid;

use quizlive_back::{
    config::AppConfig,
    dao::{
        models::{SessionEntity, SessionListItemEntity},
        session_store::{InMemorySessionStore, SessionStore},
        storage::{StorageError, StorageResult},
    },
    dto::{
        admin::{AnswerInput, QuestionInput, StartSessionRequest},
        player::{JoinRequest, SubmitAnswerRequest},
    },
    error::ServiceError,
    services::{player_service, results_service, session_service},
    state::{
        AppState, SessionAction, SessionState, SharedState, session::SessionId,
        timer::TimerScheduler,
    },
};

const COUNTDOWN: Duration = Duration::from_secs(3);
const QUESTION_DURATION: Duration = Duration::from_secs(10);
const STEP: Duration = Duration::from_millis(1);

fn config() -> AppConfig {
    AppConfig {
        countdown: COUNTDOWN,
        ..AppConfig::default()
    }
}

fn state_with_store(store: Arc<dyn SessionStore>) -> SharedState {
    AppState::new(config(), store)
}

fn memory_state() -> (SharedState, InMemorySessionStore) {
    let store = InMemorySessionStore::new();
    (state_with_store(Arc::new(store.clone())), store)
}

/// Two questions: Q1 worth 5 with answer 1 correct, Q2 worth 4 with answers 3 and 4 correct.
fn quiz_request(quiz_id: Uuid, auto_start_num: usize) -> StartSessionRequest {
    let answer = |id: u64, correct: bool| AnswerInput {
        id,
        text: format!("answer {id}"),
        correct,
    };
    StartSessionRequest {
        quiz_id,
        name: "Trivia night".into(),
        questions: vec![
            QuestionInput {
                id: 100,
                text: "First?".into(),
                duration_ms: QUESTION_DURATION.as_millis() as u64,
                points: 5,
                answers: vec![answer(1, true), answer(2, false)],
            },
            QuestionInput {
                id: 200,
                text: "Second?".into(),
                duration_ms: QUESTION_DURATION.as_millis() as u64,
                points: 4,
                answers: vec![answer(3, true), answer(4, true), answer(5, false)],
            },
        ],
        auto_start_num,
    }
}

async fn start(state: &SharedState) -> SessionId {
    session_service::start_session(state, quiz_request(Uuid::new_v4(), 0))
        .await
        .unwrap()
        .session_id
}

async fn join(state: &SharedState, session_id: SessionId, name: &str) -> u64 {
    player_service::join(
        state,
        JoinRequest {
            session_id,
            name: name.into(),
        },
    )
    .await
    .unwrap()
    .player_id
}

async fn act(state: &SharedState, session_id: SessionId, action: SessionAction) -> SessionState {
    session_service::dispatch_action(state, session_id, action)
        .await
        .unwrap()
        .state
}

async fn current_state(state: &SharedState, session_id: SessionId) -> SessionState {
    session_service::session_status(state, session_id)
        .await
        .unwrap()
        .state
}

async fn answer(state: &SharedState, player_id: u64, position: usize, ids: &[u64]) {
    player_service::submit_answer(
        state,
        player_id,
        position,
        SubmitAnswerRequest {
            answer_ids: ids.to_vec(),
        },
    )
    .await
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn timers_drive_a_full_session() {
    let (state, _) = memory_state();
    let session_id = start(&state).await;
    let ada = join(&state, session_id, "Ada").await;
    let grace = join(&state, session_id, "Grace").await;

    assert_eq!(
        act(&state, session_id, SessionAction::NextQuestion).await,
        SessionState::QuestionCountdown
    );
    assert_eq!(state.timers().outstanding(), 1);

    sleep(COUNTDOWN - STEP).await;
    assert_eq!(current_state(&state, session_id).await, SessionState::QuestionCountdown);
    sleep(STEP * 2).await;
    assert_eq!(current_state(&state, session_id).await, SessionState::QuestionOpen);
    assert_eq!(state.timers().outstanding(), 1);

    sleep(Duration::from_millis(999)).await;
    answer(&state, ada, 1, &[1]).await;
    sleep(Duration::from_millis(1_000)).await;
    answer(&state, grace, 1, &[1]).await;

    sleep(QUESTION_DURATION).await;
    assert_eq!(current_state(&state, session_id).await, SessionState::QuestionClose);
    assert_eq!(state.timers().outstanding(), 0);

    assert_eq!(
        act(&state, session_id, SessionAction::GoToAnswer).await,
        SessionState::AnswerShow
    );
    let result = results_service::question_results(&state, session_id)
        .await
        .unwrap();
    let awards: Vec<(u64, f64)> = result
        .player_ranking
        .iter()
        .map(|award| (award.player_id, award.points))
        .collect();
    assert_eq!(awards, vec![(ada, 5.0), (grace, 2.5)]);
    assert_eq!(result.percent_correct, 100.0);
    assert_eq!(result.average_answer_time_ms, 1_500.0);

    act(&state, session_id, SessionAction::NextQuestion).await;
    act(&state, session_id, SessionAction::SkipCountdown).await;
    answer(&state, grace, 2, &[3, 4, 5]).await;
    assert_eq!(
        act(&state, session_id, SessionAction::GoToAnswer).await,
        SessionState::AnswerShow
    );

    assert_eq!(
        act(&state, session_id, SessionAction::NextQuestion).await,
        SessionState::FinalResults
    );
    assert_eq!(state.timers().outstanding(), 0);

    let finals = results_service::final_results(&state, session_id)
        .await
        .unwrap();
    let standings: Vec<(u64, f64)> = finals
        .players_ranked
        .iter()
        .map(|standing| (standing.player_id, standing.score))
        .collect();
    assert_eq!(standings, vec![(grace, 6.5), (ada, 5.0)]);
    assert_eq!(finals.question_results.len(), 2);

    let player_view = player_service::final_results(&state, ada).await.unwrap();
    assert_eq!(player_view, finals);

    assert_eq!(
        act(&state, session_id, SessionAction::End).await,
        SessionState::End
    );
}

#[tokio::test(start_paused = true)]
async fn early_reveal_makes_the_open_timer_a_no_op() {
    let (state, _) = memory_state();
    let session_id = start(&state).await;
    let ada = join(&state, session_id, "Ada").await;

    act(&state, session_id, SessionAction::NextQuestion).await;
    act(&state, session_id, SessionAction::SkipCountdown).await;
    sleep(Duration::from_millis(400)).await;
    answer(&state, ada, 1, &[1]).await;

    act(&state, session_id, SessionAction::GoToAnswer).await;
    assert_eq!(state.timers().outstanding(), 0);
    let before = results_service::question_results(&state, session_id)
        .await
        .unwrap();

    sleep(QUESTION_DURATION * 2).await;

    assert_eq!(current_state(&state, session_id).await, SessionState::AnswerShow);
    let after = results_service::question_results(&state, session_id)
        .await
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(before.player_ranking[0].points, 5.0);
}

#[tokio::test(start_paused = true)]
async fn end_cancels_timers_in_every_running_state() {
    for stop_after in [
        vec![],
        vec![SessionAction::NextQuestion],
        vec![SessionAction::NextQuestion, SessionAction::SkipCountdown],
    ] {
        let (state, _) = memory_state();
        let session_id = start(&state).await;
        for action in stop_after {
            act(&state, session_id, action).await;
        }

        assert_eq!(
            act(&state, session_id, SessionAction::End).await,
            SessionState::End
        );
        assert_eq!(state.timers().outstanding(), 0);

        sleep(COUNTDOWN + QUESTION_DURATION * 2).await;
        assert_eq!(current_state(&state, session_id).await, SessionState::End);

        let err = session_service::dispatch_action(&state, session_id, SessionAction::End)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn illegal_actions_are_conflicts_and_leave_state_alone() {
    let (state, _) = memory_state();
    let session_id = start(&state).await;

    for action in [
        SessionAction::GoToAnswer,
        SessionAction::GoToFinalResults,
        SessionAction::SkipCountdown,
    ] {
        let err = session_service::dispatch_action(&state, session_id, action)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
    let status = session_service::session_status(&state, session_id)
        .await
        .unwrap();
    assert_eq!(status.state, SessionState::Lobby);
    assert_eq!(status.version, 0);

    let err = session_service::dispatch_action(&state, 999, SessionAction::End)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn reaching_auto_start_count_starts_the_countdown() {
    let (state, _) = memory_state();
    let session_id = session_service::start_session(&state, quiz_request(Uuid::new_v4(), 2))
        .await
        .unwrap()
        .session_id;

    join(&state, session_id, "Ada").await;
    assert_eq!(current_state(&state, session_id).await, SessionState::Lobby);
    join(&state, session_id, "").await;
    assert_eq!(
        current_state(&state, session_id).await,
        SessionState::QuestionCountdown
    );

    let late = player_service::join(
        &state,
        JoinRequest {
            session_id,
            name: "Late".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(late, ServiceError::InvalidState(_)));

    sleep(COUNTDOWN + STEP).await;
    assert_eq!(current_state(&state, session_id).await, SessionState::QuestionOpen);
}

#[tokio::test]
async fn start_session_enforces_limits() {
    let (state, _) = memory_state();

    let err = session_service::start_session(&state, quiz_request(Uuid::new_v4(), 51))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let mut no_correct = quiz_request(Uuid::new_v4(), 0);
    for answer in &mut no_correct.questions[0].answers {
        answer.correct = false;
    }
    let err = session_service::start_session(&state, no_correct)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let quiz_id = Uuid::new_v4();
    for _ in 0..10 {
        session_service::start_session(&state, quiz_request(quiz_id, 0))
            .await
            .unwrap();
    }
    let err = session_service::start_session(&state, quiz_request(quiz_id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    session_service::dispatch_action(&state, 1, SessionAction::End)
        .await
        .unwrap();
    session_service::start_session(&state, quiz_request(quiz_id, 0))
        .await
        .unwrap();
}

#[tokio::test]
async fn listing_splits_active_and_ended_sessions() {
    let (state, _) = memory_state();
    let quiz_id = Uuid::new_v4();
    for _ in 0..3 {
        session_service::start_session(&state, quiz_request(quiz_id, 0))
            .await
            .unwrap();
    }
    let other = start(&state).await;
    act(&state, 2, SessionAction::End).await;

    let listing = session_service::list_sessions(&state, Some(quiz_id)).await;
    assert_eq!(listing.active_sessions, vec![1, 3]);
    assert_eq!(listing.inactive_sessions, vec![2]);

    let all = session_service::list_sessions(&state, None).await;
    assert_eq!(all.active_sessions, vec![1, 3, other]);
}

#[tokio::test(start_paused = true)]
async fn reset_ends_everything_and_restarts_ids() {
    let (state, store) = memory_state();
    let first = start(&state).await;
    let ada = join(&state, first, "Ada").await;
    act(&state, first, SessionAction::NextQuestion).await;
    start(&state).await;

    let response = session_service::reset(&state).await;
    assert_eq!(response.ended_sessions, 2);
    assert_eq!(state.timers().outstanding(), 0);
    assert!(store.list_sessions().await.unwrap().is_empty());

    let err = player_service::status(&state, ada).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    assert_eq!(start(&state).await, 1);
    sleep(COUNTDOWN * 2).await;
    assert_eq!(current_state(&state, 1).await, SessionState::Lobby);
}

#[tokio::test(start_paused = true)]
async fn snapshots_follow_every_transition() {
    let (state, store) = memory_state();
    let session_id = start(&state).await;
    let ada = join(&state, session_id, "Ada").await;

    act(&state, session_id, SessionAction::NextQuestion).await;
    sleep(COUNTDOWN + STEP).await;

    let stored = store.find_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionState::QuestionOpen);
    assert_eq!(stored.at_question, 1);
    assert!(stored.questions[0].opened_at.is_some());

    answer(&state, ada, 1, &[1]).await;
    sleep(QUESTION_DURATION).await;

    let stored = store.find_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionState::QuestionClose);
    assert!(stored.questions[0].result.is_some());
    assert_eq!(stored.players[0].score, 5.0);
    assert!(!state.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn player_queries_follow_the_displayed_question() {
    let (state, _) = memory_state();
    let session_id = start(&state).await;
    let ada = join(&state, session_id, "Ada").await;

    let status = player_service::status(&state, ada).await.unwrap();
    assert_eq!(status.state, SessionState::Lobby);
    assert_eq!(status.num_questions, 2);
    assert_eq!(status.at_question, 0);

    act(&state, session_id, SessionAction::NextQuestion).await;
    assert!(matches!(
        player_service::question_info(&state, ada, 1).await,
        Err(ServiceError::InvalidState(_))
    ));

    act(&state, session_id, SessionAction::SkipCountdown).await;
    let info = player_service::question_info(&state, ada, 1).await.unwrap();
    assert_eq!(info.question_id, 100);
    assert_eq!(info.answers.len(), 2);

    let empty = player_service::submit_answer(
        &state,
        ada,
        1,
        SubmitAnswerRequest { answer_ids: vec![] },
    )
    .await
    .unwrap_err();
    assert!(matches!(empty, ServiceError::InvalidInput(_)));

    let ahead = player_service::submit_answer(
        &state,
        ada,
        2,
        SubmitAnswerRequest { answer_ids: vec![3] },
    )
    .await
    .unwrap_err();
    assert!(matches!(ahead, ServiceError::InvalidState(_)));

    assert!(matches!(
        player_service::question_results(&state, ada, 1).await,
        Err(ServiceError::InvalidState(_))
    ));
    act(&state, session_id, SessionAction::GoToAnswer).await;
    let result = player_service::question_results(&state, ada, 1)
        .await
        .unwrap();
    assert_eq!(result.question_id, 100);

    assert!(matches!(
        player_service::status(&state, 12345).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_names_are_rejected_and_blank_names_generated() {
    let (state, _) = memory_state();
    let session_id = start(&state).await;
    join(&state, session_id, "Ada").await;

    let err = player_service::join(
        &state,
        JoinRequest {
            session_id,
            name: " Ada ".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let generated = player_service::join(
        &state,
        JoinRequest {
            session_id,
            name: "   ".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(generated.name.len(), 8);

    let err = player_service::join(
        &state,
        JoinRequest {
            session_id: 77,
            name: "Ghost".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn transitions_are_broadcast_on_the_public_stream() {
    let (state, _) = memory_state();
    let mut events = state.public_sse().subscribe();
    let session_id = start(&state).await;
    join(&state, session_id, "Ada").await;
    act(&state, session_id, SessionAction::NextQuestion).await;
    sleep(COUNTDOWN + STEP).await;
    act(&state, session_id, SessionAction::GoToAnswer).await;

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.event.unwrap_or_default());
    }
    assert_eq!(
        names,
        vec![
            "session.player_joined",
            "session.state_changed",
            "session.state_changed",
            "session.state_changed",
            "session.question_closed",
        ]
    );
}

/// Store whose writes always fail.
struct BrokenStore;

impl SessionStore for BrokenStore {
    fn save_session(&self, _session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async {
            Err(StorageError::unavailable(
                "disk full".into(),
                std::io::Error::other("no space left"),
            ))
        })
    }

    fn find_session(&self, _id: SessionId) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        Box::pin(async { Ok(None) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test(start_paused = true)]
async fn persistence_failures_degrade_without_rolling_back() {
    let state = state_with_store(Arc::new(BrokenStore));
    let session_id = start(&state).await;
    assert!(state.is_degraded());

    assert_eq!(
        act(&state, session_id, SessionAction::NextQuestion).await,
        SessionState::QuestionCountdown
    );
    sleep(COUNTDOWN + STEP).await;
    assert_eq!(current_state(&state, session_id).await, SessionState::QuestionOpen);
    assert!(state.is_degraded());
}

const SLOW_WRITE: Duration = Duration::from_millis(50);

/// In-memory store that takes a while to write `QUESTION_CLOSE` snapshots.
struct SlowCloseStore {
    inner: InMemorySessionStore,
}

impl SessionStore for SlowCloseStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let slow = session.state == SessionState::QuestionClose;
        let write = self.inner.save_session(session);
        Box::pin(async move {
            if slow {
                sleep(SLOW_WRITE).await;
            }
            write.await
        })
    }

    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        self.inner.find_session(id)
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        self.inner.list_sessions()
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.clear()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

#[tokio::test(start_paused = true)]
async fn slow_snapshot_writes_cannot_overwrite_newer_ones() {
    let store = InMemorySessionStore::new();
    let state = state_with_store(Arc::new(SlowCloseStore {
        inner: store.clone(),
    }));
    let session_id = start(&state).await;
    join(&state, session_id, "Ada").await;
    act(&state, session_id, SessionAction::NextQuestion).await;
    act(&state, session_id, SessionAction::SkipCountdown).await;

    // The open timer closes the question and starts a slow write.
    sleep(QUESTION_DURATION + STEP).await;
    assert_eq!(
        act(&state, session_id, SessionAction::GoToAnswer).await,
        SessionState::AnswerShow
    );
    sleep(SLOW_WRITE * 2).await;

    let live = session_service::session_status(&state, session_id)
        .await
        .unwrap();
    let stored = store.find_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.state, SessionState::AnswerShow);
    assert_eq!(stored.version, live.version);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_respect_the_per_quiz_limit() {
    let (state, _) = memory_state();
    let quiz_id = Uuid::new_v4();
    let limit = state.config().max_active_sessions_per_quiz;

    let attempts: Vec<_> = (0..limit + 5)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                session_service::start_session(&state, quiz_request(quiz_id, 0)).await
            })
        })
        .collect();

    let (mut started, mut refused) = (0, 0);
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => started += 1,
            Err(ServiceError::InvalidInput(_)) => refused += 1,
            Err(err) => panic!("unexpected start failure: {err}"),
        }
    }

    assert_eq!(started, limit);
    assert_eq!(refused, 5);
    let listing = session_service::list_sessions(&state, Some(quiz_id)).await;
    assert_eq!(listing.active_sessions.len(), limit);
}

#[tokio::test(start_paused = true)]
async fn stored_sessions_survive_a_restart() {
    let (before, store) = memory_state();
    let shown = start(&before).await;
    let ada = join(&before, shown, "Ada").await;
    act(&before, shown, SessionAction::NextQuestion).await;
    act(&before, shown, SessionAction::SkipCountdown).await;
    answer(&before, ada, 1, &[1]).await;
    act(&before, shown, SessionAction::GoToAnswer).await;
    let shown_version = session_service::session_status(&before, shown)
        .await
        .unwrap()
        .version;

    let interrupted = start(&before).await;
    let grace = join(&before, interrupted, "Grace").await;
    act(&before, interrupted, SessionAction::NextQuestion).await;
    // The old process goes away with its countdown still armed.
    before.registry().clear();

    let after = state_with_store(Arc::new(store.clone()));
    assert_eq!(session_service::restore_sessions(&after).await.unwrap(), 2);

    let status = session_service::session_status(&after, shown).await.unwrap();
    assert_eq!(status.state, SessionState::AnswerShow);
    assert_eq!(status.version, shown_version);
    assert_eq!(status.players, vec!["Ada".to_string()]);
    assert_eq!(current_state(&after, interrupted).await, SessionState::End);
    assert_eq!(
        store.find_session(interrupted).await.unwrap().unwrap().state,
        SessionState::End
    );
    assert_eq!(after.timers().outstanding(), 0);

    let ada_view = player_service::status(&after, ada).await.unwrap();
    assert_eq!(ada_view.state, SessionState::AnswerShow);
    assert_eq!(
        act(&after, shown, SessionAction::NextQuestion).await,
        SessionState::QuestionCountdown
    );

    let next = start(&after).await;
    assert_eq!(next, interrupted + 1);
    assert!(join(&after, next, "Linus").await > grace);
}
