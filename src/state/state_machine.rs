use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle states a quiz session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Players are joining; no question has been shown yet.
    Lobby,
    /// A question is about to open.
    QuestionCountdown,
    /// The current question accepts answers.
    QuestionOpen,
    /// The current question stopped accepting answers and has been scored.
    QuestionClose,
    /// The correct answer and per-question result are displayed.
    AnswerShow,
    /// The whole-session scoreboard is displayed.
    FinalResults,
    /// Terminal state; the session refuses every further mutation.
    End,
}

/// Commands an administrator can issue against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionAction {
    /// Move to the next question, or to the final results once all questions were played.
    NextQuestion,
    /// Open the counting-down question immediately.
    SkipCountdown,
    /// Reveal the answer of the current question, closing it first if still open.
    GoToAnswer,
    /// Show the final scoreboard.
    GoToFinalResults,
    /// Terminate the session.
    End,
}

/// Events that can be applied to a session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Administrator command.
    Action(SessionAction),
    /// The countdown timer of the current question elapsed.
    CountdownElapsed,
    /// The open timer of the current question elapsed.
    QuestionTimeUp,
}

impl From<SessionAction> for SessionEvent {
    fn from(action: SessionAction) -> Self {
        SessionEvent::Action(action)
    }
}

/// Side effects a transition asks the session to perform, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Increment the question index and every player's question pointer.
    AdvanceQuestion,
    /// Arm the countdown-to-open timer.
    ScheduleCountdown,
    /// Record the open time of the current question.
    OpenQuestion,
    /// Arm the open-to-close timer for the current question's duration.
    ScheduleOpenTimer,
    /// Cancel whichever timer is outstanding.
    CancelTimers,
    /// Score the current question (write-once).
    CloseQuestion,
}

/// Position of the session within its question sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based index of the current question, 0 before the first one.
    pub at_question: usize,
    /// Number of questions frozen into the session.
    pub total: usize,
}

impl Progress {
    fn exhausted(&self) -> bool {
        self.at_question >= self.total
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The state the session was in when the event was received.
    pub from: SessionState,
    /// The event that cannot be applied from this state.
    pub event: SessionEvent,
}

/// A validated transition and the effects the session must run for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State the session is currently in.
    pub from: SessionState,
    /// State the session will be in after the transition.
    pub to: SessionState,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Effects to run once the state has been updated.
    pub effects: Vec<Effect>,
    /// Version number after applying this transition.
    pub version_next: usize,
}

impl Transition {
    /// Whether the transition scores the current question.
    pub fn closes_question(&self) -> bool {
        self.effects.contains(&Effect::CloseQuestion)
    }
}

/// State machine implementing the fixed session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            state: SessionState::Lobby,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Rebuild a machine at a known state, e.g. from a persisted snapshot.
    pub fn restore(state: SessionState, version: usize) -> Self {
        Self { state, version }
    }

    /// Validate that `event` can be applied from the current state and compute its effects.
    pub fn plan(
        &self,
        event: SessionEvent,
        progress: Progress,
    ) -> Result<Transition, InvalidTransition> {
        let (to, effects) = compute_transition(self.state, event, progress)?;
        Ok(Transition {
            from: self.state,
            to,
            event,
            effects,
            version_next: self.version + 1,
        })
    }

    /// Plan `event` and move to the resulting state in one step.
    ///
    /// Leaves the machine untouched when the event is illegal.
    pub fn fire(
        &mut self,
        event: SessionEvent,
        progress: Progress,
    ) -> Result<Transition, InvalidTransition> {
        let transition = self.plan(event, progress)?;
        self.state = transition.to;
        self.version = transition.version_next;
        Ok(transition)
    }
}

fn compute_transition(
    from: SessionState,
    event: SessionEvent,
    progress: Progress,
) -> Result<(SessionState, Vec<Effect>), InvalidTransition> {
    use SessionAction as A;
    use SessionState as S;

    let next = match (from, event) {
        (
            S::Lobby | S::AnswerShow | S::QuestionClose,
            SessionEvent::Action(A::NextQuestion),
        ) => {
            if progress.exhausted() {
                (S::FinalResults, vec![])
            } else {
                (
                    S::QuestionCountdown,
                    vec![Effect::AdvanceQuestion, Effect::ScheduleCountdown],
                )
            }
        }
        (S::QuestionCountdown, SessionEvent::Action(A::SkipCountdown)) => (
            S::QuestionOpen,
            vec![
                Effect::CancelTimers,
                Effect::OpenQuestion,
                Effect::ScheduleOpenTimer,
            ],
        ),
        (S::QuestionCountdown, SessionEvent::CountdownElapsed) => (
            S::QuestionOpen,
            vec![Effect::OpenQuestion, Effect::ScheduleOpenTimer],
        ),
        (S::QuestionOpen, SessionEvent::QuestionTimeUp) => {
            (S::QuestionClose, vec![Effect::CloseQuestion])
        }
        (S::QuestionOpen, SessionEvent::Action(A::GoToAnswer)) => (
            S::AnswerShow,
            vec![Effect::CancelTimers, Effect::CloseQuestion],
        ),
        (S::QuestionClose, SessionEvent::Action(A::GoToAnswer)) => (S::AnswerShow, vec![]),
        (S::QuestionClose | S::AnswerShow, SessionEvent::Action(A::GoToFinalResults)) => {
            (S::FinalResults, vec![])
        }
        (from, SessionEvent::Action(A::End)) if from != S::End => {
            (S::End, vec![Effect::CancelTimers])
        }
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [SessionState; 7] = [
        SessionState::Lobby,
        SessionState::QuestionCountdown,
        SessionState::QuestionOpen,
        SessionState::QuestionClose,
        SessionState::AnswerShow,
        SessionState::FinalResults,
        SessionState::End,
    ];

    fn progress(at_question: usize, total: usize) -> Progress {
        Progress { at_question, total }
    }

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent, p: Progress) -> Transition {
        sm.fire(event, p).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.state(), SessionState::Lobby);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new();

        let t = apply(&mut sm, SessionAction::NextQuestion.into(), progress(0, 2));
        assert_eq!(t.to, SessionState::QuestionCountdown);
        assert_eq!(
            t.effects,
            vec![Effect::AdvanceQuestion, Effect::ScheduleCountdown]
        );

        let t = apply(&mut sm, SessionEvent::CountdownElapsed, progress(1, 2));
        assert_eq!(t.to, SessionState::QuestionOpen);
        assert_eq!(t.effects, vec![Effect::OpenQuestion, Effect::ScheduleOpenTimer]);

        let t = apply(&mut sm, SessionEvent::QuestionTimeUp, progress(1, 2));
        assert_eq!(t.to, SessionState::QuestionClose);
        assert!(t.closes_question());

        let t = apply(&mut sm, SessionAction::GoToAnswer.into(), progress(1, 2));
        assert_eq!(t.to, SessionState::AnswerShow);
        assert!(!t.closes_question());

        apply(&mut sm, SessionAction::NextQuestion.into(), progress(1, 2));
        apply(&mut sm, SessionEvent::CountdownElapsed, progress(2, 2));
        let t = apply(&mut sm, SessionAction::GoToAnswer.into(), progress(2, 2));
        assert_eq!(t.effects, vec![Effect::CancelTimers, Effect::CloseQuestion]);

        let t = apply(&mut sm, SessionAction::GoToFinalResults.into(), progress(2, 2));
        assert_eq!(t.to, SessionState::FinalResults);

        let t = apply(&mut sm, SessionAction::End.into(), progress(2, 2));
        assert_eq!(t.to, SessionState::End);
        assert_eq!(sm.version(), 9);
    }

    #[test]
    fn next_question_when_exhausted_goes_to_final_results_without_timers() {
        let sm = SessionStateMachine::restore(SessionState::AnswerShow, 4);
        let plan = sm
            .plan(SessionAction::NextQuestion.into(), progress(3, 3))
            .unwrap();
        assert_eq!(plan.to, SessionState::FinalResults);
        assert!(plan.effects.is_empty());
    }

    #[test]
    fn skip_countdown_cancels_and_opens() {
        let sm = SessionStateMachine::restore(SessionState::QuestionCountdown, 1);
        let plan = sm
            .plan(SessionAction::SkipCountdown.into(), progress(1, 1))
            .unwrap();
        assert_eq!(plan.to, SessionState::QuestionOpen);
        assert_eq!(
            plan.effects,
            vec![
                Effect::CancelTimers,
                Effect::OpenQuestion,
                Effect::ScheduleOpenTimer
            ]
        );
    }

    #[test]
    fn end_is_legal_from_every_state_but_end() {
        for state in ALL_STATES {
            let sm = SessionStateMachine::restore(state, 0);
            let result = sm.plan(SessionAction::End.into(), progress(1, 1));
            if state == SessionState::End {
                assert!(result.is_err());
            } else {
                let plan = result.unwrap();
                assert_eq!(plan.to, SessionState::End);
                assert_eq!(plan.effects, vec![Effect::CancelTimers]);
            }
        }
    }

    #[test]
    fn end_is_absorbing() {
        let sm = SessionStateMachine::restore(SessionState::End, 3);
        let events = [
            SessionAction::NextQuestion.into(),
            SessionAction::SkipCountdown.into(),
            SessionAction::GoToAnswer.into(),
            SessionAction::GoToFinalResults.into(),
            SessionAction::End.into(),
            SessionEvent::CountdownElapsed,
            SessionEvent::QuestionTimeUp,
        ];
        for event in events {
            let err = sm.plan(event, progress(1, 2)).unwrap_err();
            assert_eq!(err.from, SessionState::End);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn timer_events_only_fire_from_their_own_state() {
        for state in ALL_STATES {
            let sm = SessionStateMachine::restore(state, 0);
            assert_eq!(
                sm.plan(SessionEvent::CountdownElapsed, progress(1, 1)).is_ok(),
                state == SessionState::QuestionCountdown
            );
            assert_eq!(
                sm.plan(SessionEvent::QuestionTimeUp, progress(1, 1)).is_ok(),
                state == SessionState::QuestionOpen
            );
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let sm = SessionStateMachine::new();
        let err = sm
            .plan(SessionAction::GoToAnswer.into(), progress(0, 1))
            .unwrap_err();
        assert_eq!(err.from, SessionState::Lobby);
        assert_eq!(err.event, SessionEvent::Action(SessionAction::GoToAnswer));

        let sm = SessionStateMachine::restore(SessionState::QuestionOpen, 2);
        assert!(
            sm.plan(SessionAction::NextQuestion.into(), progress(1, 2))
                .is_err()
        );
        assert!(
            sm.plan(SessionAction::GoToFinalResults.into(), progress(1, 2))
                .is_err()
        );
    }

    #[test]
    fn illegal_fire_leaves_machine_untouched() {
        let mut sm = SessionStateMachine::restore(SessionState::QuestionClose, 5);
        let err = sm
            .fire(SessionAction::SkipCountdown.into(), progress(1, 2))
            .unwrap_err();
        assert_eq!(err.from, SessionState::QuestionClose);
        assert_eq!(sm.state(), SessionState::QuestionClose);
        assert_eq!(sm.version(), 5);

        let t = sm
            .fire(SessionAction::GoToAnswer.into(), progress(1, 2))
            .unwrap();
        assert_eq!(t.version_next, 6);
        assert_eq!(sm.version(), 6);
    }
}
