use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::state::{
    session::{PlayerId, Session, SessionId},
    state_machine::SessionState,
};

/// Shared handle to a live session; all mutations go through its lock.
pub type SessionSlot = Arc<Mutex<Session>>;

/// Monotonic identifier source starting at 1, with an explicit reset.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Hand out the next identifier.
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Make sure `id` is never handed out again.
    pub fn skip_past(&self, id: u64) {
        self.last.fetch_max(id, Ordering::Relaxed);
    }

    /// Restart numbering from 1.
    pub fn reset(&self) {
        self.last.store(0, Ordering::Relaxed);
    }
}

/// Summary of one registered session, used for listing without holding locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEntry {
    /// Session identifier.
    pub id: SessionId,
    /// Quiz the session was started from.
    pub quiz_id: Uuid,
    /// Lifecycle state at the time of the listing.
    pub state: SessionState,
}

/// Owner of every live session and of the session and player id counters.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionSlot>,
    players: DashMap<PlayerId, SessionId>,
    session_ids: IdGenerator,
    player_ids: IdGenerator,
    starts: Mutex<()>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next session id.
    pub fn allocate_session_id(&self) -> SessionId {
        self.session_ids.next_id()
    }

    /// Allocate the next player id.
    pub fn allocate_player_id(&self) -> PlayerId {
        self.player_ids.next_id()
    }

    /// Register a freshly created session and return its shared slot.
    pub fn insert(&self, session: Session) -> SessionSlot {
        let id = session.id();
        let slot = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&slot));
        slot
    }

    /// Register a session rebuilt from storage, with its players.
    ///
    /// Id counters move past the restored ids.
    pub fn adopt(&self, session: Session) -> SessionSlot {
        self.session_ids.skip_past(session.id());
        for player in session.players() {
            self.player_ids.skip_past(player.id());
            self.players.insert(player.id(), session.id());
        }
        self.insert(session)
    }

    /// Serialize session starts so per-quiz limits are checked and enforced atomically.
    pub async fn lock_starts(&self) -> MutexGuard<'_, ()> {
        self.starts.lock().await
    }

    /// Slot of session `id`, if registered.
    pub fn get(&self, id: SessionId) -> Option<SessionSlot> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remember which session `player_id` joined.
    pub fn register_player(&self, player_id: PlayerId, session_id: SessionId) {
        self.players.insert(player_id, session_id);
    }

    /// Session `player_id` belongs to, if any.
    pub fn session_of_player(&self, player_id: PlayerId) -> Option<SessionId> {
        self.players.get(&player_id).map(|entry| *entry.value())
    }

    /// Every registered slot ordered by session id.
    pub fn slots(&self) -> Vec<(SessionId, SessionSlot)> {
        let mut slots: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        slots.sort_by_key(|(id, _)| *id);
        slots
    }

    /// Snapshot of every registered session, ordered by id.
    pub async fn entries(&self) -> Vec<SessionEntry> {
        let mut entries = Vec::with_capacity(self.sessions.len());
        for (id, slot) in self.slots() {
            let session = slot.lock().await;
            entries.push(SessionEntry {
                id,
                quiz_id: session.quiz_id(),
                state: session.state(),
            });
        }
        entries
    }

    /// Number of sessions of `quiz_id` that have not ended.
    pub async fn active_for_quiz(&self, quiz_id: Uuid) -> usize {
        self.entries()
            .await
            .into_iter()
            .filter(|entry| entry.quiz_id == quiz_id && entry.state != SessionState::End)
            .count()
    }

    /// Drop every session and player and restart both id counters.
    pub fn clear(&self) {
        self.sessions.clear();
        self.players.clear();
        self.session_ids.reset();
        self.player_ids.reset();
    }
}
