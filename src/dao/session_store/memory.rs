use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::SessionStore;
use crate::{
    dao::{
        models::{SessionEntity, SessionListItemEntity},
        storage::StorageResult,
    },
    state::session::SessionId,
};

/// Volatile store used when no data directory is configured.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<SessionId, SessionEntity>>,
}

impl InMemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let sessions = Arc::clone(&self.sessions);
        Box::pin(async move {
            sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let sessions = Arc::clone(&self.sessions);
        Box::pin(async move { Ok(sessions.get(&id).map(|entry| entry.value().clone())) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        let sessions = Arc::clone(&self.sessions);
        Box::pin(async move {
            let mut items: Vec<SessionListItemEntity> = sessions
                .iter()
                .map(|entry| SessionListItemEntity::from(entry.value()))
                .collect();
            items.sort_by_key(|item| item.id);
            Ok(items)
        })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        let sessions = Arc::clone(&self.sessions);
        Box::pin(async move {
            sessions.clear();
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
