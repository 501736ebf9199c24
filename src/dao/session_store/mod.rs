//! Persistence of session snapshots.

mod file;
mod memory;

pub use file::{FileSessionStore, FileStoreError};
pub use memory::InMemorySessionStore;

use futures::future::BoxFuture;

use crate::dao::{
    models::{SessionEntity, SessionListItemEntity},
    storage::StorageResult,
};
use crate::state::session::SessionId;

/// Abstraction over where session snapshots are kept.
pub trait SessionStore: Send + Sync {
    /// Insert or replace the snapshot of `session.id`.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Snapshot of session `id`, if stored.
    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Every stored session, ordered by id.
    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>>;
    /// Remove every stored snapshot.
    fn clear(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check used by the storage supervisor and the health route.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
