/// Persisted session snapshots.
pub mod models;
/// Session store trait and its backends.
pub mod session_store;
/// Backend-independent storage errors.
pub mod storage;
