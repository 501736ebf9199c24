use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::fs;

use super::SessionStore;
use crate::{
    dao::{
        models::{SessionEntity, SessionListItemEntity},
        storage::{StorageError, StorageResult},
    },
    state::session::SessionId,
};

const FILE_PREFIX: &str = "session-";
const FILE_SUFFIX: &str = ".json";

/// Failures of the JSON file store.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The data directory could not be created.
    #[error("failed to prepare data directory `{}`", path.display())]
    CreateDir {
        /// Data directory.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// A snapshot could not be written or renamed into place.
    #[error("failed to write session `{id}`")]
    Write {
        /// Session being written.
        id: SessionId,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// A snapshot file exists but could not be read.
    #[error("failed to read session `{id}`")]
    Read {
        /// Session being read.
        id: SessionId,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// A snapshot could not be serialised.
    #[error("failed to encode session `{id}`")]
    Encode {
        /// Session being written.
        id: SessionId,
        /// Serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// A snapshot file holds invalid JSON.
    #[error("failed to decode `{}`", path.display())]
    Decode {
        /// Offending file.
        path: PathBuf,
        /// Deserialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// The data directory could not be listed.
    #[error("failed to scan data directory `{}`", path.display())]
    List {
        /// Data directory.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
}

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Encode { .. } | FileStoreError::Decode { .. } => {
                StorageError::corrupted(err.to_string(), err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}

type FileResult<T> = Result<T, FileStoreError>;

/// Store writing one JSON document per session under a data directory.
#[derive(Clone)]
pub struct FileSessionStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Open (and create if needed) the data directory at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> FileResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| FileStoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            inner: Arc::new(FileInner { dir }),
        })
    }

    /// Directory holding the snapshot files.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }
}

impl FileInner {
    fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }

    async fn save(&self, session: SessionEntity) -> FileResult<()> {
        let id = session.id;
        let bytes = serde_json::to_vec_pretty(&session)
            .map_err(|source| FileStoreError::Encode { id, source })?;

        // Write-then-rename so readers never observe a half-written snapshot.
        let target = self.path_for(id);
        let staging = target.with_extension("json.tmp");
        fs::write(&staging, bytes)
            .await
            .map_err(|source| FileStoreError::Write { id, source })?;
        fs::rename(&staging, &target)
            .await
            .map_err(|source| FileStoreError::Write { id, source })?;
        Ok(())
    }

    async fn find(&self, id: SessionId) -> FileResult<Option<SessionEntity>> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FileStoreError::Read { id, source }),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| FileStoreError::Decode { path, source })
    }

    async fn session_files(&self) -> FileResult<Vec<PathBuf>> {
        let list_err = |source| FileStoreError::List {
            path: self.dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(list_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let path = entry.path();
            let is_session = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX));
            if is_session {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn list(&self) -> FileResult<Vec<SessionListItemEntity>> {
        let mut items = Vec::new();
        for path in self.session_files().await? {
            let bytes = fs::read(&path).await.map_err(|source| FileStoreError::List {
                path: path.clone(),
                source,
            })?;
            let entity: SessionEntity = serde_json::from_slice(&bytes)
                .map_err(|source| FileStoreError::Decode { path, source })?;
            items.push(SessionListItemEntity::from(&entity));
        }
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn clear(&self) -> FileResult<()> {
        for path in self.session_files().await? {
            if let Err(source) = fs::remove_file(&path).await {
                if source.kind() != ErrorKind::NotFound {
                    return Err(FileStoreError::List { path, source });
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> FileResult<()> {
        fs::metadata(&self.dir)
            .await
            .map(|_| ())
            .map_err(|source| FileStoreError::List {
                path: self.dir.clone(),
                source,
            })
    }
}

impl SessionStore for FileSessionStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.save(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.find(id).await.map_err(Into::into) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.list().await.map_err(Into::into) })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.clear().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::{
        session::{
            Session,
            tests::{answer, question, quiz},
        },
        state_machine::SessionState,
    };

    fn entity(id: SessionId) -> SessionEntity {
        let session = Session::new(
            id,
            quiz(vec![question(1, 5, vec![answer(1, true), answer(2, false)])]),
            0,
            Duration::from_secs(3),
        );
        SessionEntity::from(&session)
    }

    #[tokio::test]
    async fn save_then_find_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path().join("sessions")).await.unwrap();

        let saved = entity(7);
        store.save_session(saved.clone()).await.unwrap();

        assert_eq!(store.find_session(7).await.unwrap(), Some(saved));
        assert_eq!(store.find_session(8).await.unwrap(), None);
        assert!(store.dir().join("session-7.json").exists());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();

        store.save_session(entity(1)).await.unwrap();
        let mut ended = entity(1);
        ended.state = SessionState::End;
        store.save_session(ended).await.unwrap();

        let listed = store.list_sessions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, SessionState::End);
    }

    #[tokio::test]
    async fn list_ignores_foreign_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        for id in [3, 1, 2] {
            store.save_session(entity(id)).await.unwrap();
        }

        let ids: Vec<_> = store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        store.clear().await.unwrap();
        assert!(store.list_sessions().await.unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("session-4.json"), "{ nope").unwrap();

        let err = store.find_session(4).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn health_check_fails_when_directory_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let store = FileSessionStore::open(&path).await.unwrap();
        assert!(store.health_check().await.is_ok());

        std::fs::remove_dir_all(&path).unwrap();
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
    }
}
