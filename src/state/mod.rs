/// Generated player names.
pub mod names;
/// Live session registry and id counters.
pub mod registry;
/// Read-side result projections.
pub mod results;
/// Question scoring.
pub mod scoring;
/// Session aggregate.
pub mod session;
mod sse;
/// Lifecycle transition table.
pub mod state_machine;
/// Countdown and open timers.
pub mod timer;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{models::SessionEntity, session_store::SessionStore},
};

pub use self::registry::{SessionRegistry, SessionSlot};
pub use self::session::{Session, SessionError};
pub use self::sse::SseHub;
pub use self::state_machine::{InvalidTransition, SessionAction, SessionState};
use self::timer::{TimerScheduler, TokioTimerScheduler};

/// Application state shared by handlers and timer effects.
pub type SharedState = Arc<AppState>;

/// Central application state: live sessions, timers, persistence and the event stream.
pub struct AppState {
    config: AppConfig,
    registry: SessionRegistry,
    timers: Arc<dyn TimerScheduler>,
    store: Arc<dyn SessionStore>,
    sse: SseHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Timers run on the ambient tokio runtime.
    pub fn new(config: AppConfig, store: Arc<dyn SessionStore>) -> SharedState {
        Self::with_scheduler(config, store, Arc::new(TokioTimerScheduler::new()))
    }

    /// Same as [`AppState::new`] with an explicit timer scheduler.
    pub fn with_scheduler(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        timers: Arc<dyn TimerScheduler>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            sse: SseHub::new(config.sse_capacity),
            config,
            registry: SessionRegistry::new(),
            timers,
            store,
            degraded: degraded_tx,
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Live sessions and id counters.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Scheduler arming session timers.
    pub fn timers(&self) -> &Arc<dyn TimerScheduler> {
        &self.timers
    }

    /// Where session snapshots are written.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if changed {
            if value {
                warn!("entering degraded mode");
            } else {
                info!("leaving degraded mode");
            }
        }
    }

    /// Write a session snapshot. Failures flip degraded mode but never undo the mutation.
    pub async fn persist_session(&self, entity: SessionEntity) {
        let session_id = entity.id;
        match self.store.save_session(entity).await {
            Ok(()) => self.update_degraded(false),
            Err(err) => {
                warn!(session_id, error = %err, "failed to persist session snapshot");
                self.update_degraded(true);
            }
        }
    }
}
