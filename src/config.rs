//! Application-level configuration loading.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZLIVE_BACK_CONFIG_PATH";

const DEFAULT_COUNTDOWN_MS: u64 = 3_000;
const DEFAULT_MAX_AUTO_START_NUM: usize = 50;
const DEFAULT_MAX_ACTIVE_SESSIONS_PER_QUIZ: usize = 10;
const DEFAULT_SSE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Delay between `NEXT_QUESTION` and the question opening.
    pub countdown: Duration,
    /// Upper bound accepted for a session's auto-start player count.
    pub max_auto_start_num: usize,
    /// Number of non-ended sessions a single quiz may have at once.
    pub max_active_sessions_per_quiz: usize,
    /// Capacity of the public SSE broadcast channel.
    pub sse_capacity: usize,
    /// Shared secret expected in `x-admin-token`; `None` disables the check.
    pub admin_token: Option<String>,
    /// Directory of the JSON session store; `None` keeps sessions in memory.
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        countdown_ms = app_config.countdown.as_millis() as u64,
                        persistent = app_config.data_dir.is_some(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    countdown_ms: u64,
    max_auto_start_num: usize,
    max_active_sessions_per_quiz: usize,
    sse_capacity: usize,
    admin_token: Option<String>,
    data_dir: Option<PathBuf>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            max_auto_start_num: DEFAULT_MAX_AUTO_START_NUM,
            max_active_sessions_per_quiz: DEFAULT_MAX_ACTIVE_SESSIONS_PER_QUIZ,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            admin_token: None,
            data_dir: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            countdown: Duration::from_millis(value.countdown_ms),
            max_auto_start_num: value.max_auto_start_num,
            max_active_sessions_per_quiz: value.max_active_sessions_per_quiz,
            // A zero-capacity broadcast channel panics on creation.
            sse_capacity: value.sse_capacity.max(1),
            admin_token: value.admin_token.filter(|token| !token.is_empty()),
            data_dir: value.data_dir,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
