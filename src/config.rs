use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Careline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "careline=info".to_string()
}

/// Get the application data directory
/// ~/Careline/ on all platforms, overridable via CARELINE_DATA_DIR.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CARELINE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Careline")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The chat model is deployment configuration, not a per-call concern.
    /// Refusing to start without it keeps model failures out of the hot path.
    #[error("No chat model configured: set CARELINE_CHAT_MODEL")]
    MissingChatModel,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Runtime configuration for the consultation core.
///
/// Built once at process start and handed to `CoreState::new`. Components
/// never read the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Base URL of the local Ollama instance.
    pub ollama_base_url: String,
    /// Chat model name (required deployment config).
    pub chat_model: String,
    /// Upper bound on a single language-model call, in seconds.
    pub llm_timeout_secs: u64,
}

impl Config {
    /// Default LLM timeout: a slow model call must not stall a conversation
    /// indefinitely.
    pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

    /// Load configuration from the environment.
    ///
    /// `CARELINE_CHAT_MODEL` is mandatory; everything else has defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chat_model = std::env::var("CARELINE_CHAT_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .ok_or(ConfigError::MissingChatModel)?;

        let ollama_base_url = std::env::var("CARELINE_OLLAMA_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        let llm_timeout_secs = match std::env::var("CARELINE_LLM_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "CARELINE_LLM_TIMEOUT_SECS".into(),
                value: raw,
            })?,
            Err(_) => Self::DEFAULT_LLM_TIMEOUT_SECS,
        };

        Ok(Self {
            database_path: app_data_dir().join("careline.db"),
            ollama_base_url,
            chat_model,
            llm_timeout_secs,
        })
    }

    /// Configuration pointing at an explicit database path (used by tests
    /// and by embedders that manage their own data directory).
    pub fn with_database_path(path: PathBuf, chat_model: &str) -> Self {
        Self {
            database_path: path,
            ollama_base_url: "http://localhost:11434".to_string(),
            chat_model: chat_model.to_string(),
            llm_timeout_secs: Self::DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}
