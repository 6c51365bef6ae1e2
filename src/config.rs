//! Configuration management for DB.Coach
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! The storage backend is chosen here and passed explicitly to
//! [`crate::storage::create_storage`]; there is no process-wide selection.

use crate::error::{DbCoachError, Result};
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for DB.Coach
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Conversation storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text generation settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Generation session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Signed-in user settings
    #[serde(default)]
    pub user: UserConfig,
}

/// Which storage backend holds conversations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded key-value store on this machine
    #[default]
    Local,
    /// Hosted PostgREST table
    Hosted,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Hosted => write!(f, "hosted"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = DbCoachError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "hosted" | "remote" | "supabase" => Ok(StorageBackend::Hosted),
            other => Err(DbCoachError::Config(format!(
                "Invalid storage backend: {}. Must be one of: local, hosted",
                other
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Active backend
    #[serde(default)]
    pub backend: StorageBackend,

    /// Local backend settings
    #[serde(default)]
    pub local: LocalStorageConfig,

    /// Hosted backend settings
    #[serde(default)]
    pub hosted: HostedStorageConfig,
}

/// Local (embedded) backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Database directory; defaults to the user's data directory
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum number of conversations kept
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_max_conversations() -> usize {
    50
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_conversations: default_max_conversations(),
        }
    }
}

impl LocalStorageConfig {
    /// Resolve the database directory
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Storage` if no path is configured and the
    /// user's data directory cannot be determined.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let proj_dirs = ProjectDirs::from("com", "dbcoach", "dbcoach")
            .ok_or_else(|| DbCoachError::Storage("Could not determine data directory".into()))?;

        Ok(proj_dirs.data_dir().join("conversations"))
    }
}

/// Hosted (PostgREST) backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedStorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Anon or service API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table holding conversations
    #[serde(default = "default_table")]
    pub table: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_hosted_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures (connection errors, 5xx, 429)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries, doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_table() -> String {
    "conversations".to_string()
}

fn default_hosted_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for HostedStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
            timeout_seconds: default_hosted_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Text generation configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratorConfig {
    /// Google Generative Language API settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base URL (overridable for tests and proxies)
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API key; usually supplied through `GEMINI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_gemini_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: default_gemini_api_base(),
            model: default_gemini_model(),
            api_key: None,
            timeout_seconds: default_gemini_timeout(),
        }
    }
}

/// Generation session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Mode label recorded in conversation metadata
    #[serde(default = "default_session_mode")]
    pub mode: String,

    /// Capacity of the bounded session event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_session_mode() -> String {
    "dbcoach".to_string()
}

fn default_channel_capacity() -> usize {
    crate::session::DEFAULT_CHANNEL_CAPACITY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: default_session_mode(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Signed-in user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Current user id, used as the owner filter
    #[serde(default)]
    pub id: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(DbCoachError::Io)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(DbCoachError::Yaml)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(backend) = std::env::var("DBCOACH_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(value) => self.storage.backend = value,
                Err(_) => tracing::warn!("Invalid DBCOACH_STORAGE_BACKEND: {}", backend),
            }
        }

        if let Ok(path) = std::env::var("DBCOACH_LOCAL_PATH") {
            self.storage.local.path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("DBCOACH_LOCAL_MAX_CONVERSATIONS") {
            if let Ok(value) = max.parse() {
                self.storage.local.max_conversations = value;
            } else {
                tracing::warn!("Invalid DBCOACH_LOCAL_MAX_CONVERSATIONS: {}", max);
            }
        }

        if let Ok(url) = std::env::var("DBCOACH_HOSTED_URL") {
            self.storage.hosted.url = Some(url);
        }

        if let Ok(key) = std::env::var("DBCOACH_HOSTED_API_KEY") {
            self.storage.hosted.api_key = Some(key);
        }

        if let Ok(table) = std::env::var("DBCOACH_HOSTED_TABLE") {
            self.storage.hosted.table = table;
        }

        if let Ok(model) = std::env::var("DBCOACH_GEMINI_MODEL") {
            self.generator.gemini.model = model;
        }

        if let Ok(api_base) = std::env::var("DBCOACH_GEMINI_API_BASE") {
            self.generator.gemini.api_base = api_base;
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.generator.gemini.api_key = Some(key);
        }

        if let Ok(user_id) = std::env::var("DBCOACH_USER_ID") {
            self.user.id = Some(user_id);
        }

        if let Ok(mode) = std::env::var("DBCOACH_SESSION_MODE") {
            self.session.mode = mode;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(backend) = cli.backend {
            tracing::debug!("Storage backend override from CLI: {}", backend);
            self.storage.backend = backend;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Config` if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.storage.local.max_conversations == 0 {
            return Err(DbCoachError::Config(
                "storage.local.max_conversations must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.local.max_conversations > 10_000 {
            return Err(DbCoachError::Config(
                "storage.local.max_conversations must be less than or equal to 10000".to_string(),
            )
            .into());
        }

        if self.storage.backend == StorageBackend::Hosted {
            let url = self.storage.hosted.url.as_deref().unwrap_or_default();
            if url.is_empty() {
                return Err(DbCoachError::Config(
                    "storage.hosted.url is required for the hosted backend".to_string(),
                )
                .into());
            }
            url::Url::parse(url).map_err(|e| {
                DbCoachError::Config(format!("Invalid storage.hosted.url '{}': {}", url, e))
            })?;

            if self
                .storage
                .hosted
                .api_key
                .as_deref()
                .unwrap_or_default()
                .is_empty()
            {
                return Err(DbCoachError::Config(
                    "storage.hosted.api_key is required for the hosted backend".to_string(),
                )
                .into());
            }
        }

        let table = &self.storage.hosted.table;
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DbCoachError::Config(format!(
                "storage.hosted.table must be a plain identifier, got '{}'",
                table
            ))
            .into());
        }

        if self.storage.hosted.timeout_seconds == 0 {
            return Err(DbCoachError::Config(
                "storage.hosted.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.hosted.max_retries > 10 {
            return Err(DbCoachError::Config(
                "storage.hosted.max_retries must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.generator.gemini.model.trim().is_empty() {
            return Err(
                DbCoachError::Config("generator.gemini.model cannot be empty".to_string()).into(),
            );
        }

        if self.session.channel_capacity == 0 {
            return Err(DbCoachError::Config(
                "session.channel_capacity must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
