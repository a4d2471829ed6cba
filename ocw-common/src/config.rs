//! Bootstrap configuration loading
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `OCW_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/ocw/ocw-tasks.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing configuration file is never fatal: a warning is logged and the
//! compiled defaults are used. A file that exists but cannot be parsed is an
//! error, since silently ignoring it would hide operator mistakes.
//!
//! Secrets and deployment-specific URLs may additionally be overridden from
//! the environment (see [`TomlConfig::apply_env_overrides`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "OCW_CONFIG";

/// Default HTTP port for ocw-tasks
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default so that a partial file (or no file at all)
/// still yields a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Interface the HTTP server binds to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Externally reachable base URL used to build worker callback addresses.
    /// Falls back to `http://{bind_address}:{port}` when unset.
    pub public_base_url: Option<String>,

    pub worker: WorkerConfig,
    pub tasks: TaskConfig,
    pub notifier: NotifierConfig,
    pub access: AccessConfig,
    pub logging: LoggingConfig,
}

/// External worker endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base URL; jobs are posted to `{base_url}/{task_type}`
    pub base_url: String,

    /// Bearer credential sent with every launch call
    pub api_key: Option<String>,

    /// Timeout for the synchronous launch call
    pub timeout_secs: u64,
}

/// Task lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Upper bound for one result-ingestion transaction
    pub ingestion_timeout_secs: u64,

    /// A task updated more recently than this cannot be deleted
    pub delete_cooldown_secs: u64,
}

/// Admin notification transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Discord-style webhook receiving `{"content": ...}` messages.
    /// Notifications are only logged when unset.
    pub webhook_url: Option<String>,
}

/// API access control
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Disables all access checks (local development only)
    pub disabled: bool,

    /// Bearer tokens accepted by the API
    pub tokens: Vec<AccessToken>,
}

/// One API bearer token and what it may touch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub name: String,
    pub token: String,

    /// Super admins may delete and reprocess tasks and query versions
    #[serde(default)]
    pub super_admin: bool,

    /// Workspace ids this token may operate on; `"*"` matches all
    #[serde(default)]
    pub workspaces: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("ocw.db"),
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            public_base_url: None,
            worker: WorkerConfig::default(),
            tasks: TaskConfig::default(),
            notifier: NotifierConfig::default(),
            access: AccessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3005".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            ingestion_timeout_secs: 10 * 60,
            delete_cooldown_secs: 10 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Base URL the worker uses to reach this service
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind_address, self.port),
        }
    }

    /// Apply environment overrides for deployment-specific values
    ///
    /// - `OCW_WORKER_URL` → `worker.base_url`
    /// - `OCW_WORKER_API_KEY` → `worker.api_key`
    /// - `OCW_PUBLIC_BASE_URL` → `public_base_url`
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env("OCW_WORKER_URL") {
            self.worker.base_url = url;
        }
        if let Some(key) = non_empty_env("OCW_WORKER_API_KEY") {
            self.worker.api_key = Some(key);
        }
        if let Some(url) = non_empty_env("OCW_PUBLIC_BASE_URL") {
            self.public_base_url = Some(url);
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve which configuration file to read, if any
///
/// Returns `None` when neither the CLI nor the environment names a file and
/// no file exists in the platform config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("ocw").join("ocw-tasks.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration with graceful degradation
///
/// Missing files fall back to defaults with a warning; environment
/// overrides are applied last.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        Some(path) => {
            warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            TomlConfig::default()
        }
        None => {
            info!("No configuration file found, using defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Write configuration to a TOML file (used by tooling and tests)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ocw"))
        .unwrap_or_else(|| PathBuf::from("./ocw_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_base_url_fallback() {
        let config = TomlConfig::default();
        assert_eq!(config.public_base_url(), "http://127.0.0.1:5780");
    }

    #[test]
    fn test_public_base_url_strips_trailing_slash() {
        let config = TomlConfig {
            public_base_url: Some("https://council.example.org/".to_string()),
            ..TomlConfig::default()
        };
        assert_eq!(config.public_base_url(), "https://council.example.org");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [worker]
            base_url = "http://worker:3005"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.worker.base_url, "http://worker:3005");
        assert_eq!(config.worker.timeout_secs, 30);
        assert_eq!(config.tasks.ingestion_timeout_secs, 600);
        assert_eq!(config.tasks.delete_cooldown_secs, 600);
        assert_eq!(config.logging.level, "info");
        assert!(!config.access.disabled);
    }

    #[test]
    fn test_access_tokens_parse() {
        let config: TomlConfig = toml::from_str(
            r#"
            [[access.tokens]]
            name = "ops"
            token = "secret"
            super_admin = true
            workspaces = ["*"]

            [[access.tokens]]
            name = "athens-editor"
            token = "other"
            workspaces = ["athens"]
            "#,
        )
        .unwrap();

        assert_eq!(config.access.tokens.len(), 2);
        assert!(config.access.tokens[0].super_admin);
        assert!(!config.access.tokens[1].super_admin);
        assert_eq!(config.access.tokens[1].workspaces, vec!["athens"]);
    }
}
