//! Configuration for the roadmap server and CLI.
//!
//! Settings are read from `.roadmap/roadmap.toml` and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! db_path = ".roadmap/board.db"
//!
//! [client]
//! base_url = "http://127.0.0.1:3142"
//! request_timeout_ms = 10000
//! user = "pm@example.com"
//!
//! [access]
//! open = false
//!
//! [[access.users]]
//! email = "pm@example.com"
//! can_access_roadmap_board = true
//! can_edit_roadmap_board = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory holding the config file and the default database.
pub const CONFIG_DIR: &str = ".roadmap";
pub const CONFIG_FILE: &str = "roadmap.toml";

pub const ENV_SERVER_URL: &str = "ROADMAP_SERVER_URL";
pub const ENV_USER: &str = "ROADMAP_USER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("board.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Email sent as the caller identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            user: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3142".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccess {
    pub email: String,
    #[serde(default = "default_true")]
    pub can_access_roadmap_board: bool,
    #[serde(default)]
    pub can_edit_roadmap_board: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSection {
    /// When true every caller gets full permissions and `users` is ignored.
    #[serde(default = "default_true")]
    pub open: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserAccess>,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            open: true,
            users: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Contents of `roadmap.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub access: AccessSection,
}

impl RoadmapToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse roadmap.toml")
    }

    /// Load `roadmap.toml` from `roadmap_dir`, or defaults if it does not exist.
    pub fn load_or_default(roadmap_dir: &Path) -> Result<Self> {
        let config_path = roadmap_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize roadmap.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if !self.client.base_url.starts_with("http://")
            && !self.client.base_url.starts_with("https://")
        {
            warnings.push(format!(
                "client.base_url '{}' should start with http:// or https://",
                self.client.base_url
            ));
        }
        if self.client.request_timeout_ms == 0 {
            warnings.push("client.request_timeout_ms is 0: every request will time out".to_string());
        }
        if self.access.open && !self.access.users.is_empty() {
            warnings.push("access.open is true: access.users entries are ignored".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.access.users {
            if !user.email.contains('@') {
                warnings.push(format!("access.users email '{}' is not an email", user.email));
            }
            if !seen.insert(user.email.to_lowercase()) {
                warnings.push(format!("access.users lists '{}' more than once", user.email));
            }
            if user.can_edit_roadmap_board && !user.can_access_roadmap_board {
                warnings.push(format!(
                    "'{}' can edit but not access the board: edits will be refused",
                    user.email
                ));
            }
        }

        warnings
    }
}

/// Resolved configuration.
///
/// Merges settings from:
/// 1. roadmap.toml
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct RoadmapConfig {
    pub project_dir: PathBuf,
    pub roadmap_dir: PathBuf,
    pub toml: RoadmapToml,
    cli_server_url: Option<String>,
    cli_user: Option<String>,
}

impl RoadmapConfig {
    /// Create a config from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", project_dir.display()))?;
        let roadmap_dir = project_dir.join(CONFIG_DIR);
        let toml = RoadmapToml::load_or_default(&roadmap_dir)?;

        Ok(Self {
            project_dir,
            roadmap_dir,
            toml,
            cli_server_url: None,
            cli_user: None,
        })
    }

    /// Create a config with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        server_url: Option<String>,
        user: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_server_url = server_url;
        config.cli_user = user;
        Ok(config)
    }

    /// Path of the config file, whether or not it exists.
    pub fn config_file(&self) -> PathBuf {
        self.roadmap_dir.join(CONFIG_FILE)
    }

    /// Server base URL (CLI → env → file).
    pub fn server_url(&self) -> String {
        let url = self
            .cli_server_url
            .clone()
            .or_else(|| env_non_empty(ENV_SERVER_URL))
            .unwrap_or_else(|| self.toml.client.base_url.clone());
        url.trim_end_matches('/').to_string()
    }

    /// Caller identity (CLI → env → file).
    pub fn user(&self) -> Option<String> {
        self.cli_user
            .clone()
            .or_else(|| env_non_empty(ENV_USER))
            .or_else(|| self.toml.client.user.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.toml.client.request_timeout_ms)
    }

    /// Database path, resolved against the project directory.
    pub fn db_path(&self) -> PathBuf {
        if self.toml.server.db_path.is_absolute() {
            self.toml.server.db_path.clone()
        } else {
            self.project_dir.join(&self.toml.server.db_path)
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
