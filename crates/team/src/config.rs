//! Configuration for the team and the services around it.
//!
//! Everything lives in one TOML file and every section is optional:
//!
//! ```toml
//! [provider]
//! model = "gpt-4o"
//!
//! [team]
//! mode = "coordinate"
//!
//! [server]
//! port = 8000
//!
//! [[agents]]
//! slug = "web-agent"
//! name = "Web Agent"
//! toolkits = ["web_search"]
//! ```
//!
//! Config files are checked before loading on Unix: world-writable files are
//! rejected, as are world-readable files that hold an API key.

use std::path::Path;

use boardroom_agents::DEFAULT_MAX_TOOL_ROUNDS;
use boardroom_common::{AgentProfile, BoardroomError, Result};
use boardroom_llm::LlmConfig;
use boardroom_tools::ToolsConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::default_roster;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardroomConfig {
    pub provider: LlmConfig,
    pub team: TeamSettings,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    /// Replaces the default roster when non-empty
    pub agents: Vec<AgentProfile>,
}

/// How the leader uses its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMode {
    /// The leader delegates tasks to members through transfer tools
    #[default]
    Coordinate,
    /// Every member answers; the leader merges the answers
    Broadcast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSettings {
    pub name: String,
    pub mode: TeamMode,
    pub instructions: Vec<String>,
    /// Leader model override
    pub model: Option<String>,
    pub markdown: bool,
    pub show_tool_calls: bool,
    pub max_tool_rounds: usize,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            name: "Agent Team".to_string(),
            mode: TeamMode::Coordinate,
            instructions: vec![
                "Always include sources".to_string(),
                "Use tables to display data".to_string(),
            ],
            model: None,
            markdown: true,
            show_tool_calls: true,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl BoardroomConfig {
    /// Load a configuration file after checking its permissions.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;
        if config.provider.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. Prefer the {} environment variable.",
                path.display(),
                API_KEY_ENV
            );
        }
        Ok(config)
    }

    /// Load a configuration file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BoardroomError::Config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| BoardroomError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BoardroomError::Config(format!("Invalid config: {e}")))
    }

    /// Load `path` if given, else the defaults, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill unset values from `lookup` (normally the process environment).
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Ok(key) = self.resolve_api_key_with(&lookup) {
            self.provider.api_key = Some(key);
        }
        if self.provider.api_url.is_none() {
            self.provider.api_url = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty());
        }
        self.tools.apply_env(&lookup);
    }

    /// The provider credential: the file value first, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.provider
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                BoardroomError::Config(format!("{API_KEY_ENV} environment variable not set"))
            })
    }

    /// Configured agents, or the default roster when none are configured.
    pub fn roster(&self) -> Vec<AgentProfile> {
        if self.agents.is_empty() {
            default_roster()
        } else {
            self.agents.clone()
        }
    }
}

/// Reject world-writable config files, and world-readable ones holding a key.
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path).map_err(|e| {
        BoardroomError::Config(format!("Failed to read config file '{}': {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(BoardroomError::Config(format!(
            "Config path '{}' is not a regular file",
            path.display()
        )));
    }

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o002 != 0 {
        return Err(BoardroomError::Config(format!(
            "Config file '{}' is world-writable (mode {mode:04o}). Fix with: chmod o-w {}",
            path.display(),
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_api_key = content
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("api_key") && !line.starts_with("api_key = \"\""));

    if has_api_key && mode & 0o004 != 0 {
        return Err(BoardroomError::Config(format!(
            "Config file '{}' contains an API key but is world-readable (mode {mode:04o}). Fix with: chmod 600 {}",
            path.display(),
            path.display()
        )));
    }
    if has_api_key && mode & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {mode:04o})",
            path.display()
        );
    }

    Ok(())
}
