//! Application state for the API server.

use std::sync::Arc;

use boardroom_team::{BoardroomConfig, ServerConfig, Team};

/// Shared application state for the API server.
pub struct AppState {
    /// The team every request is answered by
    pub team: Arc<Team>,

    pub server: ServerConfig,
}

impl AppState {
    /// Build the team described by `config`. Fails when no API key is available.
    pub fn new(config: &BoardroomConfig) -> boardroom_common::Result<Self> {
        Self::new_with(config, |key| std::env::var(key).ok())
    }

    /// Like [`AppState::new`], with environment lookups going through `lookup`.
    pub fn new_with<F>(config: &BoardroomConfig, lookup: F) -> boardroom_common::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let team = Team::from_config_with(config, lookup)?;
        Ok(Self::with_team(Arc::new(team), config.server.clone()))
    }

    pub fn with_team(team: Arc<Team>, server: ServerConfig) -> Self {
        Self { team, server }
    }
}
