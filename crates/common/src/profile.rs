//! Agent profiles: the declarative half of an agent.
//!
//! A profile names the role, the instructions and the toolkits an agent gets.
//! Profiles live in `common` so the configuration loader and the agent runtime
//! can share them without depending on each other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Toolkits an agent can be equipped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolkitKind {
    /// DuckDuckGo web and news search
    WebSearch,
    /// Yahoo Finance quotes, fundamentals and analyst recommendations
    Finance,
    /// Send an email to the configured receiver
    Email,
    /// Arithmetic helpers
    Calculator,
}

impl ToolkitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolkitKind::WebSearch => "web_search",
            ToolkitKind::Finance => "finance",
            ToolkitKind::Email => "email",
            ToolkitKind::Calculator => "calculator",
        }
    }
}

impl fmt::Display for ToolkitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// URL-safe identifier, used for per-agent routes (e.g. "web-agent")
    pub slug: String,

    /// Human-readable name
    pub name: String,

    /// What this agent does; shown to the model and to the team leader
    #[serde(default)]
    pub role: String,

    /// Model override (falls back to the provider model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Extra instructions appended to the system prompt
    #[serde(default)]
    pub instructions: Vec<String>,

    /// Toolkits bound to this agent
    #[serde(default)]
    pub toolkits: Vec<ToolkitKind>,

    /// Ask the model to format answers as markdown
    #[serde(default = "default_true")]
    pub markdown: bool,

    /// Surface tool calls to console output
    #[serde(default = "default_true")]
    pub show_tool_calls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl AgentProfile {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            role: String::new(),
            model: None,
            instructions: Vec::new(),
            toolkits: Vec::new(),
            markdown: true,
            show_tool_calls: true,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    pub fn with_toolkits(mut self, toolkits: impl IntoIterator<Item = ToolkitKind>) -> Self {
        self.toolkits.extend(toolkits);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn has_toolkit(&self, kind: ToolkitKind) -> bool {
        self.toolkits.contains(&kind)
    }
}
