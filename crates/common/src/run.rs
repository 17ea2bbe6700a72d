//! Output of a completed agent run.

use serde::{Deserialize, Serialize};

/// A tool call made during a run, with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool called
    pub name: String,

    /// Raw JSON arguments as sent by the model
    pub arguments: String,

    /// Text returned to the model (the error text when `is_error`)
    pub result: String,

    /// Whether the tool failed
    #[serde(default)]
    pub is_error: bool,
}

/// Token accounting summed over every model call in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl RunUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, prompt_tokens: u32, completion_tokens: u32) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(completion_tokens);
    }
}

/// The answer an agent produced for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// Unique run ID
    pub run_id: String,

    /// Agent that produced the answer
    pub agent_name: String,

    /// Final answer text
    pub content: String,

    /// Tool calls made along the way, in order
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,

    /// Model that produced the final answer
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<RunUsage>,

    /// Timestamp (Unix millis)
    pub created_at: u64,
}

impl RunResponse {
    pub fn new(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            run_id: format!("run_{}", uuid::Uuid::new_v4()),
            agent_name: agent_name.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            model: String::new(),
            usage: None,
            created_at: now_millis(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolInvocation>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_usage(mut self, usage: Option<RunUsage>) -> Self {
        self.usage = usage;
        self
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let a = RunResponse::new("Web Agent", "one");
        let b = RunResponse::new("Web Agent", "two");
        assert!(a.run_id.starts_with("run_"));
        assert_ne!(a.run_id, b.run_id);
        assert!(a.created_at > 0);
    }

    #[test]
    fn usage_accumulates() {
        let mut usage = RunUsage::default();
        usage.add(100, 20);
        usage.add(50, 5);
        assert_eq!(usage.prompt_tokens, 150);
        assert_eq!(usage.completion_tokens, 25);
        assert_eq!(usage.total(), 175);
    }

    #[test]
    fn usage_is_omitted_when_absent() {
        let response = RunResponse::new("Finance Agent", "NVDA: 120.5").with_model("gpt-4o");
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("usage").is_none());
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["tool_calls"].as_array().unwrap().len(), 0);
    }
}
