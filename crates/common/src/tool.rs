//! The tool abstraction shared by toolkits, agents and the team.
//!
//! A tool is a single function the model may call mid-conversation. Its
//! arguments are described by a JSON Schema generated from a `schemars`
//! argument struct, so the schema and the deserializer never drift apart.

use crate::event::{EventSender, RunEvent};
use crate::{BoardroomError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Build a definition whose parameters are generated from `T`.
    pub fn new<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters_for::<T>(),
        }
    }
}

/// Generate the parameter schema for `T`.
///
/// `$schema` and `title` are dropped; chat-completion APIs only want the
/// object description.
pub fn parameters_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| empty_parameters());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    value
}

fn empty_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Deserialize tool arguments, mapping failures to a tool error that names the tool.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    // Models sometimes send `null` for argument-less calls.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| BoardroomError::Tool(format!("Invalid arguments for {tool}: {e}")))
}

/// Per-call context handed to a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Name of the agent making the call.
    pub agent_name: String,
    /// Sink for nested run events (used by delegation tools).
    pub events: Option<EventSender>,
}

impl ToolContext {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Forward an event if a sink is attached. A closed receiver is ignored.
    pub async fn emit(&self, event: RunEvent) {
        if let Some(ref sink) = self.events {
            let _ = sink.send(event).await;
        }
    }
}

/// A callable capability exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Tool name (the function name the model calls).
    fn name(&self) -> String {
        self.definition().name
    }

    /// Execute the tool. The returned string is fed back to the model verbatim.
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}
