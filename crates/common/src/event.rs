//! Events emitted while an agent run is in progress.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress of a run, streamed to consoles and other observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        agent: String,
    },
    /// A chunk of the final answer
    ContentDelta {
        agent: String,
        content: String,
    },
    ToolCallStarted {
        agent: String,
        tool: String,
        /// Raw JSON arguments as sent by the model
        arguments: String,
    },
    ToolCallCompleted {
        agent: String,
        tool: String,
        is_error: bool,
        duration_ms: u64,
    },
    RunCompleted {
        agent: String,
    },
}

impl RunEvent {
    /// Name of the agent that produced the event.
    pub fn agent(&self) -> &str {
        match self {
            RunEvent::RunStarted { agent }
            | RunEvent::ContentDelta { agent, .. }
            | RunEvent::ToolCallStarted { agent, .. }
            | RunEvent::ToolCallCompleted { agent, .. }
            | RunEvent::RunCompleted { agent } => agent,
        }
    }
}

pub type EventSender = mpsc::Sender<RunEvent>;
pub type EventReceiver = mpsc::Receiver<RunEvent>;

/// Create an event channel with the default buffer size (64).
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(64)
}
