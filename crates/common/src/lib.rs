//! Common types and traits shared across Boardroom crates.
//!
//! This crate provides the foundational abstractions that agents, toolkits
//! and the team use to talk to each other.

pub mod error;
pub mod event;
pub mod profile;
pub mod run;
pub mod text;
pub mod tool;

pub use error::{BoardroomError, Result};
pub use event::{EventReceiver, EventSender, RunEvent, event_channel};
pub use profile::{AgentProfile, ToolkitKind};
pub use run::{RunResponse, RunUsage, ToolInvocation};
pub use text::{preview, strip_ansi};
pub use tool::{Tool, ToolContext, ToolDefinition, parameters_for, parse_args};
