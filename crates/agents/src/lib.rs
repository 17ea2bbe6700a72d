//! Agent runtime.
//!
//! An [`Agent`] pairs an [`AgentProfile`](boardroom_common::AgentProfile) with a
//! chat client and a set of tools. Running it drives the tool-call loop: the
//! model either answers or asks for tools, tool results are fed back, and the
//! loop repeats until a plain answer arrives or the round limit is hit.

pub mod agent;
pub mod prompt;

pub use agent::{Agent, AgentBuilder, DEFAULT_MAX_TOOL_ROUNDS};
pub use prompt::{MemberSummary, system_prompt};
