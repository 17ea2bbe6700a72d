use std::sync::Arc;
use std::time::Instant;

use boardroom_common::{
    AgentProfile, BoardroomError, EventSender, Result, RunEvent, RunResponse, RunUsage, Tool,
    ToolContext, ToolDefinition, ToolInvocation, ToolkitKind, preview,
};
use boardroom_llm::{ChatMessage, LlmClient, LlmRequest, LlmResponse, StreamEvent, ToolCall};
use boardroom_tools::Toolbox;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::prompt::{MemberSummary, system_prompt};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// A role-bound chat model with tools.
///
/// Agents are immutable once built; share them behind `Arc` and run them from
/// as many tasks as needed.
pub struct Agent {
    profile: AgentProfile,
    client: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn builder(profile: AgentProfile, client: Arc<dyn LlmClient>) -> AgentBuilder {
        AgentBuilder::new(profile, client)
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn slug(&self) -> &str {
        &self.profile.slug
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Model this agent asks for, falling back to the client's default.
    pub fn model(&self) -> &str {
        self.profile
            .model
            .as_deref()
            .unwrap_or_else(|| self.client.model_name())
    }

    /// Run the agent on `input` and return its final answer.
    pub async fn run(&self, input: &str) -> Result<RunResponse> {
        self.execute(input, None).await
    }

    /// Like [`Agent::run`], streaming progress and answer deltas to `events`.
    pub async fn run_stream(&self, input: &str, events: EventSender) -> Result<RunResponse> {
        self.execute(input, Some(events)).await
    }

    async fn execute(&self, input: &str, events: Option<EventSender>) -> Result<RunResponse> {
        let started = Instant::now();
        let ctx = ToolContext::new(self.name()).with_events(events.clone());
        let definitions: Vec<ToolDefinition> = self.tools.iter().map(|t| t.definition()).collect();

        info!(agent = %self.name(), input = %preview(input, 80), "Agent run started");
        ctx.emit(RunEvent::RunStarted {
            agent: self.name().to_string(),
        })
        .await;

        let mut messages = vec![ChatMessage::user(input)];
        let mut invocations = Vec::new();
        let mut usage: Option<RunUsage> = None;
        let mut round = 0;

        let response = loop {
            let request = LlmRequest {
                system_prompt: Some(self.system_prompt.clone()).filter(|p| !p.is_empty()),
                messages: messages.clone(),
                tools: definitions.clone(),
                temperature: self.profile.temperature,
                max_tokens: self.profile.max_tokens,
                model: self.profile.model.clone(),
            };

            let response = match events {
                Some(ref sink) => self.complete_streaming(request, sink).await?,
                None => self.client.complete(request).await?,
            };
            if let Some(u) = response.usage {
                usage
                    .get_or_insert_with(RunUsage::default)
                    .add(u.prompt_tokens, u.completion_tokens);
            }

            if !response.wants_tools() {
                break response;
            }
            if round >= self.max_tool_rounds {
                warn!(agent = %self.name(), rounds = round, "Tool round limit reached");
                return Err(BoardroomError::Agent(format!(
                    "{} exceeded {} tool rounds without answering",
                    self.name(),
                    self.max_tool_rounds
                )));
            }
            round += 1;

            debug!(
                agent = %self.name(),
                round,
                calls = response.tool_calls.len(),
                "Executing tool calls"
            );
            messages.push(ChatMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            let results =
                join_all(response.tool_calls.iter().map(|call| self.invoke(call, &ctx))).await;
            for (call, invocation) in response.tool_calls.iter().zip(results) {
                messages.push(ChatMessage::tool_result(&call.id, &invocation.result));
                invocations.push(invocation);
            }
        };

        let content = response.content.as_deref().unwrap_or_default().trim();
        if content.is_empty() {
            return Err(BoardroomError::Agent(format!(
                "{} returned an empty response",
                self.name()
            )));
        }

        ctx.emit(RunEvent::RunCompleted {
            agent: self.name().to_string(),
        })
        .await;
        info!(
            agent = %self.name(),
            model = %response.model,
            tool_calls = invocations.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Agent run completed"
        );

        Ok(RunResponse::new(self.name(), content)
            .with_model(response.model)
            .with_tool_calls(invocations)
            .with_usage(usage))
    }

    /// Stream one completion, forwarding answer text as run events.
    async fn complete_streaming(
        &self,
        request: LlmRequest,
        sink: &EventSender,
    ) -> Result<LlmResponse> {
        let (tx, mut rx) = mpsc::channel::<StreamEvent>(32);
        let agent = self.name().to_string();

        let forward = async {
            while let Some(event) = rx.recv().await {
                if let StreamEvent::ContentDelta(content) = event {
                    // A closed sink only means nobody is watching.
                    let _ = sink
                        .send(RunEvent::ContentDelta {
                            agent: agent.clone(),
                            content,
                        })
                        .await;
                }
            }
        };

        let (response, ()) = tokio::join!(self.client.complete_stream(request, tx), forward);
        response
    }

    async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> ToolInvocation {
        let started = Instant::now();
        ctx.emit(RunEvent::ToolCallStarted {
            agent: self.name().to_string(),
            tool: call.name.clone(),
            arguments: call.arguments.clone(),
        })
        .await;

        let outcome = match self.tools.iter().find(|t| t.name() == call.name) {
            None => Err(BoardroomError::NotFound(format!("tool {}", call.name))),
            Some(tool) => match parse_arguments(&call.arguments) {
                Ok(args) => tool.call(args, ctx).await,
                Err(e) => Err(e),
            },
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (result, is_error) = match outcome {
            Ok(output) => (output, false),
            Err(e) => {
                warn!(agent = %self.name(), tool = %call.name, error = %e, "Tool call failed");
                (format!("Error: {e}"), true)
            }
        };
        debug!(
            agent = %self.name(),
            tool = %call.name,
            is_error,
            duration_ms,
            "Tool call finished"
        );

        ctx.emit(RunEvent::ToolCallCompleted {
            agent: self.name().to_string(),
            tool: call.name.clone(),
            is_error,
            duration_ms,
        })
        .await;

        ToolInvocation {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            is_error,
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw)
        .map_err(|e| BoardroomError::Tool(format!("arguments are not valid JSON: {e}")))
}

/// Builds an [`Agent`] from a profile, a client and its tools.
pub struct AgentBuilder {
    profile: AgentProfile,
    client: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    members: Vec<MemberSummary>,
    max_tool_rounds: usize,
}

impl AgentBuilder {
    pub fn new(profile: AgentProfile, client: Arc<dyn LlmClient>) -> Self {
        Self {
            profile,
            client,
            tools: Vec::new(),
            members: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn toolkit(self, kind: ToolkitKind, toolbox: &Toolbox) -> Self {
        self.tools(toolbox.toolkit(kind))
    }

    /// Add every toolkit the profile names.
    pub fn profile_toolkits(self, toolbox: &Toolbox) -> Self {
        let kinds = self.profile.toolkits.clone();
        kinds
            .into_iter()
            .fold(self, |builder, kind| builder.toolkit(kind, toolbox))
    }

    /// Team members listed in the system prompt.
    pub fn members(mut self, members: Vec<MemberSummary>) -> Self {
        self.members = members;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if self.profile.name.trim().is_empty() {
            return Err(BoardroomError::Config(format!(
                "agent {:?} has no name",
                self.profile.slug
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            let name = tool.name();
            if !seen.insert(name.clone()) {
                return Err(BoardroomError::Config(format!(
                    "agent {} has two tools named {name}",
                    self.profile.name
                )));
            }
        }

        Ok(Agent {
            system_prompt: system_prompt(&self.profile, &self.members),
            profile: self.profile,
            client: self.client,
            tools: self.tools,
            max_tool_rounds: self.max_tool_rounds,
        })
    }
}
