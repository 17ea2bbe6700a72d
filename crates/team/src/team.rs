use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use boardroom_agents::{Agent, MemberSummary};
use boardroom_common::{
    AgentProfile, BoardroomError, EventSender, Result, RunResponse, Tool, ToolContext,
    ToolDefinition, parse_args,
};
use boardroom_llm::{LlmClient, build_llm_client};
use boardroom_tools::Toolbox;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{BoardroomConfig, TeamMode, TeamSettings};
use crate::roster::validate_roster;

/// A leader agent plus the members it can hand work to.
pub struct Team {
    leader: Arc<Agent>,
    members: Vec<Arc<Agent>>,
    mode: TeamMode,
}

impl Team {
    /// Build the configured team against the configured provider.
    pub fn from_config(config: &BoardroomConfig) -> Result<Self> {
        Self::from_config_with(config, |key| std::env::var(key).ok())
    }

    /// Like [`Team::from_config`], reading the credential fallback from `lookup`.
    pub fn from_config_with<F>(config: &BoardroomConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut provider = config.provider.clone();
        provider.api_key = Some(config.resolve_api_key_with(lookup)?);
        let client = build_llm_client(&provider)?;
        let toolbox = Toolbox::new(&config.tools)?;
        Self::build(&config.team, config.roster(), client, &toolbox)
    }

    pub fn build(
        settings: &TeamSettings,
        profiles: Vec<AgentProfile>,
        client: Arc<dyn LlmClient>,
        toolbox: &Toolbox,
    ) -> Result<Self> {
        validate_roster(&profiles)?;

        let members = profiles
            .into_iter()
            .map(|profile| {
                Agent::builder(profile, client.clone())
                    .profile_toolkits(toolbox)
                    .max_tool_rounds(settings.max_tool_rounds)
                    .build()
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut leader_profile = AgentProfile::new("agent-team", settings.name.clone());
        leader_profile.instructions = settings.instructions.clone();
        leader_profile.model = settings.model.clone();
        leader_profile.markdown = settings.markdown;
        leader_profile.show_tool_calls = settings.show_tool_calls;

        let leader = match settings.mode {
            TeamMode::Coordinate => {
                let transfers: Vec<TransferTool> =
                    members.iter().cloned().map(TransferTool::new).collect();
                let summaries = members
                    .iter()
                    .zip(&transfers)
                    .map(|(m, t)| summarize(m, Some(t.tool_name.clone())))
                    .collect();
                Agent::builder(leader_profile, client)
                    .tools(transfers.into_iter().map(|t| Arc::new(t) as Arc<dyn Tool>))
                    .members(summaries)
                    .max_tool_rounds(settings.max_tool_rounds)
                    .build()?
            }
            TeamMode::Broadcast => {
                leader_profile = leader_profile.with_instruction(
                    "Merge the member answers you are given into one complete reply and say which member each point came from",
                );
                let summaries = members.iter().map(|m| summarize(m, None)).collect();
                Agent::builder(leader_profile, client)
                    .members(summaries)
                    .build()?
            }
        };

        info!(
            team = %leader.name(),
            mode = ?settings.mode,
            members = members.len(),
            "Team assembled"
        );

        Ok(Self {
            leader: Arc::new(leader),
            members,
            mode: settings.mode,
        })
    }

    pub fn name(&self) -> &str {
        self.leader.name()
    }

    pub fn mode(&self) -> TeamMode {
        self.mode
    }

    pub fn leader(&self) -> &Arc<Agent> {
        &self.leader
    }

    pub fn members(&self) -> &[Arc<Agent>] {
        &self.members
    }

    pub fn member(&self, slug: &str) -> Result<&Arc<Agent>> {
        self.members
            .iter()
            .find(|m| m.slug() == slug)
            .ok_or_else(|| BoardroomError::NotFound(format!("agent {slug}")))
    }

    /// Answer `query` as a team.
    pub async fn run(&self, query: &str) -> Result<RunResponse> {
        self.execute(query, None).await
    }

    /// Answer `query` as a team, streaming every agent's progress to `sink`.
    pub async fn run_stream(&self, query: &str, sink: EventSender) -> Result<RunResponse> {
        self.execute(query, Some(sink)).await
    }

    /// Ask a single member, bypassing the leader.
    pub async fn run_member(&self, slug: &str, query: &str) -> Result<RunResponse> {
        self.member(slug)?.run(query).await
    }

    async fn execute(&self, query: &str, sink: Option<EventSender>) -> Result<RunResponse> {
        match self.mode {
            TeamMode::Coordinate => match sink {
                Some(sink) => self.leader.run_stream(query, sink).await,
                None => self.leader.run(query).await,
            },
            TeamMode::Broadcast => {
                let prompt = self.broadcast(query, sink.clone()).await?;
                match sink {
                    Some(sink) => self.leader.run_stream(&prompt, sink).await,
                    None => self.leader.run(&prompt).await,
                }
            }
        }
    }

    /// Run every member on `query` concurrently and build the leader's merge prompt.
    async fn broadcast(&self, query: &str, sink: Option<EventSender>) -> Result<String> {
        let started = Instant::now();
        let mut handles = Vec::new();

        for member in &self.members {
            let member = member.clone();
            let query = query.to_string();
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let result = match sink {
                    Some(sink) => member.run_stream(&query, sink).await,
                    None => member.run(&query).await,
                };
                (member.name().to_string(), result)
            }));
        }

        let mut answers = Vec::new();
        let mut failures = 0;
        for handle in handles {
            match handle.await {
                Ok((name, Ok(response))) => answers.push((name, response.content)),
                Ok((name, Err(e))) => {
                    warn!(member = %name, error = %e, "Team member failed");
                    failures += 1;
                    answers.push((name, format!("(no answer: {e})")));
                }
                Err(e) => {
                    error!(error = %e, "Team member task panicked");
                    failures += 1;
                }
            }
        }

        info!(
            team = %self.name(),
            members = self.members.len(),
            failures,
            duration_ms = started.elapsed().as_millis() as u64,
            "Broadcast finished"
        );

        if failures == self.members.len() {
            return Err(BoardroomError::Agent(format!(
                "every member of {} failed to answer",
                self.name()
            )));
        }

        let mut prompt = format!(
            "The team members answered the question below.\n\n<question>\n{query}\n</question>\n\n<member_answers>\n"
        );
        for (name, answer) in answers {
            prompt.push_str(&format!("### {name}\n{answer}\n\n"));
        }
        prompt.push_str("</member_answers>");
        Ok(prompt)
    }
}

fn summarize(member: &Agent, transfer_tool: Option<String>) -> MemberSummary {
    MemberSummary {
        name: member.name().to_string(),
        role: member.profile().role.clone(),
        transfer_tool,
        tools: member.tool_names(),
    }
}

/// `transfer_task_to_<member>`: the leader hands a task to one member.
pub struct TransferTool {
    member: Arc<Agent>,
    tool_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TransferArgs {
    /// A clear and concise description of the task the member should achieve
    task_description: String,
    /// The expected output from the member
    #[serde(default)]
    expected_output: Option<String>,
    /// Additional information that will help the member complete the task
    #[serde(default)]
    additional_information: Option<String>,
}

impl TransferTool {
    pub fn new(member: Arc<Agent>) -> Self {
        let tool_name = transfer_tool_name(member.slug());
        Self { member, tool_name }
    }
}

pub fn transfer_tool_name(slug: &str) -> String {
    format!("transfer_task_to_{}", slug.replace('-', "_"))
}

fn member_prompt(args: &TransferArgs) -> String {
    let mut prompt = args.task_description.trim().to_string();
    if let Some(expected) = args.expected_output.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\n<expected_output>\n{}\n</expected_output>",
            expected.trim()
        ));
    }
    if let Some(info) = args
        .additional_information
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        prompt.push_str(&format!(
            "\n\n<additional_information>\n{}\n</additional_information>",
            info.trim()
        ));
    }
    prompt
}

#[async_trait]
impl Tool for TransferTool {
    fn definition(&self) -> ToolDefinition {
        let role = &self.member.profile().role;
        let description = if role.is_empty() {
            format!("Transfer a task to {}.", self.member.name())
        } else {
            format!("Transfer a task to {}. Role: {role}", self.member.name())
        };
        ToolDefinition::new::<TransferArgs>(self.tool_name.clone(), description)
    }

    fn name(&self) -> String {
        self.tool_name.clone()
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: TransferArgs = parse_args(&self.tool_name, args)?;
        if args.task_description.trim().is_empty() {
            return Err(BoardroomError::Tool("task_description is empty".to_string()));
        }
        info!(
            from = %ctx.agent_name,
            to = %self.member.name(),
            "Delegating task"
        );
        let prompt = member_prompt(&args);
        let response = match ctx.events.clone() {
            Some(sink) => self.member.run_stream(&prompt, sink).await?,
            None => self.member.run(&prompt).await?,
        };
        Ok(response.content)
    }
}
