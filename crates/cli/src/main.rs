use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use anyhow::Result;
use boardroom_common::{RunResponse, event_channel, strip_ansi};
use boardroom_team::{API_KEY_ENV, BoardroomConfig, Team};
use clap::Parser;
use colored::*;
use spinners::{Spinner, Spinners};
use tracing_subscriber::EnvFilter;

mod cli_args;
mod render;

use cli_args::{CliArgs, Commands, DEFAULT_QUERY};
use render::EventPrinter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = BoardroomConfig::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Agents) => {
            list_agents(&config);
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Ask {
            query,
            agent,
            no_stream,
        }) => ask(&config, query, agent, no_stream).await,
        None => ask(&config, None, None, false).await,
    }
}

fn list_agents(config: &BoardroomConfig) {
    for profile in config.roster() {
        let toolkits: Vec<&str> = profile.toolkits.iter().map(|k| k.as_str()).collect();
        println!("{} {}", profile.slug.bright_green().bold(), profile.name);
        if !profile.role.is_empty() {
            println!("    {}", profile.role);
        }
        println!("    {}", format!("tools: {}", toolkits.join(", ")).bright_black());
    }
}

async fn ask(
    config: &BoardroomConfig,
    query: Option<String>,
    agent: Option<String>,
    no_stream: bool,
) -> Result<ExitCode> {
    if config.resolve_api_key().is_err() {
        eprintln!(
            "{} {API_KEY_ENV} environment variable not set.",
            "Error:".bright_red()
        );
        return Ok(ExitCode::FAILURE);
    }

    let team = Team::from_config(config)?;
    let query = query.unwrap_or_else(|| DEFAULT_QUERY.to_string());

    let terminal = io::stdout().is_terminal();
    if !terminal {
        colored::control::set_override(false);
    }

    let outcome = if no_stream || !terminal {
        run_quietly(&team, agent.as_deref(), &query, terminal).await
    } else {
        run_streaming(&team, agent.as_deref(), &query).await
    };

    match outcome {
        Ok(response) => {
            if let Some(usage) = response.usage {
                tracing::info!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Token usage"
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".bright_red(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Wait for the whole answer, then print it once.
async fn run_quietly(
    team: &Team,
    agent: Option<&str>,
    query: &str,
    terminal: bool,
) -> boardroom_common::Result<RunResponse> {
    let mut spinner = terminal
        .then(|| Spinner::new(Spinners::Dots12, "Thinking...".bright_magenta().to_string()));

    let result = match agent {
        Some(slug) => team.run_member(slug, query).await,
        None => team.run(query).await,
    };

    if let Some(ref mut sp) = spinner {
        sp.stop();
        print!("\r\x1B[K");
    }

    let response = result?;
    let content = if terminal {
        response.content.clone()
    } else {
        strip_ansi(&response.content)
    };
    println!("{content}");
    Ok(response)
}

/// Stream the answer as it is generated, with tool calls as they happen.
async fn run_streaming(
    team: &Team,
    agent: Option<&str>,
    query: &str,
) -> boardroom_common::Result<RunResponse> {
    let member = match agent {
        Some(slug) => Some(team.member(slug)?.clone()),
        None => None,
    };
    let speaker = member.as_ref().unwrap_or(team.leader());
    let lead = speaker.name().to_string();
    let show_tool_calls = speaker.profile().show_tool_calls;

    println!("{}", format!("> {lead}:").bright_green());
    let (tx, mut rx) = event_channel();
    let mut printer = EventPrinter::new(io::stdout(), lead, show_tool_calls);

    let run = async {
        match member {
            Some(ref member) => member.run_stream(query, tx).await,
            None => team.run_stream(query, tx).await,
        }
    };
    let print = async {
        while let Some(event) = rx.recv().await {
            if let Err(e) = printer.handle(&event) {
                tracing::warn!(error = %e, "Failed to write to stdout");
            }
        }
    };

    let (result, ()) = tokio::join!(run, print);
    printer.finish().ok();
    io::stdout().flush().ok();
    result
}
