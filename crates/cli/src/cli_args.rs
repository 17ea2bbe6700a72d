use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_QUERY: &str =
    "i want to built a company related to dairy products in india give me all tha details for my company";

/// Command line arguments for the boardroom console
#[derive(Parser, Debug)]
#[command(
    name = "boardroom",
    version,
    about = "Ask a team of business agents about starting and running a company"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a boardroom.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the team (or one agent) a question
    Ask {
        /// The question. Defaults to the dairy business question.
        query: Option<String>,

        /// Ask a single agent by slug, e.g. finance-agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Wait for the full answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// List the agents on the team
    Agents,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn ask_with_agent_and_no_stream() {
        let args = CliArgs::parse_from([
            "boardroom",
            "ask",
            "Milk prices?",
            "--agent",
            "finance-agent",
            "--no-stream",
        ]);
        match args.command {
            Some(Commands::Ask {
                query,
                agent,
                no_stream,
            }) => {
                assert_eq!(query.as_deref(), Some("Milk prices?"));
                assert_eq!(agent.as_deref(), Some("finance-agent"));
                assert!(no_stream);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let args = CliArgs::parse_from(["boardroom", "--config", "team.toml"]);
        assert!(args.command.is_none());
        assert_eq!(args.config, Some(PathBuf::from("team.toml")));
    }
}
