use std::io::{self, Write};

use boardroom_common::{RunEvent, preview};
use colored::*;

/// Writes run events to the console.
///
/// Only the agent that was asked streams its answer; nested members show up
/// as progress lines.
pub struct EventPrinter<W: Write> {
    out: W,
    lead: String,
    show_tool_calls: bool,
    mid_line: bool,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, lead: impl Into<String>, show_tool_calls: bool) -> Self {
        Self {
            out,
            lead: lead.into(),
            show_tool_calls,
            mid_line: false,
        }
    }

    pub fn handle(&mut self, event: &RunEvent) -> io::Result<()> {
        let nested = event.agent() != self.lead;
        match event {
            RunEvent::ContentDelta { content, .. } if !nested => {
                write!(self.out, "{content}")?;
                self.mid_line = !content.ends_with('\n');
                self.out.flush()?;
            }
            RunEvent::RunStarted { agent } if nested => {
                let working = format!("{agent} is working");
                self.line(format!("{} {}", "::".bright_magenta(), working.bright_black()))?;
            }
            RunEvent::ToolCallStarted {
                agent,
                tool,
                arguments,
            } if self.show_tool_calls => {
                let args = preview(arguments.trim(), 80);
                self.line(format!(
                    "┌─ {} {}({})",
                    agent.bright_black(),
                    tool.bold().bright_blue(),
                    args.bright_black()
                ))?;
            }
            RunEvent::ToolCallCompleted {
                tool,
                is_error,
                duration_ms,
                ..
            } if self.show_tool_calls => {
                let (name, outcome) = if *is_error {
                    (tool.bold().bright_red(), "failed")
                } else {
                    (tool.bold().bright_green(), "done")
                };
                self.line(format!("└─ {name} {outcome} in {duration_ms}ms"))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Finish the streamed answer with a newline if it did not end with one.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        self.out.flush()
    }

    fn line(&mut self, text: String) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        writeln!(self.out, "{text}")
    }
}
