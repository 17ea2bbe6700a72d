//! System prompt assembly.

use boardroom_common::AgentProfile;

/// What a team leader is told about one of its members.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub name: String,
    pub role: String,
    /// Name of the tool that hands a task to this member
    pub transfer_tool: Option<String>,
    /// Tools the member itself can use
    pub tools: Vec<String>,
}

const MARKDOWN_NOTE: &str = "Use markdown to format your answers.";

/// Build the system prompt for `profile`, listing `members` when the agent leads a team.
pub fn system_prompt(profile: &AgentProfile, members: &[MemberSummary]) -> String {
    let mut sections = Vec::new();

    if !profile.role.trim().is_empty() {
        sections.push(format!("<your_role>\n{}\n</your_role>", profile.role.trim()));
    }

    if !members.is_empty() {
        let mut block = String::from(
            "<team_members>\nYou lead a team. Hand work to the member best suited to it and combine their answers into one reply.\n",
        );
        for (i, member) in members.iter().enumerate() {
            block.push_str(&format!("\nMember {}: {}\n", i + 1, member.name));
            if !member.role.is_empty() {
                block.push_str(&format!("Role: {}\n", member.role));
            }
            if let Some(ref tool) = member.transfer_tool {
                block.push_str(&format!("Delegate with: {tool}\n"));
            }
            if !member.tools.is_empty() {
                block.push_str(&format!("Their tools: {}\n", member.tools.join(", ")));
            }
        }
        block.push_str("</team_members>");
        sections.push(block);
    }

    let instructions: Vec<&str> = profile
        .instructions
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();
    if !instructions.is_empty() {
        let bullets: Vec<String> = instructions.iter().map(|i| format!("- {i}")).collect();
        sections.push(format!("<instructions>\n{}\n</instructions>", bullets.join("\n")));
    }

    if profile.markdown {
        sections.push(format!(
            "<additional_information>\n- {MARKDOWN_NOTE}\n</additional_information>"
        ));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_prompt_has_role_instructions_and_markdown() {
        let profile = AgentProfile::new("web-agent", "Web Agent")
            .with_role("Search the web for information")
            .with_instruction("Always include sources");
        let prompt = system_prompt(&profile, &[]);

        assert!(prompt.starts_with("<your_role>\nSearch the web for information\n</your_role>"));
        assert!(prompt.contains("<instructions>\n- Always include sources\n</instructions>"));
        assert!(prompt.contains(MARKDOWN_NOTE));
        assert!(!prompt.contains("<team_members>"));
    }

    #[test]
    fn markdown_note_is_optional() {
        let mut profile = AgentProfile::new("plain", "Plain");
        profile.markdown = false;
        assert_eq!(system_prompt(&profile, &[]), "");
    }

    #[test]
    fn leader_prompt_lists_members() {
        let leader = AgentProfile::new("agent-team", "Agent Team")
            .with_instruction("Use tables to display data");
        let members = vec![
            MemberSummary {
                name: "Finance Agent".to_string(),
                role: "Retrieve and analyze financial data".to_string(),
                transfer_tool: Some("transfer_task_to_finance_agent".to_string()),
                tools: vec!["get_current_stock_price".to_string(), "add".to_string()],
            },
            MemberSummary {
                name: "Web Agent".to_string(),
                role: String::new(),
                transfer_tool: None,
                tools: vec![],
            },
        ];
        let prompt = system_prompt(&leader, &members);

        assert!(
            prompt.contains("Member 1: Finance Agent\nRole: Retrieve and analyze financial data\n")
        );
        assert!(prompt.contains("Delegate with: transfer_task_to_finance_agent"));
        assert!(prompt.contains("Their tools: get_current_stock_price, add"));
        assert!(prompt.contains("Member 2: Web Agent\n</team_members>"));
    }
}
