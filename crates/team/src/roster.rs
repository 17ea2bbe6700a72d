//! The stock team: seven members covering a small business from market
//! research to supply chain.

use std::collections::HashSet;

use boardroom_common::{AgentProfile, BoardroomError, Result, ToolkitKind};

const TABLES: &str = "Use tables to display data";

/// Slugs that collide with fixed API routes.
pub const RESERVED_SLUGS: [&str; 2] = ["agent-response", "health"];

pub fn default_roster() -> Vec<AgentProfile> {
    use ToolkitKind::*;

    vec![
        AgentProfile::new("web-agent", "Web Agent")
            .with_role("Search the web for information")
            .with_instruction("Always include sources")
            .with_toolkits([WebSearch]),
        AgentProfile::new("finance-agent", "Finance Agent")
            .with_role("Retrieve and analyze financial data")
            .with_instruction(
                "Calculate financial ratios and metrics. Include stock prices and financial data.",
            )
            .with_toolkits([Finance, Calculator, WebSearch]),
        AgentProfile::new("business-agent", "Business Agent")
            .with_role(
                "Initiates and leads the business. Develops vision, strategy, and execution plan.",
            )
            .with_instruction(TABLES)
            .with_toolkits([Email, WebSearch]),
        AgentProfile::new("market-sales-agent", "Market & Sales Agent")
            .with_role("Acts as a middleman between manufacturers and retailers. Ensures product availability and timely delivery.")
            .with_instruction(TABLES)
            .with_toolkits([Finance, WebSearch]),
        AgentProfile::new("rd-agent", "R&D Agent")
            .with_role("Innovate and improve product designs. Conduct experiments and test feasibility.")
            .with_instruction(TABLES)
            .with_toolkits([Finance, WebSearch]),
        AgentProfile::new("supply-chain-agent", "Supply Chain & Logistics Agent")
            .with_role("Manage production, supply raw materials, and ensure timely delivery while reducing waste.")
            .with_instruction(TABLES)
            .with_toolkits([WebSearch]),
        AgentProfile::new("advisory-agent", "Mentors & Advisors Agent")
            .with_role("Provide business guidance, strategy, and industry knowledge.")
            .with_instruction(TABLES)
            .with_toolkits([WebSearch]),
    ]
}

/// Slugs must be unique, lowercase URL segments and not shadow fixed routes.
pub fn validate_roster(profiles: &[AgentProfile]) -> Result<()> {
    if profiles.is_empty() {
        return Err(BoardroomError::Config("the team has no members".to_string()));
    }

    let mut seen = HashSet::new();
    for profile in profiles {
        let slug = profile.slug.as_str();
        let well_formed = !slug.is_empty()
            && !slug.starts_with('-')
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !well_formed {
            return Err(BoardroomError::Config(format!(
                "agent slug {slug:?} must be lowercase letters, digits and dashes"
            )));
        }
        if RESERVED_SLUGS.contains(&slug) {
            return Err(BoardroomError::Config(format!(
                "agent slug {slug:?} is reserved"
            )));
        }
        if !seen.insert(slug) {
            return Err(BoardroomError::Config(format!(
                "agent slug {slug:?} is used twice"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_slugs_and_names() {
        let roster = default_roster();
        let pairs: Vec<_> = roster
            .iter()
            .map(|p| (p.slug.as_str(), p.name.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("web-agent", "Web Agent"),
                ("finance-agent", "Finance Agent"),
                ("business-agent", "Business Agent"),
                ("market-sales-agent", "Market & Sales Agent"),
                ("rd-agent", "R&D Agent"),
                ("supply-chain-agent", "Supply Chain & Logistics Agent"),
                ("advisory-agent", "Mentors & Advisors Agent"),
            ]
        );
        validate_roster(&roster).unwrap();
    }

    #[test]
    fn every_member_can_search_and_only_business_can_email() {
        for profile in default_roster() {
            assert!(profile.has_toolkit(ToolkitKind::WebSearch), "{}", profile.slug);
            assert_eq!(
                profile.has_toolkit(ToolkitKind::Email),
                profile.slug == "business-agent"
            );
            assert!(profile.markdown && profile.show_tool_calls);
        }
    }

    #[test]
    fn finance_agent_has_calculator() {
        let roster = default_roster();
        let finance = roster.iter().find(|p| p.slug == "finance-agent").unwrap();
        assert_eq!(
            finance.toolkits,
            vec![
                ToolkitKind::Finance,
                ToolkitKind::Calculator,
                ToolkitKind::WebSearch
            ]
        );
    }

    #[test]
    fn bad_slugs_are_rejected() {
        let mk = |slug: &str| AgentProfile::new(slug, "X");
        assert!(validate_roster(&[]).is_err());
        assert!(validate_roster(&[mk("Web Agent")]).is_err());
        assert!(validate_roster(&[mk("health")]).is_err());
        assert!(validate_roster(&[mk("a"), mk("a")]).is_err());
        assert!(validate_roster(&[mk("a-1"), mk("b")]).is_ok());
    }
}
