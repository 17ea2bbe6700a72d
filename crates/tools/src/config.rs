use std::fmt;
use std::time::Duration;

use boardroom_common::{BoardroomError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// The `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// User-Agent sent to search and finance endpoints
    pub user_agent: String,
    pub timeout_secs: u64,
    pub search: SearchConfig,
    pub finance: FinanceConfig,
    pub email: EmailConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 20,
            search: SearchConfig::default(),
            finance: FinanceConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl ToolsConfig {
    /// HTTP client shared by every toolkit.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .build()
            .map_err(|e| BoardroomError::Config(format!("Failed to build HTTP client: {e}")))
    }

    /// Fill email credentials from the environment where the file left them unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let email = &mut self.email;
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.is_none() {
                *slot = lookup(key).filter(|v| !v.trim().is_empty());
            }
        };
        fill(&mut email.sender_email, "BOARDROOM_SENDER_EMAIL");
        fill(&mut email.receiver_email, "BOARDROOM_RECEIVER_EMAIL");
        fill(&mut email.access_token, "GMAIL_ACCESS_TOKEN");
        fill(&mut email.refresh_token, "GMAIL_REFRESH_TOKEN");
        fill(&mut email.client_id, "GMAIL_CLIENT_ID");
        fill(&mut email.client_secret, "GMAIL_CLIENT_SECRET");
    }
}

/// DuckDuckGo endpoints and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base of the HTML results page (`/html/`)
    pub html_url: String,
    /// Base of the main site, used for the vqd token and `news.js`
    pub site_url: String,
    pub max_results: usize,
    /// DuckDuckGo region code, `wt-wt` is worldwide
    pub region: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            html_url: "https://html.duckduckgo.com".to_string(),
            site_url: "https://duckduckgo.com".to_string(),
            max_results: 5,
            region: "wt-wt".to_string(),
        }
    }
}

/// Yahoo Finance endpoints and per-function switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    pub chart_url: String,
    pub summary_url: String,
    /// Page visited once to obtain the session cookie
    pub cookie_url: String,
    pub stock_price: bool,
    pub company_info: bool,
    pub stock_fundamentals: bool,
    pub analyst_recommendations: bool,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            chart_url: "https://query1.finance.yahoo.com".to_string(),
            summary_url: "https://query2.finance.yahoo.com".to_string(),
            cookie_url: "https://fc.yahoo.com".to_string(),
            stock_price: true,
            company_info: true,
            stock_fundamentals: true,
            analyst_recommendations: true,
        }
    }
}

/// Gmail sender settings. Tokens normally come from the environment.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub sender_name: String,
    pub sender_email: Option<String>,
    pub receiver_email: Option<String>,
    pub api_url: String,
    pub token_url: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender_name: "Boardroom".to_string(),
            sender_email: None,
            receiver_email: None,
            api_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
        }
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(v: &Option<String>) -> &'static str {
            if v.is_some() { "[redacted]" } else { "None" }
        }
        f.debug_struct("EmailConfig")
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .field("receiver_email", &self.receiver_email)
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .finish()
    }
}
