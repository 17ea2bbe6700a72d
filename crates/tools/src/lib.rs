//! Toolkits that agents can be equipped with.
//!
//! A [`Toolbox`] owns one client per external service, so every agent that
//! gets the finance toolkit shares the same Yahoo session and every agent with
//! email shares one cached Gmail token.

pub mod calculator;
pub mod config;
pub mod email;
pub mod finance;
pub mod search;

use std::sync::Arc;

use boardroom_common::{Result, Tool, ToolkitKind};

pub use calculator::{CalculatorTool, Operation};
pub use config::{EmailConfig, FinanceConfig, SearchConfig, ToolsConfig};
pub use email::{EmailUserTool, GmailMailer};
pub use finance::{FinanceFunction, FinanceTool, YahooFinance};
pub use search::{DuckDuckGo, NewsHit, NewsSearchTool, SearchHit, WebSearchTool};

pub struct Toolbox {
    search: Arc<DuckDuckGo>,
    finance: Arc<YahooFinance>,
    mailer: Arc<GmailMailer>,
    finance_functions: Vec<FinanceFunction>,
}

impl Toolbox {
    pub fn new(config: &ToolsConfig) -> Result<Self> {
        Ok(Self::with_client(config, config.http_client()?))
    }

    pub fn with_client(config: &ToolsConfig, http: reqwest::Client) -> Self {
        Self {
            search: Arc::new(DuckDuckGo::new(http.clone(), config.search.clone())),
            finance: Arc::new(YahooFinance::new(http.clone(), config.finance.clone())),
            mailer: Arc::new(GmailMailer::new(http, config.email.clone())),
            finance_functions: FinanceFunction::ALL
                .into_iter()
                .filter(|f| f.enabled(&config.finance))
                .collect(),
        }
    }

    /// Tools making up `kind`.
    pub fn toolkit(&self, kind: ToolkitKind) -> Vec<Arc<dyn Tool>> {
        match kind {
            ToolkitKind::WebSearch => vec![
                Arc::new(WebSearchTool::new(self.search.clone())) as Arc<dyn Tool>,
                Arc::new(NewsSearchTool::new(self.search.clone())),
            ],
            ToolkitKind::Finance => self
                .finance_functions
                .iter()
                .map(|f| Arc::new(FinanceTool::new(self.finance.clone(), *f)) as Arc<dyn Tool>)
                .collect(),
            ToolkitKind::Email => {
                vec![Arc::new(EmailUserTool::new(self.mailer.clone())) as Arc<dyn Tool>]
            }
            ToolkitKind::Calculator => Operation::ALL
                .into_iter()
                .map(|op| Arc::new(CalculatorTool::new(op)) as Arc<dyn Tool>)
                .collect(),
        }
    }
}

/// Build a single toolkit without keeping a [`Toolbox`] around.
pub fn build_toolkit(
    kind: ToolkitKind,
    config: &ToolsConfig,
    http: reqwest::Client,
) -> Vec<Arc<dyn Tool>> {
    Toolbox::with_client(config, http).toolkit(kind)
}
