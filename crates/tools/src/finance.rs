//! Yahoo Finance lookups.
//!
//! Prices come from the public chart endpoint. Company data, fundamentals and
//! analyst trends come from `quoteSummary`, which needs a session cookie and a
//! matching crumb; both are fetched once and reused until Yahoo rejects them.

use std::sync::Arc;

use async_trait::async_trait;
use boardroom_common::{BoardroomError, Result, Tool, ToolContext, ToolDefinition, parse_args};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::FinanceConfig;

#[derive(Debug, Clone)]
struct YahooSession {
    cookie: String,
    crumb: String,
}

/// Yahoo Finance client shared by the finance tools.
pub struct YahooFinance {
    http: reqwest::Client,
    config: FinanceConfig,
    session: Mutex<Option<YahooSession>>,
}

impl YahooFinance {
    pub fn new(http: reqwest::Client, config: FinanceConfig) -> Self {
        Self {
            http,
            config,
            session: Mutex::new(None),
        }
    }

    /// Latest regular-market price.
    pub async fn current_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.config.chart_url.trim_end_matches('/'),
            symbol
        );
        let response = self
            .http
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Yahoo chart request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BoardroomError::Tool(format!(
                "Yahoo chart returned {status}"
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Yahoo chart unreadable: {e}")))?;

        let meta = &body["chart"]["result"][0]["meta"];
        meta["regularMarketPrice"]
            .as_f64()
            .or_else(|| meta["previousClose"].as_f64())
            .ok_or_else(|| BoardroomError::Tool("no price in chart data".to_string()))
    }

    /// Fetch `modules` from quoteSummary, merged into one object.
    pub async fn quote_summary(
        &self,
        symbol: &str,
        modules: &[&str],
    ) -> Result<Map<String, Value>> {
        let session = self.session().await?;
        match self.fetch_summary(symbol, modules, &session).await {
            Err(FetchError::Unauthorized) => {
                warn!(symbol, "Yahoo rejected the cached crumb, refreshing session");
                *self.session.lock().await = None;
                let session = self.session().await?;
                self.fetch_summary(symbol, modules, &session)
                    .await
                    .map_err(FetchError::into_error)
            }
            other => other.map_err(FetchError::into_error),
        }
    }

    async fn fetch_summary(
        &self,
        symbol: &str,
        modules: &[&str],
        session: &YahooSession,
    ) -> std::result::Result<Map<String, Value>, FetchError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.config.summary_url.trim_end_matches('/'),
            symbol
        );
        let modules = modules.join(",");
        let response = self
            .http
            .get(&url)
            .header(COOKIE, &session.cookie)
            .query(&[("modules", modules.as_str()), ("crumb", session.crumb.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Other(format!("Yahoo quoteSummary request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Other(format!("Yahoo quoteSummary unreadable: {e}")))?;

        let summary = &body["quoteSummary"];
        if let Some(description) = summary["error"]["description"].as_str() {
            return Err(FetchError::Other(description.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Other(format!("Yahoo quoteSummary returned {status}")));
        }

        let mut merged = Map::new();
        if let Some(result) = summary["result"][0].as_object() {
            for module in result.values() {
                if let Some(fields) = module.as_object() {
                    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        if merged.is_empty() {
            return Err(FetchError::Other(format!("no data returned for {symbol}")));
        }
        Ok(merged)
    }

    async fn session(&self) -> Result<YahooSession> {
        let mut guard = self.session.lock().await;
        if let Some(ref session) = *guard {
            return Ok(session.clone());
        }

        // fc.yahoo.com answers 404 but still sets the cookie.
        let response = self
            .http
            .get(&self.config.cookie_url)
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Yahoo cookie request failed: {e}")))?;
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        if cookie.is_empty() {
            return Err(BoardroomError::Tool(
                "Yahoo did not set a session cookie".to_string(),
            ));
        }

        let crumb_url = format!(
            "{}/v1/test/getcrumb",
            self.config.chart_url.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&crumb_url)
            .header(COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Yahoo crumb request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(BoardroomError::Tool(format!(
                "Yahoo crumb request returned {}",
                response.status()
            )));
        }
        let crumb = response
            .text()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Yahoo crumb unreadable: {e}")))?
            .trim()
            .to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(BoardroomError::Tool("Yahoo returned an invalid crumb".to_string()));
        }

        debug!("Yahoo session established");
        let session = YahooSession { cookie, crumb };
        *guard = Some(session.clone());
        Ok(session)
    }
}

enum FetchError {
    Unauthorized,
    Other(String),
}

impl FetchError {
    fn into_error(self) -> BoardroomError {
        match self {
            FetchError::Unauthorized => {
                BoardroomError::Tool("Yahoo rejected the session".to_string())
            }
            FetchError::Other(msg) => BoardroomError::Tool(msg),
        }
    }
}

/// Yahoo wraps most numbers as `{"raw": 1.2, "fmt": "1.20"}`.
fn raw(fields: &Map<String, Value>, key: &str) -> Value {
    match fields.get(key) {
        Some(Value::Object(obj)) => obj.get("raw").cloned().unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Value {
    match fields.get(key) {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Object(obj)) => obj.get("fmt").cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn company_info(fields: &Map<String, Value>) -> Value {
    let name = match text(fields, "shortName") {
        Value::Null => text(fields, "longName"),
        name => name,
    };
    json!({
        "Name": name,
        "Symbol": text(fields, "symbol"),
        "Current Stock Price": format!(
            "{} {}",
            raw(fields, "regularMarketPrice"),
            fields.get("currency").and_then(Value::as_str).unwrap_or("USD")
        ),
        "Market Cap": format!(
            "{} {}",
            raw(fields, "marketCap"),
            fields.get("currency").and_then(Value::as_str).unwrap_or("USD")
        ),
        "Sector": text(fields, "sector"),
        "Industry": text(fields, "industry"),
        "Address": text(fields, "address1"),
        "City": text(fields, "city"),
        "State": text(fields, "state"),
        "Zip": text(fields, "zip"),
        "Country": text(fields, "country"),
        "EPS": raw(fields, "trailingEps"),
        "P/E Ratio": raw(fields, "trailingPE"),
        "52 Week Low": raw(fields, "fiftyTwoWeekLow"),
        "52 Week High": raw(fields, "fiftyTwoWeekHigh"),
        "50 Day Average": raw(fields, "fiftyDayAverage"),
        "200 Day Average": raw(fields, "twoHundredDayAverage"),
        "Website": text(fields, "website"),
        "Summary": text(fields, "longBusinessSummary"),
        "Analyst Recommendation": text(fields, "recommendationKey"),
        "Number Of Analyst Opinions": raw(fields, "numberOfAnalystOpinions"),
        "Employees": raw(fields, "fullTimeEmployees"),
        "Total Cash": raw(fields, "totalCash"),
        "Free Cash flow": raw(fields, "freeCashflow"),
        "Operating Cash flow": raw(fields, "operatingCashflow"),
        "EBITDA": raw(fields, "ebitda"),
        "Revenue Growth": raw(fields, "revenueGrowth"),
        "Gross Margins": raw(fields, "grossMargins"),
        "Ebitda Margins": raw(fields, "ebitdaMargins"),
    })
}

fn fundamentals(symbol: &str, fields: &Map<String, Value>) -> Value {
    json!({
        "symbol": symbol,
        "company_name": text(fields, "longName"),
        "sector": text(fields, "sector"),
        "industry": text(fields, "industry"),
        "market_cap": raw(fields, "marketCap"),
        "pe_ratio": raw(fields, "forwardPE"),
        "pb_ratio": raw(fields, "priceToBook"),
        "dividend_yield": raw(fields, "dividendYield"),
        "eps": raw(fields, "trailingEps"),
        "beta": raw(fields, "beta"),
        "52_week_high": raw(fields, "fiftyTwoWeekHigh"),
        "52_week_low": raw(fields, "fiftyTwoWeekLow"),
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SymbolArgs {
    /// Stock ticker symbol, e.g. "NESTLEIND.NS" or "AAPL"
    symbol: String,
}

/// The finance functions that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceFunction {
    CurrentStockPrice,
    CompanyInfo,
    StockFundamentals,
    AnalystRecommendations,
}

impl FinanceFunction {
    pub const ALL: [FinanceFunction; 4] = [
        FinanceFunction::CurrentStockPrice,
        FinanceFunction::CompanyInfo,
        FinanceFunction::StockFundamentals,
        FinanceFunction::AnalystRecommendations,
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            FinanceFunction::CurrentStockPrice => "get_current_stock_price",
            FinanceFunction::CompanyInfo => "get_company_info",
            FinanceFunction::StockFundamentals => "get_stock_fundamentals",
            FinanceFunction::AnalystRecommendations => "get_analyst_recommendations",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            FinanceFunction::CurrentStockPrice => {
                "Get the current stock price for a given symbol."
            }
            FinanceFunction::CompanyInfo => {
                "Get company information and overview for a given stock symbol. Returns JSON."
            }
            FinanceFunction::StockFundamentals => {
                "Get fundamental data (market cap, P/E, P/B, dividend yield, EPS, beta) for a given stock symbol. Returns JSON."
            }
            FinanceFunction::AnalystRecommendations => {
                "Get analyst recommendations for a given stock symbol. Returns JSON."
            }
        }
    }

    /// What the error message calls this data.
    fn subject(&self) -> &'static str {
        match self {
            FinanceFunction::CurrentStockPrice => "current price",
            FinanceFunction::CompanyInfo => "company profile",
            FinanceFunction::StockFundamentals => "fundamentals",
            FinanceFunction::AnalystRecommendations => "analyst recommendations",
        }
    }

    pub fn enabled(&self, config: &FinanceConfig) -> bool {
        match self {
            FinanceFunction::CurrentStockPrice => config.stock_price,
            FinanceFunction::CompanyInfo => config.company_info,
            FinanceFunction::StockFundamentals => config.stock_fundamentals,
            FinanceFunction::AnalystRecommendations => config.analyst_recommendations,
        }
    }
}

/// One Yahoo Finance function exposed as a tool.
pub struct FinanceTool {
    client: Arc<YahooFinance>,
    function: FinanceFunction,
}

impl FinanceTool {
    pub fn new(client: Arc<YahooFinance>, function: FinanceFunction) -> Self {
        Self { client, function }
    }

    async fn lookup(&self, symbol: &str) -> Result<String> {
        match self.function {
            FinanceFunction::CurrentStockPrice => {
                let price = self.client.current_price(symbol).await?;
                Ok(format!("{price:.4}"))
            }
            FinanceFunction::CompanyInfo => {
                let fields = self
                    .client
                    .quote_summary(
                        symbol,
                        &[
                            "price",
                            "assetProfile",
                            "summaryDetail",
                            "defaultKeyStatistics",
                            "financialData",
                        ],
                    )
                    .await?;
                Ok(serde_json::to_string_pretty(&company_info(&fields))?)
            }
            FinanceFunction::StockFundamentals => {
                let fields = self
                    .client
                    .quote_summary(
                        symbol,
                        &["price", "assetProfile", "summaryDetail", "defaultKeyStatistics"],
                    )
                    .await?;
                Ok(serde_json::to_string_pretty(&fundamentals(symbol, &fields))?)
            }
            FinanceFunction::AnalystRecommendations => {
                let fields = self
                    .client
                    .quote_summary(symbol, &["recommendationTrend"])
                    .await?;
                let trend = fields.get("trend").cloned().unwrap_or(Value::Array(vec![]));
                Ok(serde_json::to_string_pretty(&trend)?)
            }
        }
    }
}

#[async_trait]
impl Tool for FinanceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new::<SymbolArgs>(self.function.tool_name(), self.function.description())
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let args: SymbolArgs = parse_args(self.function.tool_name(), args)?;
        let symbol = args.symbol.trim().to_uppercase();
        // Lookup failures go back to the model as text so it can try another symbol.
        match self.lookup(&symbol).await {
            Ok(output) => Ok(output),
            Err(e) => Ok(format!(
                "Error fetching {} for {symbol}: {}",
                self.function.subject(),
                e.to_string().trim_start_matches("Tool error: ")
            )),
        }
    }
}
