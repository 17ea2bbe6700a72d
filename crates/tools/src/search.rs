//! DuckDuckGo web and news search.
//!
//! Web results are scraped from the JavaScript-free HTML endpoint. News needs
//! a `vqd` token taken from the regular search page before `news.js` answers.

use std::sync::Arc;

use async_trait::async_trait;
use boardroom_common::{BoardroomError, Result, Tool, ToolContext, ToolDefinition, parse_args};
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;

static RESULT: Lazy<Selector> = Lazy::new(|| selector("div.result"));
static RESULT_LINK: Lazy<Selector> = Lazy::new(|| selector("a.result__a"));
static RESULT_SNIPPET: Lazy<Selector> = Lazy::new(|| selector(".result__snippet"));
static VQD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"vqd=["']?([0-9-]+)["'&]"#).expect("valid vqd regex"));

/// A web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub href: String,
    pub body: String,
}

/// A news search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsHit {
    pub date: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub source: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// The query to search for
    query: String,
    /// Maximum number of results to return (default 5)
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsItem>,
}

#[derive(Deserialize)]
struct NewsItem {
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: String,
}

/// DuckDuckGo client shared by the search tools.
pub struct DuckDuckGo {
    http: reqwest::Client,
    config: SearchConfig,
}

impl DuckDuckGo {
    pub fn new(http: reqwest::Client, config: SearchConfig) -> Self {
        Self { http, config }
    }

    fn limit(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.config.max_results)
    }

    pub async fn search(&self, query: &str, max_results: Option<usize>) -> Result<Vec<SearchHit>> {
        let url = format!("{}/html/", self.config.html_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("kl", self.config.region.as_str())])
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BoardroomError::Tool(format!(
                "DuckDuckGo search returned {status}"
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo response unreadable: {e}")))?;

        let mut hits = parse_results(&html);
        hits.truncate(self.limit(max_results));
        debug!(query, hits = hits.len(), "DuckDuckGo search");
        Ok(hits)
    }

    pub async fn news(&self, query: &str, max_results: Option<usize>) -> Result<Vec<NewsHit>> {
        let site = self.config.site_url.trim_end_matches('/');
        let page = self
            .http
            .get(format!("{site}/"))
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo request failed: {e}")))?
            .text()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo response unreadable: {e}")))?;

        let vqd = extract_vqd(&page).ok_or_else(|| {
            BoardroomError::Tool(format!("DuckDuckGo did not return a vqd token for {query:?}"))
        })?;

        let response = self
            .http
            .get(format!("{site}/news.js"))
            .query(&[
                ("l", self.config.region.as_str()),
                ("o", "json"),
                ("noamp", "1"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("p", "-1"),
            ])
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo news request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BoardroomError::Tool(format!(
                "DuckDuckGo news returned {status}"
            )));
        }
        let news: NewsResponse = response
            .json()
            .await
            .map_err(|e| BoardroomError::Tool(format!("DuckDuckGo news unreadable: {e}")))?;

        let hits: Vec<NewsHit> = news
            .results
            .into_iter()
            .take(self.limit(max_results))
            .map(|item| NewsHit {
                date: item
                    .date
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
                title: clean_text(&item.title),
                body: clean_text(&item.excerpt),
                url: item.url,
                source: item.source,
            })
            .collect();
        debug!(query, hits = hits.len(), "DuckDuckGo news");
        Ok(hits)
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

/// Pull results out of the HTML endpoint's markup.
///
/// Each `div.result` block yields one hit: its title link plus the snippet
/// inside the same block. Sponsored results are skipped.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);

    let mut hits = Vec::new();
    for result in document.select(&RESULT) {
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&RESULT_LINK).next() else {
            continue;
        };
        let href = resolve_href(link.value().attr("href").unwrap_or_default());
        if href.is_empty() || href.contains("duckduckgo.com/y.js") {
            continue;
        }

        let body = result
            .select(&RESULT_SNIPPET)
            .next()
            .map(element_text)
            .unwrap_or_default();

        hits.push(SearchHit {
            title: element_text(link),
            href,
            body,
        });
    }
    hits
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    match url::Url::parse(&absolute) {
        Ok(parsed) if parsed.path().starts_with("/l/") => parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .unwrap_or(absolute),
        _ => absolute,
    }
}

fn extract_vqd(page: &str) -> Option<String> {
    VQD.captures(page).map(|c| c[1].to_string())
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    collapse(element.text())
}

/// Strip tags, decode entities and collapse whitespace.
fn clean_text(fragment: &str) -> String {
    collapse(Html::parse_fragment(fragment).root_element().text())
}

fn collapse<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `duckduckgo_search`
pub struct WebSearchTool {
    client: Arc<DuckDuckGo>,
}

impl WebSearchTool {
    pub fn new(client: Arc<DuckDuckGo>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new::<SearchArgs>(
            "duckduckgo_search",
            "Search DuckDuckGo for a query. Returns a JSON list of results with title, href and body.",
        )
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let args: SearchArgs = parse_args("duckduckgo_search", args)?;
        let hits = self.client.search(&args.query, args.max_results).await?;
        Ok(serde_json::to_string_pretty(&hits)?)
    }
}

/// `duckduckgo_news`
pub struct NewsSearchTool {
    client: Arc<DuckDuckGo>,
}

impl NewsSearchTool {
    pub fn new(client: Arc<DuckDuckGo>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new::<SearchArgs>(
            "duckduckgo_news",
            "Get the latest news from DuckDuckGo for a query. Returns a JSON list of articles.",
        )
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let args: SearchArgs = parse_args("duckduckgo_news", args)?;
        let hits = self.client.news(&args.query, args.max_results).await?;
        Ok(serde_json::to_string_pretty(&hits)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r##"
<div class="result results_links results_links_deep web-result ">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.nddb.coop%2Finformation%2Fstats&amp;rut=abc">NDDB <b>Dairy</b> Statistics</a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Milk production in India &amp; growth &#x27;23</a>
  </div>
</div>
<div class="result results_links result--ad">
  <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_provider=bing">Buy cows</a>
  <a class="result__snippet" href="#">Sponsored</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://amul.com/">Amul</a>
</div>
"##;

    #[test]
    fn parses_results_and_unwraps_redirects() {
        let hits = parse_results(RESULTS_PAGE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "NDDB Dairy Statistics");
        assert_eq!(hits[0].href, "https://www.nddb.coop/information/stats");
        assert_eq!(hits[0].body, "Milk production in India & growth '23");
    }

    #[test]
    fn result_without_snippet_gets_empty_body() {
        let hits = parse_results(RESULTS_PAGE);
        assert_eq!(hits[1].href, "https://amul.com/");
        assert_eq!(hits[1].body, "");
    }

    #[test]
    fn decodes_numeric_and_named_entities() {
        assert_eq!(
            clean_text("&lt;b&gt; &#8377;5 &rsquo;23 <i>milk</i>&hellip;"),
            "<b> ₹5 \u{2019}23 milk\u{2026}"
        );
    }

    #[test]
    fn snippet_stays_with_its_own_result() {
        let page = r##"
<div class="result"><a class="result__a" href="https://a.example/">A &ndash; dairy</a></div>
<div class="result">
  <a class="result__a" href="https://b.example/">B</a>
  <div class="result__snippet">Cattle feed &hellip; prices</div>
</div>
"##;
        let hits = parse_results(page);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "A \u{2013} dairy");
        assert_eq!(hits[0].body, "");
        assert_eq!(hits[1].body, "Cattle feed \u{2026} prices");
    }

    #[test]
    fn extracts_vqd_token() {
        let page = r#"<script>DDG.deep.initialize('/d.js?q=milk&vqd=4-123456789012&kl=wt-wt');</script>"#;
        assert_eq!(extract_vqd(page).as_deref(), Some("4-123456789012"));

        let quoted = r#"vqd="4-98765","#;
        assert_eq!(extract_vqd(quoted).as_deref(), Some("4-98765"));
        assert!(extract_vqd("nothing here").is_none());
    }

    #[test]
    fn search_definition_requires_query() {
        let client = Arc::new(DuckDuckGo::new(reqwest::Client::new(), SearchConfig::default()));
        let def = WebSearchTool::new(client).definition();
        assert_eq!(def.name, "duckduckgo_search");
        let required = def.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "query");
    }
}
