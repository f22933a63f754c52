//! External tools the report model may call, and the registry that dispatches them.
//!
//! Tool failures never escape this module as errors: [`ToolProvider::invoke`]
//! always returns text, and a failure becomes an error sentence the model can
//! read and work around.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::ToolDefinition;

pub const NIRF_TOOL_NAME: &str = "get_top_nirf_colleges";
pub const MARKET_TRENDS_TOOL_NAME: &str = "get_market_trends";

const NIRF_DEFAULT_COUNT: u32 = 4;
const NIRF_MAX_COUNT: u32 = 20;
const NIRF_RANKING_YEAR: u16 = 2025;

/// Ranking categories published by NIRF.
pub const NIRF_CATEGORIES: &[&str] = &[
    "Engineering",
    "Management",
    "University",
    "Medical",
    "Pharmacy",
    "Law",
    "Architecture",
];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },
}

/// What the agentic loop sees: a catalog to advertise and a way to run a call.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn catalog(&self) -> Vec<ToolDefinition>;

    /// Runs `name` with raw JSON `arguments`. Never fails; errors come back as text.
    async fn invoke(&self, name: &str, arguments: &str) -> String;
}

/// One invokable tool with a declared argument schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, arguments: Value) -> Result<String, ToolError>;
}

/// Maps tool names to handlers. Arguments are parsed before any handler runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// The tools offered to the report model.
    pub fn career_tools(client: Client, nirf_base_url: &str) -> Self {
        Self::new()
            .register(NirfRankingsTool::new(client, nirf_base_url))
            .register(MarketTrendsTool)
    }

    async fn dispatch(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let arguments = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)?
        };

        handler.call(arguments).await
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn catalog(&self) -> Vec<ToolDefinition> {
        self.handlers.values().map(|h| h.definition()).collect()
    }

    async fn invoke(&self, name: &str, arguments: &str) -> String {
        match self.dispatch(name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Tool {name} failed: {e}");
                format!("Error executing {name}: {e}")
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// NIRF rankings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RankingArgs {
    category: String,
    num: Option<u32>,
    state: Option<String>,
}

impl RankingArgs {
    fn count(&self) -> u32 {
        self.num
            .unwrap_or(NIRF_DEFAULT_COUNT)
            .clamp(1, NIRF_MAX_COUNT)
    }

    /// Canonical casing for known categories; anything else passes through for
    /// the ranking site to accept or reject.
    fn category(&self) -> String {
        let requested = self.category.trim();
        match NIRF_CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(requested))
        {
            Some(known) => known.to_string(),
            None => {
                debug!("Passing through unrecognised NIRF category '{requested}'");
                requested.to_string()
            }
        }
    }

    fn state_filter(&self) -> Option<&str> {
        self.state.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One row of a NIRF ranking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedInstitution {
    pub rank: String,
    pub name: String,
    pub city: String,
    pub state: String,
}

/// Fetches top-ranked institutions from the NIRF rankings site.
pub struct NirfRankingsTool {
    client: Client,
    base_url: String,
}

impl NirfRankingsTool {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ranking_url(&self, category: &str) -> String {
        format!(
            "{}/Rankings/{NIRF_RANKING_YEAR}/{category}Ranking.html",
            self.base_url
        )
    }
}

#[async_trait]
impl ToolHandler for NirfRankingsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NIRF_TOOL_NAME.to_string(),
            description: format!(
                "Fetch the top N colleges from the NIRF {NIRF_RANKING_YEAR} rankings for a category, \
                 optionally filtered by state."
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "The NIRF ranking category.",
                        "enum": NIRF_CATEGORIES,
                    },
                    "num": {
                        "type": "integer",
                        "description": "Number of colleges to fetch (default 4, max 20).",
                        "minimum": 1,
                        "maximum": NIRF_MAX_COUNT,
                    },
                    "state": {
                        "type": "string",
                        "description": "Optional state to filter colleges by, e.g. Tamil Nadu.",
                    }
                },
                "required": ["category"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let args: RankingArgs = serde_json::from_value(arguments)?;
        let category = args.category();
        let count = args.count() as usize;
        let url = self.ranking_url(&category);

        debug!("Fetching NIRF rankings from {url}");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream {
                status: status.as_u16(),
            });
        }
        let html = response.text().await?;

        let institutions = top_institutions(&html, args.state_filter(), count);
        Ok(format_rankings(&category, args.state_filter(), &institutions))
    }
}

/// Extracts ranking rows from the table body: rank, name, city, state cells in order.
///
/// Only a row's own `<td>` children count as cells, so markup nested inside a
/// cell folds into that cell's text.
pub fn parse_ranking_rows(html: &str) -> Vec<RankedInstitution> {
    static ROW: OnceLock<Selector> = OnceLock::new();
    let row = ROW.get_or_init(|| Selector::parse("table tbody tr").expect("valid row selector"));

    let document = Html::parse_document(html);
    document
        .select(row)
        .filter_map(|tr| {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "td")
                .map(cell_text)
                .collect();
            if cells.len() < 4 {
                return None;
            }
            Some(RankedInstitution {
                rank: cells[0].clone(),
                name: cells[1].clone(),
                city: cells[2].clone(),
                state: cells[3].clone(),
            })
        })
        .filter(|i| !i.rank.is_empty() && !i.name.is_empty())
        .collect()
}

fn top_institutions(html: &str, state_filter: Option<&str>, count: usize) -> Vec<RankedInstitution> {
    let wanted = state_filter.map(str::to_lowercase);
    parse_ranking_rows(html)
        .into_iter()
        .filter(|i| match &wanted {
            Some(state) => i.state.to_lowercase().contains(state.as_str()),
            None => true,
        })
        .take(count)
        .collect()
}

/// Decoded text of a cell with whitespace collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_rankings(
    category: &str,
    state_filter: Option<&str>,
    institutions: &[RankedInstitution],
) -> String {
    let filter_note = state_filter
        .map(|s| format!(" (filtered by {s})"))
        .unwrap_or_default();

    if institutions.is_empty() {
        return format!(
            "No ranked {category} colleges found in NIRF {NIRF_RANKING_YEAR}{filter_note}."
        );
    }

    let lines = institutions
        .iter()
        .map(|i| {
            format!(
                "{}. {}, {}, {}",
                i.rank.trim_end_matches('.'),
                i.name,
                i.city,
                capitalize(&i.state.to_lowercase())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Top {} colleges in {category} from NIRF {NIRF_RANKING_YEAR}{filter_note}:\n{lines}",
        institutions.len()
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Market trends
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketTrendsArgs {
    job_role: String,
    industry: Option<String>,
}

/// Indicative salary and demand figures for a role, stamped with the current year.
pub struct MarketTrendsTool;

#[async_trait]
impl ToolHandler for MarketTrendsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: MARKET_TRENDS_TOOL_NAME.to_string(),
            description: "Get current market trends and salary data for a job role and industry."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "jobRole": {
                        "type": "string",
                        "description": "The job role to get market data for.",
                    },
                    "industry": {
                        "type": "string",
                        "description": "The industry sector.",
                    }
                },
                "required": ["jobRole"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let args: MarketTrendsArgs = serde_json::from_value(arguments)?;
        let industry = args
            .industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Technology");

        Ok(format!(
            "Market Trends for {} in {} ({}):\n\
             - Average Salary: \u{20B9}8-15 LPA for entry level, \u{20B9}15-30 LPA for mid-level\n\
             - Growth Rate: 12-18% annually\n\
             - Job Demand: High (growing at 20% YoY)",
            args.job_role.trim(),
            industry,
            Utc::now().year()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKING_HTML: &str = r##"
        <table>
          <thead><tr><th>Rank</th><th>Name</th><th>City</th><th>State</th></tr></thead>
          <tbody>
            <tr><td>1</td><td><a href="#">Indian Institute of Technology Madras</a></td><td>Chennai</td><td>Tamil Nadu</td></tr>
            <tr><td>2</td><td>Indian Institute of Technology Delhi</td><td>New Delhi</td><td>Delhi</td></tr>
            <tr><td>3</td><td>Indian Institute of Technology Bombay</td><td>Mumbai</td><td>MAHARASHTRA</td></tr>
            <tr><td>4</td><td>National Institute of Technology &amp; Science</td><td>Tiruchirappalli</td><td>Tamil  Nadu</td></tr>
          </tbody>
        </table>"##;

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "always_fails".to_string(),
                description: "fails".to_string(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn call(&self, _arguments: Value) -> Result<String, ToolError> {
            Err(ToolError::Upstream { status: 503 })
        }
    }

    #[test]
    fn test_parse_ranking_rows_skips_header_and_strips_markup() {
        let rows = parse_ranking_rows(RANKING_HTML);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].name, "Indian Institute of Technology Madras");
        assert_eq!(rows[3].name, "National Institute of Technology & Science");
        assert_eq!(rows[3].state, "Tamil Nadu");
    }

    #[test]
    fn test_parse_ranking_rows_keeps_rows_with_nested_tables_and_decodes_entities() {
        let html = r##"
            <table><tbody>
              <tr>
                <td>1</td>
                <td>Indian Institute of Technology Madras
                  <table><tr><td>Details</td></tr></table>
                </td>
                <td>Chennai</td>
                <td>Tamil Nadu</td>
              </tr>
              <tr><td>2</td><td>St. Xavier&#39;s &ndash; College&#8217;s</td><td>Mumbai</td><td>Maharashtra</td></tr>
            </tbody></table>"##;

        let rows = parse_ranking_rows(html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, "1");
        assert!(rows[0].name.starts_with("Indian Institute of Technology Madras"));
        assert_eq!(rows[0].city, "Chennai");
        assert_eq!(rows[0].state, "Tamil Nadu");
        assert_eq!(rows[1].name, "St. Xavier's \u{2013} College\u{2019}s");
    }

    #[test]
    fn test_state_filter_and_count() {
        let rows = top_institutions(RANKING_HTML, Some("tamil nadu"), 20);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.state == "Tamil Nadu"));

        let rows = top_institutions(RANKING_HTML, None, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].rank, "2");
    }

    #[test]
    fn test_format_rankings() {
        let rows = top_institutions(RANKING_HTML, None, 3);
        let text = format_rankings("Engineering", None, &rows);
        assert!(text.starts_with("Top 3 colleges in Engineering from NIRF 2025:"));
        assert!(text.contains("3. Indian Institute of Technology Bombay, Mumbai, Maharashtra"));

        let empty = format_rankings("Law", Some("Goa"), &[]);
        assert_eq!(empty, "No ranked Law colleges found in NIRF 2025 (filtered by Goa).");
    }

    #[test]
    fn test_ranking_args_clamp_and_canonicalize() {
        let args: RankingArgs =
            serde_json::from_value(json!({"category": "engineering", "num": 50})).unwrap();
        assert_eq!(args.count(), NIRF_MAX_COUNT);
        assert_eq!(args.category(), "Engineering");

        let args: RankingArgs =
            serde_json::from_value(json!({"category": "Dental", "num": 0, "state": "  "})).unwrap();
        assert_eq!(args.count(), 1);
        assert_eq!(args.category(), "Dental");
        assert!(args.state_filter().is_none());

        let args: RankingArgs = serde_json::from_value(json!({"category": "Law"})).unwrap();
        assert_eq!(args.count(), NIRF_DEFAULT_COUNT);
    }

    #[test]
    fn test_ranking_url() {
        let tool = NirfRankingsTool::new(Client::new(), "https://www.nirfindia.org/");
        assert_eq!(
            tool.ranking_url("Engineering"),
            "https://www.nirfindia.org/Rankings/2025/EngineeringRanking.html"
        );
    }

    #[test]
    fn test_catalog_is_sorted_by_name() {
        let registry = ToolRegistry::career_tools(Client::new(), "http://localhost");
        let names: Vec<String> = registry.catalog().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![MARKET_TRENDS_TOOL_NAME, NIRF_TOOL_NAME]);
    }

    #[tokio::test]
    async fn test_market_trends_defaults_industry() {
        let registry = ToolRegistry::new().register(MarketTrendsTool);
        let text = registry
            .invoke(MARKET_TRENDS_TOOL_NAME, r#"{"jobRole": "Data Scientist"}"#)
            .await;
        assert!(text.starts_with("Market Trends for Data Scientist in Technology"));
    }

    #[tokio::test]
    async fn test_invoke_turns_failures_into_text() {
        let registry = ToolRegistry::new()
            .register(MarketTrendsTool)
            .register(FailingTool);

        let unknown = registry.invoke("teleport", "{}").await;
        assert_eq!(unknown, "Error executing teleport: unknown tool 'teleport'");

        let malformed = registry.invoke(MARKET_TRENDS_TOOL_NAME, "{not json").await;
        assert!(malformed.starts_with("Error executing get_market_trends: invalid arguments"));

        let missing_field = registry.invoke(MARKET_TRENDS_TOOL_NAME, "").await;
        assert!(missing_field.contains("invalid arguments"));

        let failed = registry.invoke("always_fails", "{}").await;
        assert_eq!(
            failed,
            "Error executing always_fails: upstream returned HTTP 503"
        );
    }
}
