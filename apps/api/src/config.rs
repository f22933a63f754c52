use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_NIRF_BASE_URL: &str = "https://www.nirfindia.org";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub nirf_base_url: String,
    pub report: ReportLimits,
    pub port: u16,
    pub rust_log: String,
}

/// Hard caps applied to every report-generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportLimits {
    /// Completion rounds allowed before the loop gives up.
    pub max_iterations: u32,
    /// Assistant turns allowed to dispatch tools. `None` means uncapped.
    pub max_tool_rounds: Option<u32>,
    pub timeout: Duration,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_tool_rounds: Some(5),
            timeout: Duration::from_secs(180),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = ReportLimits::default();
        let report = ReportLimits {
            max_iterations: optional_env("REPORT_MAX_ITERATIONS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("REPORT_MAX_ITERATIONS must be a positive integer")?
                .unwrap_or(defaults.max_iterations),
            max_tool_rounds: match optional_env("REPORT_MAX_TOOL_ROUNDS") {
                Some(raw) => parse_tool_round_cap(&raw)?,
                None => defaults.max_tool_rounds,
            },
            timeout: optional_env("REPORT_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("REPORT_TIMEOUT_SECS must be a number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };
        if report.max_iterations == 0 {
            anyhow::bail!("REPORT_MAX_ITERATIONS must be at least 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: optional_env("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            nirf_base_url: optional_env("NIRF_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NIRF_BASE_URL.to_string()),
            report,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// `0` or `none` disables the tool-round cap.
fn parse_tool_round_cap(raw: &str) -> Result<Option<u32>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let cap = raw
        .parse::<u32>()
        .with_context(|| format!("REPORT_MAX_TOOL_ROUNDS must be an integer or 'none', got '{raw}'"))?;
    Ok((cap > 0).then_some(cap))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
