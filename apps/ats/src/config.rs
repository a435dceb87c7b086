use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{LlmSettings, RetryPolicy, DEFAULT_API_URL, DEFAULT_MODEL};
use crate::report::ReportFormat;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Every variable has a default; only malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Fallback credential when a request does not carry its own key.
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub retry: RetryPolicy,
    pub rubric_path: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    pub evaluation_concurrency: usize,
    pub max_upload_bytes: usize,
    /// Report format when a request does not ask for one.
    pub report_format: ReportFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        // Total tries per model call, the first one included.
        let max_attempts: u32 = parse_env("LLM_MAX_ATTEMPTS", 3)?;
        let base_delay_ms: u64 = parse_env("LLM_RETRY_BASE_MS", 1000)?;
        let evaluation_concurrency: usize = parse_env("EVALUATION_CONCURRENCY", 4)?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_api_key: optional_env("LLM_API_KEY"),
            llm_api_url: optional_env("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            llm_model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 120)?),
            retry: RetryPolicy {
                max_attempts: max_attempts.max(1),
                base_delay: Duration::from_millis(base_delay_ms),
            },
            rubric_path: optional_env("RUBRIC_PATH").map(PathBuf::from),
            template_path: optional_env("TEMPLATE_PATH").map(PathBuf::from),
            evaluation_concurrency: evaluation_concurrency.max(1),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            report_format: parse_env("REPORT_FORMAT", ReportFormat::Csv)?,
        })
    }

    /// Model endpoint settings; the credential is supplied per run.
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_url: self.llm_api_url.clone(),
            model: self.llm_model.clone(),
            timeout: self.llm_timeout,
            retry: self.retry,
        }
    }
}

/// Returns the variable when it is set and not blank.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
