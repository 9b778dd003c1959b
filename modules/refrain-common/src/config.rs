use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Analysis thresholds are not here; they live in per-component structs with defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Upstream comment API
    pub comment_api_base_url: String,
    pub comment_api_cookie: Option<String>,
    pub request_timeout_secs: u64,

    // Pacing and retry
    pub request_delay_ms: u64,
    pub cursor_delay_ms: u64,
    pub max_pages_per_year: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub sampler_seed: Option<u64>,

    // Knowledge lexicon overlay
    pub knowledge_dir: Option<PathBuf>,
}

pub const DEFAULT_COMMENT_API_BASE_URL: &str = "https://music.163.com";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            comment_api_base_url: std::env::var("COMMENT_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_COMMENT_API_BASE_URL.to_string()),
            comment_api_cookie: std::env::var("COMMENT_API_COOKIE")
                .ok()
                .filter(|c| !c.trim().is_empty()),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 15)?,
            request_delay_ms: env_or("REQUEST_DELAY_MS", 300)?,
            cursor_delay_ms: env_or("CURSOR_DELAY_MS", 500)?,
            max_pages_per_year: env_or("MAX_PAGES_PER_YEAR", 8)?,
            max_retries: env_or("MAX_RETRIES", 3)?,
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 500)?,
            sampler_seed: env_opt("SAMPLER_SEED")?,
            knowledge_dir: std::env::var("KNOWLEDGE_DIR").ok().map(PathBuf::from),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  COMMENT_API_BASE_URL: {}", self.comment_api_base_url);
        tracing::info!("  COMMENT_API_COOKIE: {}", preview_opt(&self.comment_api_cookie));
        tracing::info!(
            "  pacing: delay={}ms cursor_delay={}ms pages_per_year={} retries={} backoff_base={}ms timeout={}s seed={:?}",
            self.request_delay_ms,
            self.cursor_delay_ms,
            self.max_pages_per_year,
            self.max_retries,
            self.retry_base_delay_ms,
            self.request_timeout_secs,
            self.sampler_seed
        );
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env_opt(key)?.unwrap_or(default))
}

fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        _ => Ok(None),
    }
}
