// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

/// Admin setting key holding the news provider key.
pub const NEWS_API_KEY_SETTING: &str = "NEWS_API_KEY";
/// Admin setting key holding the language-model gateway key.
pub const LLM_API_KEY_SETTING: &str = "LLM_API_KEY";

/// Minutes of test time granted per generated question.
pub const MINUTES_PER_GENERATED_QUESTION: i32 = 2;
/// Headlines requested from the news provider per run.
pub const NEWS_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How article titles are compared when de-duplicating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicyKind {
    Exact,
    #[default]
    Normalized,
}

impl FromStr for DedupPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "normalized" => Ok(Self::Normalized),
            other => Err(format!("unknown dedup policy '{other}'")),
        }
    }
}

/// Upstream providers used by the generation pipeline.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub news_api_base_url: String,
    /// Fallback when no admin setting is stored.
    pub news_api_key: Option<String>,
    pub news_country: String,
    pub news_category: String,
    pub llm_api_base_url: String,
    /// Fallback when no admin setting is stored.
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub upstream_timeout: Duration,
    pub dedup: DedupPolicyKind,
    pub news_refresh_interval: Option<Duration>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            news_api_base_url: "https://newsapi.org/v2".to_string(),
            news_api_key: None,
            news_country: "in".to_string(),
            news_category: "general".to_string(),
            llm_api_base_url: "https://ai.gateway.lovable.dev/v1".to_string(),
            llm_api_key: None,
            llm_model: "google/gemini-2.5-flash".to_string(),
            llm_temperature: 0.7,
            upstream_timeout: Duration::from_secs(60),
            dedup: DedupPolicyKind::Normalized,
            news_refresh_interval: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = parsed("BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            news_api_base_url: base_url("NEWS_API_BASE_URL", defaults.news_api_base_url)?,
            news_api_key: optional("NEWS_API_KEY"),
            news_country: optional("NEWS_COUNTRY").unwrap_or(defaults.news_country),
            news_category: optional("NEWS_CATEGORY").unwrap_or(defaults.news_category),
            llm_api_base_url: base_url("LLM_API_BASE_URL", defaults.llm_api_base_url)?,
            llm_api_key: optional("LLM_API_KEY"),
            llm_model: optional("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_temperature: parsed("LLM_TEMPERATURE")?.unwrap_or(defaults.llm_temperature),
            upstream_timeout: parsed("UPSTREAM_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
            dedup: parsed("ARTICLE_DEDUP")?.unwrap_or_default(),
            news_refresh_interval: parsed("NEWS_REFRESH_INTERVAL_SECS")?
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            generation,
        })
    }
}

/// Reads a variable, treating an empty value as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    optional(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn base_url(name: &'static str, default: String) -> Result<String, ConfigError> {
    let raw = optional(name).unwrap_or(default);
    Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    Ok(raw.trim_end_matches('/').to_string())
}
