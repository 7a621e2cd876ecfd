//! Runtime configuration.
//!
//! Everything is resolved once at startup and handed to the services, so
//! request handling never reads the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use health_chat_core::DEFAULT_HISTORY_TOKENS;
use health_chat_llm::{LlmConfig, LlmError, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_PROVIDER};
use thiserror::Error;

use crate::graph::GraphConfig;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DB_PATH: &str = "health_chat.sqlite3";
pub const DEFAULT_NEO4J_DATABASE: &str = "neo4j";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How entities are pulled out of patient messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    #[default]
    Keyword,
    Llm,
}

impl FromStr for ExtractionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "llm" => Ok(Self::Llm),
            _ => Err(()),
        }
    }
}

/// Settings for the whole application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub llm: LlmConfig,
    pub extraction: ExtractionMode,
    /// `None` disables the knowledge graph.
    pub graph: Option<GraphConfig>,
    pub require_future_appointments: bool,
    pub history_max_tokens: usize,
}

impl AppConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = parse_or("HEALTH_CHAT_ADDR", get("HEALTH_CHAT_ADDR"), DEFAULT_ADDR)?;
        let db_path = PathBuf::from(get("HEALTH_CHAT_DB").unwrap_or_else(|| DEFAULT_DB_PATH.into()));

        let provider = get("LLM_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.into());
        let model = get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let api_key = get("LLM_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or(ConfigError::Missing("LLM_API_KEY"))?;
        let timeout_secs: u64 = parse_or(
            "LLM_TIMEOUT_SECS",
            get("LLM_TIMEOUT_SECS"),
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )?;
        let llm = LlmConfig::new(&provider, &model, &api_key)?
            .with_base_url(&get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()))
            .with_timeout(Duration::from_secs(timeout_secs));

        let extraction = parse_or("ENTITY_EXTRACTION", get("ENTITY_EXTRACTION"), "keyword")?;

        let graph = match get("NEO4J_URI") {
            Some(uri) => Some(GraphConfig {
                uri: uri.trim_end_matches('/').to_string(),
                user: get("NEO4J_USER").unwrap_or_default(),
                password: get("NEO4J_PASSWORD").unwrap_or_default(),
                database: get("NEO4J_DATABASE").unwrap_or_else(|| DEFAULT_NEO4J_DATABASE.into()),
                timeout: Duration::from_secs(timeout_secs),
            }),
            None => None,
        };

        let require_future_appointments = match get("REQUIRE_FUTURE_APPOINTMENTS") {
            Some(value) => parse_bool("REQUIRE_FUTURE_APPOINTMENTS", &value)?,
            None => false,
        };

        let history_max_tokens = parse_or(
            "HISTORY_MAX_TOKENS",
            get("HISTORY_MAX_TOKENS"),
            &DEFAULT_HISTORY_TOKENS.to_string(),
        )?;

        Ok(Self {
            addr,
            db_path,
            llm,
            extraction,
            graph,
            require_future_appointments,
            history_max_tokens,
        })
    }
}

fn parse_or<T: FromStr>(var: &'static str, value: Option<String>, default: &str) -> ConfigResult<T> {
    let value = value.unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}

fn parse_bool(var: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}
