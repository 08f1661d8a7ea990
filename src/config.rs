// Application configuration, read from the environment (and `.env` via dotenv).

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
const DEFAULT_SCOPES: &str = "Files.Read.All offline_access";
const OFFLINE_ACCESS: &str = "offline_access";
const DEFAULT_TOKEN_CACHE_PATH: &str = "data/token_cache.bin";
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_PERPLEXITY_MODEL: &str = "sonar";
const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly assistant helping me with my notes. Keep answers brief.";
const DEFAULT_NOTES_METADATA_PATH: &str = "data/notes_metadata.json";
const DEFAULT_THREADS_DB_PATH: &str = "data/threads.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    client_id: Option<String>,
    pub authority: String,
    pub scopes: Vec<String>,
    pub token_cache_path: PathBuf,
    pub drive_id: Option<String>,
    pub graph_base_url: String,
    perplexity_api_key: Option<String>,
    pub perplexity_model: String,
    pub perplexity_base_url: String,
    pub system_prompt: String,
    pub notes_metadata_path: PathBuf,
    pub threads_db_path: String,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any name -> value lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "HTTP_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            client_id: get("CLIENT_ID"),
            authority: or("AUTHORITY", DEFAULT_AUTHORITY),
            scopes: parse_scopes(&or("SCOPES", DEFAULT_SCOPES)),
            token_cache_path: PathBuf::from(or("TOKEN_CACHE_PATH", DEFAULT_TOKEN_CACHE_PATH)),
            drive_id: get("ONEDRIVE_DOCUMENTS_FOLDER_ID"),
            graph_base_url: or("GRAPH_BASE_URL", DEFAULT_GRAPH_BASE_URL),
            perplexity_api_key: get("PERPLEXITY_API_KEY"),
            perplexity_model: or("PERPLEXITY_MODEL", DEFAULT_PERPLEXITY_MODEL),
            perplexity_base_url: or("PERPLEXITY_BASE_URL", DEFAULT_PERPLEXITY_BASE_URL),
            system_prompt: or("ASSISTANT_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            notes_metadata_path: PathBuf::from(or(
                "NOTES_METADATA_PATH",
                DEFAULT_NOTES_METADATA_PATH,
            )),
            threads_db_path: or("THREADS_DB_PATH", DEFAULT_THREADS_DB_PATH),
            http_timeout,
        })
    }

    pub fn client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .ok_or(ConfigError::Missing("CLIENT_ID"))
    }

    pub fn perplexity_api_key(&self) -> Result<&str, ConfigError> {
        self.perplexity_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("PERPLEXITY_API_KEY"))
    }
}

/// Splits on spaces or commas and makes sure refresh tokens are requested.
fn parse_scopes(raw: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in raw.split(|c: char| c.is_whitespace() || c == ',') {
        if !scope.is_empty() && !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_string());
        }
    }
    if !scopes.iter().any(|s| s == OFFLINE_ACCESS) {
        scopes.push(OFFLINE_ACCESS.to_string());
    }
    scopes
}
