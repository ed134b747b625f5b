//! Configuration
//!
//! Environment-driven configuration with no hardcoded credentials.
//! Exactly one knowledge backend must be configured: a store path for
//! direct mode or a tool endpoint URL for tool mode.

use std::path::PathBuf;

use crate::error::{EmberError, Result};

pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 128_000;
pub const DEFAULT_PRIORITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_CACHE_ITEMS: usize = 100;
pub const DEFAULT_PROJECT: &str = "ember";

const ENV_MAX_CONTEXT_TOKENS: &str = "EMBER_MAX_CONTEXT_TOKENS";
const ENV_PRIORITY_THRESHOLD: &str = "EMBER_CACHE_PRIORITY_THRESHOLD";
const ENV_MAX_CACHE_ITEMS: &str = "EMBER_MAX_CACHE_ITEMS";
const ENV_PROJECT: &str = "EMBER_PROJECT";
const ENV_STORE_PATH: &str = "EMBER_STORE_PATH";
const ENV_TOOL_ENDPOINT: &str = "EMBER_TOOL_ENDPOINT";

/// Where knowledge comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Direct queries against a local knowledge store
    Direct { path: PathBuf },
    /// Calls forwarded to a tool registry endpoint
    Tool { endpoint: String },
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EmberConfig {
    pub max_context_tokens: usize,
    /// Priority gate for cache admission, in [0,1]
    pub cache_priority_threshold: f64,
    pub max_cache_items: usize,
    /// Default project name used in warming context and the project layer
    pub project: String,
    pub backend: StoreBackend,
}

impl EmberConfig {
    /// Direct-mode configuration with defaults
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            cache_priority_threshold: DEFAULT_PRIORITY_THRESHOLD,
            max_cache_items: DEFAULT_MAX_CACHE_ITEMS,
            project: DEFAULT_PROJECT.to_string(),
            backend: StoreBackend::Direct { path: path.into() },
        }
    }

    /// Tool-mode configuration with defaults
    pub fn tool(endpoint: impl Into<String>) -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            cache_priority_threshold: DEFAULT_PRIORITY_THRESHOLD,
            max_cache_items: DEFAULT_MAX_CACHE_ITEMS,
            project: DEFAULT_PROJECT.to_string(),
            backend: StoreBackend::Tool {
                endpoint: endpoint.into(),
            },
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_path = lookup(ENV_STORE_PATH).filter(|v| !v.is_empty());
        let endpoint = lookup(ENV_TOOL_ENDPOINT).filter(|v| !v.is_empty());

        let backend = match (store_path, endpoint) {
            (Some(path), None) => StoreBackend::Direct { path: path.into() },
            (None, Some(endpoint)) => StoreBackend::Tool { endpoint },
            (Some(_), Some(_)) => {
                return Err(EmberError::Config(format!(
                    "{ENV_STORE_PATH} and {ENV_TOOL_ENDPOINT} are mutually exclusive"
                )));
            }
            (None, None) => {
                return Err(EmberError::Config(format!(
                    "either {ENV_STORE_PATH} or {ENV_TOOL_ENDPOINT} must be set"
                )));
            }
        };

        let config = Self {
            max_context_tokens: parse_or(
                lookup(ENV_MAX_CONTEXT_TOKENS),
                ENV_MAX_CONTEXT_TOKENS,
                DEFAULT_MAX_CONTEXT_TOKENS,
            )?,
            cache_priority_threshold: parse_or(
                lookup(ENV_PRIORITY_THRESHOLD),
                ENV_PRIORITY_THRESHOLD,
                DEFAULT_PRIORITY_THRESHOLD,
            )?,
            max_cache_items: parse_or(
                lookup(ENV_MAX_CACHE_ITEMS),
                ENV_MAX_CACHE_ITEMS,
                DEFAULT_MAX_CACHE_ITEMS,
            )?,
            project: lookup(ENV_PROJECT).unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            backend,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges; fatal at construction
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cache_priority_threshold) {
            return Err(EmberError::Config(format!(
                "cache priority threshold {} outside [0,1]",
                self.cache_priority_threshold
            )));
        }
        if self.project.is_empty() {
            return Err(EmberError::Config("project name must not be empty".into()));
        }
        if let StoreBackend::Tool { endpoint } = &self.backend {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(EmberError::Config(format!(
                    "tool endpoint {endpoint} is not an http(s) URL"
                )));
            }
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| EmberError::Config(format!("cannot parse {key}={raw}"))),
        None => Ok(default),
    }
}
