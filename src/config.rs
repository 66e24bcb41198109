use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

pub const API_KEY_VAR: &str = "LMNR_PROJECT_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.lmnr.ai";
const DEFAULT_HTTP_PORT: u16 = 443;
const DEFAULT_GRPC_PORT: u16 = 8443;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Clone)]
pub struct Config {
    pub project_api_key: String,
    pub base_url: String,
    pub http_port: u16,
    pub grpc_port: u16,
    pub request_timeout_secs: u64,
    pub batch_size: usize,
    pub env: HashMap<String, String>,
}

impl Config {
    // An empty key falls back to the environment, then .env.
    pub fn new(project_api_key: impl Into<String>) -> Result<Self> {
        let explicit = project_api_key.into();
        let key = resolve_api_key(
            Some(explicit.as_str()),
            |var| std::env::var(var).ok(),
            None,
        )?;
        Ok(Self::with_key(key))
    }

    pub fn from_env() -> Result<Self> {
        let key = resolve_api_key(None, |var| std::env::var(var).ok(), None)?;
        let mut config = Self::with_key(key);
        if let Some(base_url) = std::env::var("LMNR_BASE_URL").ok().filter(|v| !v.is_empty()) {
            config = config.with_base_url(base_url);
        }
        config.http_port = env_parse("LMNR_HTTP_PORT", DEFAULT_HTTP_PORT);
        config.grpc_port = env_parse("LMNR_GRPC_PORT", DEFAULT_GRPC_PORT);
        config.request_timeout_secs = env_parse("LMNR_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        config.batch_size = env_parse("LMNR_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        config.validate()?;
        Ok(config)
    }

    fn with_key(project_api_key: String) -> Self {
        Self {
            project_api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            grpc_port: DEFAULT_GRPC_PORT,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            env: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_grpc_port(mut self, port: u16) -> Self {
        self.grpc_port = port;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = timeout_secs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_api_key.is_empty() {
            return Err(Error::Configuration("project API key is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Configuration(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    pub fn http_url(&self) -> String {
        format!("{}:{}", self.base_url, self.http_port)
    }

    pub fn grpc_url(&self) -> String {
        format!("{}:{}", self.base_url, self.grpc_port)
    }

    pub fn print_banner(&self) {
        tracing::info!("╔══════════════════════════════════════════════════╗");
        tracing::info!("║           lmnr-eval v{}                     ║", env!("CARGO_PKG_VERSION"));
        tracing::info!("╠══════════════════════════════════════════════════╣");
        tracing::info!("║  HTTP endpoint:     {:<28}║", self.http_url());
        tracing::info!("║  gRPC endpoint:     {:<28}║", self.grpc_url());
        tracing::info!("║  API key:           {:<28}║", redact(&self.project_api_key));
        tracing::info!("║  Batch size:        {:<28}║", self.batch_size);
        tracing::info!("║  Request timeout:   {:<25}s ║", self.request_timeout_secs);
        tracing::info!("╚══════════════════════════════════════════════════╝");
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("project_api_key", &redact(&self.project_api_key))
            .field("base_url", &self.base_url)
            .field("http_port", &self.http_port)
            .field("grpc_port", &self.grpc_port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("batch_size", &self.batch_size)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub fn resolve_api_key<F>(
    explicit: Option<&str>,
    lookup_env: F,
    dotenv_path: Option<&Path>,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    if let Some(key) = lookup_env(API_KEY_VAR).filter(|k| !k.is_empty()) {
        return Ok(key);
    }
    if let Some(key) = read_dotenv_key(dotenv_path, API_KEY_VAR) {
        return Ok(key);
    }
    Err(Error::Configuration(format!(
        "Please provide your project API key or set the {} \
         variable in your environment or .env file",
        API_KEY_VAR
    )))
}

fn read_dotenv_key(path: Option<&Path>, key: &str) -> Option<String> {
    let found = match path {
        Some(p) => dotenv::from_path_iter(p).ok()?.find_map(|item| match item {
            Ok((k, v)) if k == key => Some(v),
            _ => None,
        }),
        None => dotenv::dotenv_iter().ok()?.find_map(|item| match item {
            Ok((k, v)) if k == key => Some(v),
            _ => None,
        }),
    };
    found.filter(|v| !v.is_empty())
}

fn redact(key: &str) -> String {
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", key.chars().take(4).collect::<String>())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
