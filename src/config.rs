use crate::error::{Error, Result};
use crate::llm::Provider;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Env var holding the key when `api_key` is unset.
    pub api_key_env: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            api_key: None,
            api_key_env: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// Word budget for the catalog listing in the selection prompt.
    #[serde(default = "default_catalog_word_budget")]
    pub catalog_word_budget: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            catalog_word_budget: default_catalog_word_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// Defaults
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_catalog_word_budget() -> usize {
    1200
}
fn default_max_concurrency() -> usize {
    4
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

/// Source of environment overrides; a closure in tests, `std::env::var` otherwise.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F: Fn(&str) -> Option<String>> EnvSource for F {
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// File (if present) then environment.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env(&process_env)?;
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &impl EnvSource) -> Result<()> {
        if let Some(v) = env.get("LLM_PROVIDER") {
            self.llm.provider = v.parse()?;
        }
        if let Some(v) = env.get("LLM_API_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = env.get("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if self.llm.provider == Provider::Gemini
            && self.llm.api_key.is_none()
            && let Some(v) = env.get("GEMINI_API_KEY")
        {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env.get("LLM_MODEL_NAME") {
            self.llm.model = v;
        }
        if let Some(v) = env.get("LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = env.get("LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("LLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = env.get("LLM_TIMEOUT") {
            self.llm.timeout_secs = parse_env("LLM_TIMEOUT", &v)?;
        }
        if let Some(v) = env.get("LLM_MAX_RETRIES") {
            self.llm.max_attempts = parse_env("LLM_MAX_RETRIES", &v)?;
        }
        if let Some(v) = env.get("LLM_RETRY_DELAY") {
            let secs: f64 = parse_env("LLM_RETRY_DELAY", &v)?;
            self.llm.retry_base_delay_ms = (secs * 1000.0).round().max(0.0) as u64;
        }
        if let Some(v) = env.get("THINKING_MODELS_DIR") {
            self.catalog.models_dir = PathBuf::from(v);
        }
        if let Some(v) = env.get("WEB_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env.get("WEB_PORT") {
            self.server.port = parse_env("WEB_PORT", &v)?;
        }
        if let Some(v) = env.get("LOG_LEVEL") {
            self.log_level = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::config("llm.temperature must be between 0 and 2"));
        }
        if self.llm.max_tokens < 1 {
            return Err(Error::config("llm.max_tokens must be positive"));
        }
        if self.llm.max_attempts < 1 {
            return Err(Error::config("llm.max_attempts must be at least 1"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::config("llm.timeout_secs must be positive"));
        }
        if self.prompt.catalog_word_budget == 0 {
            return Err(Error::config("prompt.catalog_word_budget must be positive"));
        }
        if self.batch.max_concurrency == 0 {
            return Err(Error::config("batch.max_concurrency must be at least 1"));
        }
        if self.server.port == 0 {
            return Err(Error::config("server.port must be between 1 and 65535"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} has invalid value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
log_level = "debug"

[llm]
provider = "anthropic"
model = "claude-test"
temperature = 0.2
max_tokens = 512
timeout_secs = 10
max_attempts = 5

[catalog]
models_dir = "library"

[prompt]
catalog_word_budget = 600

[batch]
parallel = true
max_concurrency = 8

[server]
host = "0.0.0.0"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.catalog.models_dir, PathBuf::from("library"));
        assert_eq!(config.prompt.catalog_word_budget, 600);
        assert!(config.batch.parallel);
        assert_eq!(config.server.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.retry_base_delay_ms, 1000);
        assert_eq!(config.prompt.catalog_word_budget, 1200);
        assert!(!config.batch.parallel);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(&env(&[
                ("LLM_API_URL", "http://localhost:11434"),
                ("LLM_TEMPERATURE", "1.5"),
                ("LLM_MAX_RETRIES", "5"),
                ("LLM_RETRY_DELAY", "0.25"),
                ("THINKING_MODELS_DIR", "/srv/models"),
            ]))
            .unwrap();
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:11434"));
        assert!((config.llm.temperature - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.llm.retry_base_delay_ms, 250);
        assert_eq!(config.catalog.models_dir, PathBuf::from("/srv/models"));
    }

    #[test]
    fn gemini_key_used_for_gemini_provider() {
        let mut config = Config::default();
        config
            .apply_env(&env(&[("LLM_PROVIDER", "gemini"), ("GEMINI_API_KEY", "g-key")]))
            .unwrap();
        assert_eq!(config.llm.provider, Provider::Gemini);
        assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn malformed_env_value_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(&env(&[("LLM_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.llm.temperature = 2.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batch.max_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
