//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_config_or_default`]) yields a working setup as long as
//! the API key environment variable is set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use study_forge_core::policy::ModelPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    /// Used whenever the prompt carries extracted text.
    #[serde(default = "default_fast_model")]
    pub fast: String,
    /// Used when the raw document has to be analysed multimodally.
    #[serde(default = "default_capable_model")]
    pub capable: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_model(),
            capable: default_capable_model(),
        }
    }
}

impl ModelsConfig {
    pub fn policy(&self) -> ModelPolicy {
        ModelPolicy::two_tier(self.fast.clone(), self.capable.clone())
    }
}

fn default_fast_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_capable_model() -> String {
    "gemini-2.5-flash".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,
    #[serde(default = "default_overload_base_ms")]
    pub overload_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_base_ms: default_rate_limit_base_ms(),
            overload_base_ms: default_overload_base_ms(),
        }
    }
}

impl RetryConfig {
    pub fn rate_limit_base(&self) -> Duration {
        Duration::from_millis(self.rate_limit_base_ms)
    }

    pub fn overload_base(&self) -> Duration {
        Duration::from_millis(self.overload_base_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_rate_limit_base_ms() -> u64 {
    2000
}
fn default_overload_base_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Upload ceiling enforced before any extraction or network call.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> u64 {
    20 * 1024 * 1024
}

/// Commented starter file written by `forge init-config`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# Study Forge configuration

[completion]
base_url = "https://generativelanguage.googleapis.com"
# Environment variable that holds the API key.
api_key_env = "GEMINI_API_KEY"
timeout_secs = 120
temperature = 0.4

[models]
# Text prompts (extraction succeeded).
fast = "gemini-2.5-flash-lite"
# Raw-byte prompts (scanned PDFs, images, text files).
capable = "gemini-2.5-flash"

[retry]
# At most 3.
max_attempts = 3
rate_limit_base_ms = 2000
overload_base_ms = 1000

[documents]
max_bytes = 20971520
"#;

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` when it exists, otherwise fall back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    // Validate completion
    if config.completion.base_url.trim().is_empty() {
        anyhow::bail!("completion.base_url must not be empty");
    }
    if config.completion.api_key_env.trim().is_empty() {
        anyhow::bail!("completion.api_key_env must not be empty");
    }
    if config.completion.timeout_secs == 0 {
        anyhow::bail!("completion.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    // Validate models
    if config.models.fast.trim().is_empty() || config.models.capable.trim().is_empty() {
        anyhow::bail!("models.fast and models.capable must both be set");
    }

    // Validate retry
    if !(1..=3).contains(&config.retry.max_attempts) {
        anyhow::bail!("retry.max_attempts must be between 1 and 3");
    }
    if config.retry.rate_limit_base_ms == 0 || config.retry.overload_base_ms == 0 {
        anyhow::bail!("retry base delays must be > 0");
    }

    // Validate documents
    if config.documents.max_bytes == 0 {
        anyhow::bail!("documents.max_bytes must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.models.fast, "gemini-2.5-flash-lite");
        assert_eq!(config.completion.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.documents.max_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn starter_file_parses() {
        let config = parse_config(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(config.retry.rate_limit_base_ms, 2000);
        assert_eq!(config.models.capable, "gemini-2.5-flash");
    }

    #[test]
    fn rejects_more_than_three_attempts() {
        let err = parse_config("[retry]\nmax_attempts = 5\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn rejects_bad_temperature_and_empty_model() {
        assert!(parse_config("[completion]\ntemperature = 3.5\n").is_err());
        assert!(parse_config("[models]\nfast = \"\"\n").is_err());
    }

    #[test]
    fn models_build_two_tier_policy() {
        use study_forge_core::policy::RequestTraits;
        let config = parse_config("[models]\nfast = \"f\"\ncapable = \"c\"\n").unwrap();
        let policy = config.models.policy();
        assert_eq!(policy.select(RequestTraits::text()), Some("f"));
        assert_eq!(policy.select(RequestTraits::raw_bytes()), Some("c"));
    }

    #[test]
    fn load_from_disk_and_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("forge.toml");
        std::fs::write(&path, "[retry]\noverload_base_ms = 50\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.retry.overload_base_ms, 50);

        let missing = tmp.path().join("nope.toml");
        assert!(load_config(&missing).is_err());
        assert_eq!(
            load_config_or_default(&missing).unwrap().retry.max_attempts,
            3
        );
    }
}
