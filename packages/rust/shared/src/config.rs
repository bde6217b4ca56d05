//! Application configuration for the outreach pipeline.
//!
//! User config lives at `~/.outreach/outreach.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outreach.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outreach";

// ---------------------------------------------------------------------------
// Config structs (matching outreach.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Research fetch settings.
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Wall-clock budget for a whole run, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl PipelineSettings {
    /// The deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_deadline_secs() -> u64 {
    60
}

/// `[scraper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Per-request fetch timeout in seconds.
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,

    /// Largest response body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Page text excerpt handed to the copy stage, in characters.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Upper bound on personalization snippets kept from research.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scraper_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_content_chars: default_max_content_chars(),
            max_snippets: default_max_snippets(),
        }
    }
}

fn default_scraper_timeout() -> u64 {
    15
}
fn default_max_body_bytes() -> u64 {
    2 * 1024 * 1024
}
fn default_max_content_chars() -> usize {
    10_000
}
fn default_max_snippets() -> usize {
    5
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when a task has no override.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Optional per-task model overrides.
    #[serde(default)]
    pub models: TaskModels,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            default_model: default_model(),
            timeout_secs: default_llm_timeout(),
            models: TaskModels::default(),
        }
    }
}

/// `[openrouter.models]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskModels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa: Option<String>,
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash".into()
}
fn default_llm_timeout() -> u64 {
    45
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.outreach/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OutreachError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.outreach/outreach.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutreachError::io(path, e))?;
    parse_config(&content, path)
}

/// Parse config text and check values serde cannot express.
fn parse_config(content: &str, origin: &Path) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)
        .map_err(|e| OutreachError::config(format!("failed to parse {}: {e}", origin.display())))?;

    if config.pipeline.deadline_secs == 0 {
        return Err(OutreachError::config(format!(
            "{}: pipeline.deadline_secs must be at least 1",
            origin.display()
        )));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OutreachError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OutreachError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OutreachError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(OutreachError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
