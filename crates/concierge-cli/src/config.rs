//! Application configuration.
//!
//! Loaded from a TOML file (`config/default.toml` by default). Every field
//! has a default, so a missing file or section still yields a working
//! configuration. Environment variables are read after `.env` is loaded:
//!
//! - the API key comes from the variable named by `[llm].api_key_env`,
//! - `CONCIERGE_MODEL` overrides `[llm].model`,
//! - `CONCIERGE_LLM_BASE_URL` overrides `[llm].base_url`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use concierge_agent::{LlmClientConfig, RunnerConfig};
use concierge_intent::RouterConfig;

pub const MODEL_ENV: &str = "CONCIERGE_MODEL";
pub const BASE_URL_ENV: &str = "CONCIERGE_LLM_BASE_URL";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub router: RouterConfig,
    pub agents: AgentsSection,
    pub store: StoreSection,
    pub context: ContextSection,
}

/// Wire protocol of the configured model endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: ProviderKind,
    pub model: String,
    /// Empty means the provider's default endpoint.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "llama3.1".into(),
            base_url: String::new(),
            api_key_env: "CONCIERGE_API_KEY".into(),
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    #[serde(flatten)]
    pub runner: RunnerConfig,
    /// Sender used when none is given on the command line.
    pub default_sender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub data_dir: PathBuf,
    pub database: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database: "concierge.db".into(),
        }
    }
}

impl StoreSection {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    /// TOML file with people, projects and glossary.
    pub directory: PathBuf,
    /// Directory scanned for the most recent meeting transcript.
    pub transcripts_dir: PathBuf,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("config/context.toml"),
            transcripts_dir: PathBuf::from("data/transcripts"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Build the LLM client settings, applying environment overrides
    /// through `env`.
    pub fn llm_client_config(&self, env: impl Fn(&str) -> Option<String>) -> Result<LlmClientConfig> {
        let llm = &self.llm;
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let model = non_empty(MODEL_ENV).unwrap_or_else(|| llm.model.clone());
        let base_url = non_empty(BASE_URL_ENV).or_else(|| {
            (!llm.base_url.trim().is_empty()).then(|| llm.base_url.clone())
        });
        let api_key = non_empty(&llm.api_key_env);

        let mut config = match llm.provider {
            ProviderKind::Ollama => LlmClientConfig::ollama(model),
            ProviderKind::OpenAI | ProviderKind::Anthropic => {
                let Some(key) = api_key.clone() else {
                    bail!(
                        "{:?} requires an API key in ${}",
                        llm.provider,
                        llm.api_key_env
                    );
                };
                if llm.provider == ProviderKind::Anthropic {
                    LlmClientConfig::anthropic(key, model)
                } else {
                    LlmClientConfig::openai(key, model)
                }
            }
        };
        if let Some(url) = base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = api_key {
            config.api_key = key;
        }
        config.max_tokens = llm.max_tokens;
        config.timeout = Duration::from_secs(llm.timeout_secs);
        Ok(config)
    }
}

/// Read an environment variable, treating unset and invalid as absent.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
