use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{defaults, endpoints, models};
use crate::error::ReviewError;
use crate::llm::{LlmClient, OpenAIClient};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub review: ReviewSettings,
    #[serde(default)]
    pub forges: ForgeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    /// Key persisted in the settings file. `api_key_env` wins when it is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Language used for the instructions, the reviewer persona and status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl std::str::FromStr for Language {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "fr" | "french" | "français" => Ok(Self::Fr),
            other => Err(ReviewError::Config(format!("Unknown language: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    pub language: Language,
    pub max_chunk_chars: usize,
    /// Files whose source path contains any of these are left out of the review.
    pub ignored_paths: Vec<String>,
    pub close_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    pub github_token_env: String,
    pub gitlab_token_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_OPENAI_MODEL.to_string(),
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
            api_key: None,
            api_key_env: defaults::API_KEY_ENV.to_string(),
            temperature: None,
        }
    }
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            max_chunk_chars: defaults::MAX_CHUNK_CHARS,
            ignored_paths: defaults::IGNORED_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            close_delay_secs: defaults::CLOSE_DELAY_SECS,
        }
    }
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            github_token_env: defaults::GITHUB_TOKEN_ENV.to_string(),
            gitlab_token_env: defaults::GITLAB_TOKEN_ENV.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("diffsage")
            .join("config.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), ReviewError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ReviewError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReviewError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The chat API key: the environment variable named by `api_key_env`,
    /// else the key stored in the settings file. Empty values count as absent.
    pub fn api_key(&self) -> Option<String> {
        let from_env = if self.llm.api_key_env.is_empty() {
            None
        } else {
            std::env::var(&self.llm.api_key_env).ok()
        };
        from_env
            .or_else(|| self.llm.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn github_token(&self) -> Option<String> {
        read_token(&self.forges.github_token_env)
    }

    pub fn gitlab_token(&self) -> Option<String> {
        read_token(&self.forges.gitlab_token_env)
    }

    /// Build the chat client for `api_key` from the current settings.
    pub fn build_llm_client(&self, api_key: &str) -> Box<dyn LlmClient> {
        let mut client = OpenAIClient::new(api_key)
            .with_model(&self.llm.model)
            .with_base_url(&self.llm.base_url);
        if let Some(temperature) = self.llm.temperature {
            client = client.with_temperature(temperature);
        }
        Box::new(client)
    }
}

fn read_token(env: &str) -> Option<String> {
    if env.is_empty() {
        return None;
    }
    std::env::var(env).ok().filter(|t| !t.is_empty())
}
