use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::dispatcher::ProviderConfig;
use crate::prompt::INTERVIEW_COACH_PROMPT;
use crate::provider::Provider;

/// User settings: provider selection and credentials
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            api_key: None,
            model: None,
            system_prompt: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn provider_id(&self) -> &str {
        self.provider.as_deref().unwrap_or("gemini")
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(INTERVIEW_COACH_PROMPT)
    }

    /// Per-call settings for the dispatcher. A provider-specific environment
    /// variable takes precedence over the stored key.
    pub fn provider_config(&self) -> ProviderConfig {
        let env_key = self
            .provider_id()
            .parse::<Provider>()
            .ok()
            .and_then(|p| std::env::var(p.api_key_env()).ok())
            .filter(|k| !k.trim().is_empty());

        ProviderConfig {
            provider: self.provider_id().to_string(),
            credential: env_key.or_else(|| self.api_key.clone()).unwrap_or_default(),
            model: self.model.clone(),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("quickinterview").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.provider_id(), "gemini");
        assert_eq!(config.system_prompt(), INTERVIEW_COACH_PROMPT);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            provider: Some("claude".to_string()),
            api_key: Some("sk-ant-123".to_string()),
            model: Some("claude-3-5-haiku-20241022".to_string()),
            system_prompt: Some("Be terse.".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.system_prompt(), "Be terse.");
    }

    #[test]
    fn test_provider_config_uses_stored_key() {
        // an unknown provider id has no env override to consult
        let config = Config {
            provider: Some("local".to_string()),
            api_key: Some("stored".to_string()),
            model: None,
            system_prompt: None,
        };
        let provider_config = config.provider_config();
        assert_eq!(provider_config.provider, "local");
        assert_eq!(provider_config.credential, "stored");
        assert!(provider_config.has_credential());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
