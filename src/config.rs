use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, AutoTranslateError};

// Default values for fields added after the first config format
fn default_temperature() -> f32 {
    0.2
}

fn default_ensure_batch_ceiling() -> usize {
    10
}

fn default_admin_batch_size() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub completion: CompletionConfig,
    pub locales: LocaleConfig,
    pub scheduler: SchedulerConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API (without the trailing /chat/completions)
    pub endpoint: String,
    /// Model used for translation
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Directory containing one <lang>.json file per language
    pub directory: PathBuf,
    /// Authoritative language every other tree is filled from
    pub source_language: String,
    /// Languages the storefront offers, source language included
    pub supported_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before a trigger runs, collapsing rapid language changes
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding the product catalog
    pub path: PathBuf,
    /// Translatable base fields; localized copies are stored as <field>_<lang>
    pub fields: Vec<String>,
    /// Maximum entities the ensurer starts per invocation
    #[serde(default = "default_ensure_batch_ceiling")]
    pub ensure_batch_ceiling: usize,
    /// Maximum entities packed into one admin batch call
    #[serde(default = "default_admin_batch_size")]
    pub admin_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: 120,
                temperature: default_temperature(),
            },
            locales: LocaleConfig {
                directory: PathBuf::from("locales"),
                source_language: "en".to_string(),
                supported_languages: ["en", "es", "fr", "pt", "zh"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            scheduler: SchedulerConfig {
                debounce_ms: 2000,
            },
            catalog: CatalogConfig {
                path: PathBuf::from("catalog.json"),
                fields: vec!["name".to_string(), "description".to_string()],
                ensure_batch_ceiling: default_ensure_batch_ceiling(),
                admin_batch_size: default_admin_batch_size(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AutoTranslateError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AutoTranslateError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AutoTranslateError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AutoTranslateError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Languages that receive translations: every supported language except the source
    pub fn target_languages(&self) -> Vec<String> {
        self.locales
            .supported_languages
            .iter()
            .filter(|lang| **lang != self.locales.source_language)
            .cloned()
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !self.locales.supported_languages.contains(&self.locales.source_language) {
            return Err(AutoTranslateError::Config(format!(
                "source language '{}' must be listed in supported_languages",
                self.locales.source_language
            )));
        }
        if self.catalog.ensure_batch_ceiling == 0 || self.catalog.admin_batch_size == 0 {
            return Err(AutoTranslateError::Config(
                "catalog batch sizes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
