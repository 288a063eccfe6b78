// Configuration
// Loaded once at startup from a TOML file, with environment overrides

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use serde::Deserialize;
use tracing::debug;

use crate::types::ModelTier;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai: OpenAiSection,
    pub models: ModelsSection,
    pub directories: DirectoriesSection,
    pub options: OptionsSection,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub api_base: String,
    /// No timeout when unset
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsSection {
    pub standard: String,
    pub advanced: String,
    /// Dollars per 1000 tokens
    pub standard_price_per_1k: f64,
    pub advanced_price_per_1k: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoriesSection {
    pub archive_directory: PathBuf,
    pub usage_history_file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionsSection {
    pub show_tokens: bool,
    pub notifications: bool,
    pub prepend_history: bool,
    pub sound_file: Option<PathBuf>,
    pub system_prompt: Option<String>,
}

/// Replace a leading "~" with the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl Default for OpenAiSection {
    fn default() -> Self {
        OpenAiSection {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for OpenAiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSection")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ModelsSection {
    fn default() -> Self {
        ModelsSection {
            standard: "gpt-3.5-turbo".to_string(),
            advanced: "gpt-4".to_string(),
            standard_price_per_1k: 0.002,
            advanced_price_per_1k: 0.03,
        }
    }
}

impl Default for DirectoriesSection {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fpt");
        DirectoriesSection {
            archive_directory: base.join("archive"),
            usage_history_file: base.join("history.md"),
        }
    }
}

impl Config {
    /// Default config location: <config dir>/fpt/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fpt").join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply environment overrides.
    ///
    /// An explicit path must exist; a missing default file means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Config::default(),
            },
        };

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.openai.api_key = Some(api_key);
        }
        if let Ok(api_base) = std::env::var("OPENAI_BASE_URL") {
            config.openai.api_base = api_base;
        }

        debug!(?config, "loaded configuration");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        let directories = &mut config.directories;
        directories.archive_directory = expand_home(&directories.archive_directory);
        directories.usage_history_file = expand_home(&directories.usage_history_file);
        config.options.sound_file = config.options.sound_file.as_deref().map(expand_home);
        Ok(config)
    }

    pub fn api_key(&self) -> Result<&str> {
        self.openai
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| eyre!("No API key configured. Set [openai] api_key or OPENAI_API_KEY"))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.openai.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.models.standard,
            ModelTier::Advanced => &self.models.advanced,
        }
    }

    /// Price in dollars per 1000 tokens for a model name; unknown names use the standard price
    pub fn price_for_model(&self, model: &str) -> f64 {
        if model == self.models.advanced {
            self.models.advanced_price_per_1k
        } else {
            self.models.standard_price_per_1k
        }
    }

    /// Create the archive directory and an empty history file if missing
    pub fn ensure_storage(&self) -> Result<()> {
        let archive = &self.directories.archive_directory;
        fs::create_dir_all(archive)
            .with_context(|| format!("Failed to create directory: {}", archive.display()))?;

        let history = &self.directories.usage_history_file;
        if !history.exists() {
            if let Some(parent) = history.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            fs::File::create(history)
                .with_context(|| format!("Failed to create {}", history.display()))?;
        }
        Ok(())
    }
}
