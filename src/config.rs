use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable holding the transcription service credential. It is
/// read once at startup and never stored in the config file.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Push-to-talk key name, e.g. "SCROLLLOCK" or "F13".
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// Longest recording kept; holding the key past this drops the tail.
    #[serde(default = "default_max_record_secs")]
    pub max_record_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_audio_feedback")]
    pub audio_feedback: bool,

    #[serde(default)]
    pub word_overrides: HashMap<String, String>,
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/audio/transcriptions".to_string()
}

fn default_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

fn default_hotkey() -> String {
    "SCROLLLOCK".to_string()
}

fn default_max_record_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_audio_feedback() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            hotkey: default_hotkey(),
            max_record_secs: default_max_record_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            audio_feedback: default_audio_feedback(),
            word_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from ~/.config/whisperkey/config.json, writing the
    /// defaults there on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("whisperkey").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            bail!("endpoint cannot be empty");
        }

        if self.model.is_empty() {
            bail!("model cannot be empty");
        }

        crate::hotkey::parse_key(&self.hotkey)?;

        if self.max_record_secs == 0 || self.max_record_secs > 300 {
            bail!("max_record_secs must be between 1 and 300");
        }

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }

        Ok(())
    }
}

/// Read the service credential from the environment; a missing or empty
/// credential is fatal at startup.
pub fn api_key() -> Result<String> {
    let key = std::env::var(API_KEY_ENV)
        .with_context(|| format!("{} environment variable not set", API_KEY_ENV))?;
    if key.trim().is_empty() {
        bail!("{} environment variable is empty", API_KEY_ENV);
    }
    Ok(key)
}
