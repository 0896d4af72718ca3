//! Application configuration
//!
//! Values come from an optional TOML file, then environment overrides.
//!
//! # Example
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8001"
//! timeout_secs = 30
//!
//! [session]
//! persona = "Bob"
//! operator_label = "Operator"
//! positional_speakers = true
//!
//! [playback]
//! operator_delay_ms = 2000
//! persona_delay_ms = 1500
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::conversation::{SpeakerFallback, OPERATOR};

/// Environment variable naming the TOML file to load
pub const CONFIG_PATH_ENV: &str = "PERSONA_CHAT_CONFIG";

const BACKEND_URL_ENV: &str = "PERSONA_CHAT_BACKEND_URL";
const TIMEOUT_ENV: &str = "PERSONA_CHAT_TIMEOUT_SECS";
const PERSONA_ENV: &str = "PERSONA_CHAT_PERSONA";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Where the generation backend lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on any single backend call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("invalid backend URL '{}': {}", self.base_url, e))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Persona selected for this session
    #[serde(default)]
    pub persona: Option<String>,

    #[serde(default = "default_operator_label")]
    pub operator_label: String,

    /// Attribute unlabeled transcript lines by alternating position
    #[serde(default = "default_true")]
    pub positional_speakers: bool,
}

fn default_operator_label() -> String {
    OPERATOR.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persona: None,
            operator_label: default_operator_label(),
            positional_speakers: true,
        }
    }
}

impl SessionConfig {
    pub fn speaker_fallback(&self) -> SpeakerFallback {
        if self.positional_speakers {
            SpeakerFallback::Alternate
        } else {
            SpeakerFallback::Operator
        }
    }
}

/// Auto-mode pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Pause around operator lines
    #[serde(default = "default_operator_delay")]
    pub operator_delay_ms: u64,

    /// Pause around persona lines
    #[serde(default = "default_persona_delay")]
    pub persona_delay_ms: u64,
}

fn default_operator_delay() -> u64 {
    2000
}

fn default_persona_delay() -> u64 {
    1500
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            operator_delay_ms: default_operator_delay(),
            persona_delay_ms: default_persona_delay(),
        }
    }
}

impl Config {
    /// Load `.env`, the optional config file, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from a variable lookup (the process environment in
    /// production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV) {
            self.backend.base_url = url;
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            self.backend.timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{} must be a whole number of seconds", TIMEOUT_ENV))
            })?;
        }
        if let Some(persona) = lookup(PERSONA_ENV) {
            self.session.persona = Some(persona);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.url()?;

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend timeout must be greater than zero".into(),
            ));
        }
        if self.session.operator_label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "operator label cannot be empty".into(),
            ));
        }
        if let Some(persona) = &self.session.persona {
            if persona.trim().is_empty() {
                return Err(ConfigError::Validation("persona cannot be empty".into()));
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_CONFIG: &str = r#"
[backend]
base_url = "https://sim.example.org/api/"
timeout_secs = 10

[session]
persona = "Lindsay"
operator_label = "Dispatcher"
positional_speakers = false

[playback]
operator_delay_ms = 500
persona_delay_ms = 250
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.backend.base_url, "https://sim.example.org/api/");
        assert_eq!(config.backend.timeout(), Duration::from_secs(10));
        assert_eq!(config.session.persona.as_deref(), Some("Lindsay"));
        assert_eq!(config.session.operator_label, "Dispatcher");
        assert_eq!(config.session.speaker_fallback(), SpeakerFallback::Operator);
        assert_eq!(config.playback.operator_delay_ms, 500);
        assert_eq!(config.playback.persona_delay_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.backend.base_url, "http://localhost:8001");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.session.operator_label, "Operator");
        assert_eq!(config.session.speaker_fallback(), SpeakerFallback::Alternate);
        assert_eq!(config.playback.operator_delay_ms, 2000);
        assert_eq!(config.playback.persona_delay_ms, 1500);
        assert!(config.session.persona.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PERSONA_CHAT_BACKEND_URL", "http://10.0.0.5:9000"),
            ("PERSONA_CHAT_TIMEOUT_SECS", " 12 "),
            ("PERSONA_CHAT_PERSONA", "Bob"),
        ]);

        let mut config = Config::from_toml(SAMPLE_CONFIG).unwrap();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.backend.timeout_secs, 12);
        assert_eq!(config.session.persona.as_deref(), Some("Bob"));
        // untouched by the environment
        assert_eq!(config.session.operator_label, "Dispatcher");
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "PERSONA_CHAT_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.backend.base_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backend.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.persona = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[backend\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
