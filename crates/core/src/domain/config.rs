//! Configuration management for Voice Focus
//!
//! This module provides:
//! - Configuration structs for the runtime, the broadcast target and the chain
//! - TOML serialization
//! - A config manager with factory defaults and corrupt-file recovery

use crate::domain::message::FeatureState;
use crate::domain::relay::UrlPattern;
use crate::domain::stage::ChainParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Highest sample rate the render backend accepts
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Longest reverb tail, in seconds
pub const MAX_REVERB_SECONDS: f32 = 10.0;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output sample rate of the render backend
    pub sample_rate: u32,

    /// Capacity of page and coordinator mailboxes
    pub mailbox_capacity: usize,

    /// How long a broadcast waits for one page's acknowledgement
    pub ack_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            mailbox_capacity: 32,
            ack_timeout_ms: 5000,
        }
    }
}

/// Broadcast target settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Pages the coordinator forwards toggles to
    pub url_pattern: UrlPattern,

    /// URL reported by the page the CLI hosts
    pub page_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url_pattern: UrlPattern::default(),
            page_url: "https://www.youtube.com/watch".to_string(),
        }
    }
}

/// Media discovery settings for watched directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory treated as the hosted document (None = current directory)
    pub directory: Option<PathBuf>,

    /// File extensions that count as media elements
    pub media_extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: None,
            media_extensions: ["mp4", "webm", "mkv", "wav", "mp3", "ogg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Complete Voice Focus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VoiceFocusConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub site: SiteConfig,
    /// Toggle values the coordinator starts with
    #[serde(default)]
    pub features: FeatureState,
    #[serde(default)]
    pub chain: ChainParams,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl VoiceFocusConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.app.sample_rate == 0 || self.app.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be between 1 and {MAX_SAMPLE_RATE}"
            )));
        }
        if self.app.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be positive".to_string()));
        }
        if self.app.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid("ack_timeout_ms must be positive".to_string()));
        }
        let reverb = self.chain.reverb_seconds;
        if !reverb.is_finite() || !(0.0..=MAX_REVERB_SECONDS).contains(&reverb) {
            return Err(ConfigError::Invalid(format!(
                "reverb_seconds must be between 0 and {MAX_REVERB_SECONDS}"
            )));
        }
        if self.site.url_pattern.as_str().is_empty() {
            return Err(ConfigError::Invalid("url_pattern must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Manages the main configuration file at `~/.config/voicefocus/config.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Returns `~/.config/voicefocus` on Linux/Mac, `%APPDATA%\voicefocus` on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("voicefocus"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the factory default.
    /// If the config file is corrupt, backs it up and returns the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> VoiceFocusConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = VoiceFocusConfig::default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match VoiceFocusConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                VoiceFocusConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &VoiceFocusConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = VoiceFocusConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VoiceFocusConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: VoiceFocusConfig = toml::from_str(
            r#"
            [site]
            url_pattern = "https://example.com/*"
            page_url = "https://example.com/v/1"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.site.url_pattern.as_str(), "https://example.com/*");
        assert_eq!(parsed.app, AppConfig::default());
        assert_eq!(parsed.chain, ChainParams::default());
        assert_eq!(parsed.features.volume_boost, 100);
    }

    #[test]
    fn test_partial_app_table() {
        let parsed: VoiceFocusConfig = toml::from_str(
            r#"
            [app]
            sample_rate = 44100
            "#,
        )
        .unwrap();

        assert_eq!(parsed.app.sample_rate, 44100);
        assert_eq!(parsed.app.mailbox_capacity, AppConfig::default().mailbox_capacity);
        assert_eq!(parsed.app.ack_timeout_ms, AppConfig::default().ack_timeout_ms);
    }

    #[test]
    fn test_partial_chain_table() {
        let parsed: VoiceFocusConfig = toml::from_str(
            r#"
            [chain]
            reverb_seconds = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(parsed.chain.reverb_seconds, 1.5);
        assert_eq!(parsed.chain.output_gain, ChainParams::default().output_gain);
    }

    #[test]
    fn test_validate() {
        let mut config = VoiceFocusConfig::default();
        assert!(config.validate().is_ok());

        config.app.sample_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.app.sample_rate = MAX_SAMPLE_RATE + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_reverb() {
        let mut config = VoiceFocusConfig::default();
        config.chain.reverb_seconds = MAX_REVERB_SECONDS;
        assert!(config.validate().is_ok());

        for bad in [100_000.0, -1.0, f32::NAN] {
            config.chain.reverb_seconds = bad;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{bad} accepted");
        }
    }

    #[tokio::test]
    async fn test_load_rejects_oversized_reverb() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = VoiceFocusConfig::default();
        config.chain.reverb_seconds = 100_000.0;
        config.save_to_file(&config_path).await.unwrap();

        assert!(matches!(
            VoiceFocusConfig::load_from_file(&config_path).await,
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = VoiceFocusConfig::default();
        config.features.volume_boost = 180;
        config.save_to_file(&config_path).await.unwrap();

        let loaded = VoiceFocusConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded.features.volume_boost, 180);
    }

    #[tokio::test]
    async fn test_manager_writes_factory_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().join("voicefocus"));

        assert!(!manager.exists());
        let config = manager.load().await;
        assert_eq!(config, VoiceFocusConfig::default());
        assert!(manager.exists());
    }

    #[tokio::test]
    async fn test_manager_recovers_from_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        tokio::fs::write(manager.config_path(), "not = [valid").await.unwrap();

        let config = manager.load().await;
        assert_eq!(config, VoiceFocusConfig::default());
        assert!(temp_dir.path().join("config.toml.corrupt").exists());
    }
}
