//! Configuration management
//!
//! Engine configuration with TOML persistence. Every knob has a serde
//! default so a partial config file (or none at all) yields a working
//! engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Transition model parameters
    #[serde(default)]
    pub model: ModelConfig,
    /// Feedback buffering
    #[serde(default)]
    pub feedback: FeedbackConfig,
    /// Suggestion cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retrain/versioning pipeline
    #[serde(default)]
    pub versioning: VersioningConfig,
}

/// Transition model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Additive smoothing constant; keeps every transition probability
    /// strictly positive
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Retrieval-time probability floor; entries below it are dropped
    /// before renormalization
    #[serde(default = "default_min_probability")]
    pub min_probability: f64,
    /// Hard cap on the number of states the model will index
    #[serde(default = "default_max_states")]
    pub max_states: usize,
}

fn default_alpha() -> f64 {
    0.1
}

fn default_min_probability() -> f64 {
    0.01
}

fn default_max_states() -> usize {
    100
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            min_probability: default_min_probability(),
            max_states: default_max_states(),
        }
    }
}

/// Feedback buffering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Buffer size at which a retrain is triggered automatically
    #[serde(default = "default_update_threshold")]
    pub update_threshold: usize,
    /// Spill file for crash recovery; defaults under the data directory
    #[serde(default)]
    pub buffer_path: Option<PathBuf>,
}

fn default_update_threshold() -> usize {
    10
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            update_threshold: default_update_threshold(),
            buffer_path: None,
        }
    }
}

/// Suggestion cache parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached input texts
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Retrain/versioning pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Live snapshot path; defaults under the data directory
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Directory for timestamped backups; defaults next to the snapshot
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// Change degree above which a retrain is published
    #[serde(default = "default_significant_change_threshold")]
    pub significant_change_threshold: f64,
    /// Webhook endpoint for model-update events; unset disables
    /// notifications
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_significant_change_threshold() -> f64 {
    0.15
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            backup_dir: None,
            significant_change_threshold: default_significant_change_threshold(),
            webhook_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file, creating it with
    /// defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: EngineConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = EngineConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Live snapshot path, resolved against the data directory when unset
    pub fn model_path(&self) -> Result<PathBuf> {
        match &self.versioning.model_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("model_data").join("markov_model.json")),
        }
    }

    /// Backup directory, resolved next to the snapshot when unset
    pub fn backup_dir(&self) -> Result<PathBuf> {
        match &self.versioning.backup_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("model_data").join("backups")),
        }
    }

    /// Feedback spill path, resolved against the data directory when unset
    pub fn buffer_path(&self) -> Result<PathBuf> {
        match &self.feedback.buffer_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("model_data").join("feedback_buffer.json")),
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "markov-suggest", "markov-suggest")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "markov-suggest", "markov-suggest")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.model.alpha, 0.1);
        assert_eq!(config.model.min_probability, 0.01);
        assert_eq!(config.model.max_states, 100);
        assert_eq!(config.feedback.update_threshold, 10);
        assert_eq!(config.versioning.significant_change_threshold, 0.15);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("[model]\nalpha = 0.5\n").unwrap();
        assert_eq!(config.model.alpha, 0.5);
        assert_eq!(config.model.max_states, 100);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.model.max_states, config.model.max_states);
        assert_eq!(back.feedback.update_threshold, config.feedback.update_threshold);
    }
}
