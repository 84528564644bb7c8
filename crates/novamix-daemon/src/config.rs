//! Daemon configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use novamix_pipewire::SinkTargets;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Sink target settings
    #[serde(default)]
    pub sinks: SinksConfig,
}

/// Names of the externally provisioned game and chat sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinksConfig {
    /// PipeWire node name of the game sink
    #[serde(default = "default_game_sink")]
    pub game: String,
    /// PipeWire node name of the chat sink
    #[serde(default = "default_chat_sink")]
    pub chat: String,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self { game: default_game_sink(), chat: default_chat_sink() }
    }
}

impl SinksConfig {
    /// The targets the mixer runtime should track.
    #[must_use]
    pub fn targets(&self) -> SinkTargets {
        SinkTargets { game: self.game.clone(), chat: self.chat.clone() }
    }
}

fn default_game_sink() -> String {
    "NovaGame".to_string()
}

fn default_chat_sink() -> String {
    "NovaChat".to_string()
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<Config> {
    let config_path = config_path()?;

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "novamix", "Novamix")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sinks.game, "NovaGame");
        assert_eq!(config.sinks.chat, "NovaChat");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [sinks]
            game = "MyGame"
            "#,
        )
        .unwrap();
        assert_eq!(config.sinks.game, "MyGame");
        assert_eq!(config.sinks.chat, "NovaChat");
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sinks.targets(), SinkTargets::default());
    }
}
