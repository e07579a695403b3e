pub mod runtime;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::buffer::{RetryPolicy, DEFAULT_WINDOW_TICKS};
use crate::correlate::{DEFAULT_HANDLE_INDEX_BITS, DEFAULT_MAX_PLAYERS};

/// Complete ingest configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub flush: FlushConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub changes: ChangesConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Update buffering and flush configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FlushConfig {
    /// Ticks to accumulate before a flush is triggered
    #[serde(default = "default_window_ticks")]
    pub window_ticks: u32,
    /// Attempts per sink write before the flush generation fails
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (doubles per attempt)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_window_ticks() -> u32 {
    DEFAULT_WINDOW_TICKS
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            window_ticks: default_window_ticks(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl FlushConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: std::time::Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Player/hero correlation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    /// Class of the singleton carrying the per-player hero handles
    #[serde(default = "default_player_resource_class")]
    pub player_resource_class: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    /// Width of the entity index field in an entity handle
    #[serde(default = "default_handle_index_bits")]
    pub handle_index_bits: u32,
    /// Property identifying a player pawn's slot
    #[serde(default = "default_player_id_property")]
    pub player_id_property: String,
}

fn default_player_resource_class() -> String {
    "CDOTA_PlayerResource".to_string()
}

fn default_max_players() -> u32 {
    DEFAULT_MAX_PLAYERS
}

fn default_handle_index_bits() -> u32 {
    DEFAULT_HANDLE_INDEX_BITS
}

fn default_player_id_property() -> String {
    "m_iPlayerID".to_string()
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            player_resource_class: default_player_resource_class(),
            max_players: default_max_players(),
            handle_index_bits: default_handle_index_bits(),
            player_id_property: default_player_id_property(),
        }
    }
}

/// Change detection configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangesConfig {
    /// Ignored in addition to the built-in noisy properties
    #[serde(default)]
    pub extra_ignored_properties: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// SQLite database path
    #[serde(default = "default_database")]
    pub database: String,
    /// Game label stored on the session
    #[serde(default = "default_game")]
    pub game: String,
    /// Tickrate stored until the recording's file info says otherwise
    #[serde(default = "default_tickrate")]
    pub default_tickrate: u32,
}

fn default_database() -> String {
    "gamevis.db".to_string()
}

fn default_game() -> String {
    "dota_reborn".to_string()
}

fn default_tickrate() -> u32 {
    30
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            game: default_game(),
            default_tickrate: default_tickrate(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<IngestConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: IngestConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.flush.window_ticks, 15);
        assert_eq!(config.flush.max_attempts, 3);
        assert_eq!(config.correlation.player_resource_class, "CDOTA_PlayerResource");
        assert_eq!(config.correlation.max_players, 64);
        assert_eq!(config.correlation.handle_index_bits, 14);
        assert_eq!(config.sink.default_tickrate, 30);
        assert!(config.changes.extra_ignored_properties.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [flush]
            window_ticks = 30
            max_attempts = 5
            retry_backoff_ms = 10

            [correlation]
            player_resource_class = "CDOTA_PlayerResource"
            max_players = 24
            handle_index_bits = 15
            player_id_property = "m_nPlayerID"

            [changes]
            extra_ignored_properties = ["m_flStartSequenceCycle"]

            [sink]
            database = "/tmp/sessions.db"
            game = "dota2"
            default_tickrate = 60
        "#;

        let config: IngestConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.flush.window_ticks, 30);
        assert_eq!(config.flush.retry_policy().max_attempts, 5);
        assert_eq!(
            config.flush.retry_policy().backoff,
            std::time::Duration::from_millis(10)
        );
        assert_eq!(config.correlation.max_players, 24);
        assert_eq!(config.correlation.player_id_property, "m_nPlayerID");
        assert_eq!(config.changes.extra_ignored_properties, vec!["m_flStartSequenceCycle"]);
        assert_eq!(config.sink.database, "/tmp/sessions.db");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections and keys use defaults
        let toml = r#"
            [flush]
            window_ticks = 5
        "#;

        let config: IngestConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.flush.window_ticks, 5);
        assert_eq!(config.flush.max_attempts, 3); // Default
        assert_eq!(config.sink.game, "dota_reborn"); // Default
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/replay-ingest.toml"));
        assert!(result.is_err());
    }
}
