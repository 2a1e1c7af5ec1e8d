//! Configuration management with validation and defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{GameError, GameResult};

/// Top-level service configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameConfig {
    pub round: RoundConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

/// Round timing policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Betting window length in seconds.
    pub duration_secs: u64,
    /// Pause between a round's result and the next round opening.
    pub cooldown_secs: u64,
    /// Upper bound for `upcoming` / `history` query limits.
    pub max_query_limit: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            cooldown_secs: 5,
            max_query_limit: 100,
        }
    }
}

/// Storage backend selection and tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    /// Run entirely in memory; nothing survives a restart.
    pub in_memory: bool,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/colorwin_data".to_string(),
            in_memory: false,
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
        }
    }
}

/// HTTP/WebSocket server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl GameConfig {
    /// Development preset: shorter betting window, in-memory storage.
    ///
    /// The 55s/5s split still sums to a full minute so consecutive periods
    /// land in distinct minutes.
    pub fn development() -> Self {
        Self {
            round: RoundConfig {
                duration_secs: 55,
                cooldown_secs: 5,
                max_query_limit: 100,
            },
            storage: StorageConfig {
                in_memory: true,
                ..Default::default()
            },
            api: ApiConfig::default(),
        }
    }

    /// Load from a TOML file; missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> GameResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GameError::Config(format!("cannot read config file: {}", e)))?;
        let config: GameConfig = toml::from_str(&contents)
            .map_err(|e| GameError::Config(format!("cannot parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate for logical consistency.
    pub fn validate(&self) -> GameResult<()> {
        if self.round.duration_secs == 0 {
            return Err(GameError::Config("round duration must be > 0".to_string()));
        }

        // Period ids carry minute resolution, so two rounds starting in the
        // same minute would collide. A full cycle of at least one minute
        // keeps consecutive start minutes strictly increasing.
        if self.round.duration_secs + self.round.cooldown_secs < 60 {
            return Err(GameError::Config(
                "round duration + cooldown must cover at least 60s to keep period ids unique"
                    .to_string(),
            ));
        }

        if self.round.max_query_limit == 0 {
            return Err(GameError::Config("max_query_limit must be > 0".to_string()));
        }

        if self.storage.write_buffer_size_mb == 0 {
            return Err(GameError::Config(
                "write_buffer_size_mb must be > 0".to_string(),
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(GameError::Config(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.round.duration_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.round.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_development_config_is_valid() {
        let config = GameConfig::development();
        assert!(config.validate().is_ok());
        assert!(config.storage.in_memory);
    }

    #[test]
    fn test_sub_minute_cycle_is_rejected() {
        let mut config = GameConfig::default();
        config.round.duration_secs = 30;
        config.round.cooldown_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        let mut config = GameConfig::default();
        config.round.duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = GameConfig::default();
        assert_eq!(config.round_duration(), Duration::from_secs(60));
        assert_eq!(config.cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let parsed: GameConfig = toml::from_str(
            r#"
            [round]
            duration_secs = 120
            cooldown_secs = 10
            max_query_limit = 50
            "#,
        )
        .unwrap();
        assert_eq!(parsed.round.duration_secs, 120);
        assert_eq!(parsed.api.port, 8080);
        assert!(!parsed.storage.in_memory);
    }
}
