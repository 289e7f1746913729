//! Configuration loading and typed config structures for Ringboard.
//!
//! The canonical configuration lives in `ringboard-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads and validates the file. Every field has a
//! default, so an empty document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use ringboard_types::{PlayerStats, Ring, RingMap};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The document parsed but holds values the engine cannot run with.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RingboardConfig {
    /// Phase timers and turn clock.
    #[serde(default)]
    pub turn: TurnConfig,

    /// Ring clock intervals.
    #[serde(default)]
    pub rings: RingIntervals,

    /// Per-session gameplay parameters.
    #[serde(default)]
    pub session: SessionConfig,

    /// Card catalog location.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RingboardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `RINGBOARD_CATALOG` overrides `catalog.path` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.catalog.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check the values the engine relies on being positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (ring, interval) in self.rings.to_map().iter() {
            if *interval == 0 {
                return Err(ConfigError::Invalid {
                    reason: format!("rings.{ring} must be at least 1"),
                });
            }
        }
        if self.session.board_tiles == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.board_tiles must be at least 1".to_owned(),
            });
        }
        if self.session.max_cards_per_turn == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.max_cards_per_turn must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Phase timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TurnConfig {
    /// Milliseconds the active player has to roll before the engine rolls
    /// for them.
    #[serde(default = "default_roll_timeout_ms")]
    pub roll_timeout_ms: u64,

    /// Milliseconds the active player has to pick a card choice before the
    /// turn ends without one.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// Seconds shown on the turn timer in a fresh context.
    #[serde(default = "default_time_remaining_secs")]
    pub time_remaining_secs: u32,
}

impl TurnConfig {
    /// Roll timeout as a [`Duration`].
    pub const fn roll_timeout(&self) -> Duration {
        Duration::from_millis(self.roll_timeout_ms)
    }

    /// Decision timeout as a [`Duration`].
    pub const fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            roll_timeout_ms: default_roll_timeout_ms(),
            decision_timeout_ms: default_decision_timeout_ms(),
            time_remaining_secs: default_time_remaining_secs(),
        }
    }
}

/// Ring clock intervals, in scheduler turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RingIntervals {
    /// Career ring interval.
    #[serde(default = "default_career_interval")]
    pub career: u64,
    /// Health ring interval.
    #[serde(default = "default_health_interval")]
    pub health: u64,
    /// Social ring interval.
    #[serde(default = "default_social_interval")]
    pub social: u64,
    /// Personal ring interval.
    #[serde(default = "default_personal_interval")]
    pub personal: u64,
    /// Babel ring interval.
    #[serde(default = "default_babel_interval")]
    pub babel: u64,
}

impl RingIntervals {
    /// The intervals as a ring-indexed table.
    pub const fn to_map(self) -> RingMap<u64> {
        RingMap {
            career: self.career,
            health: self.health,
            social: self.social,
            personal: self.personal,
            babel: self.babel,
        }
    }
}

impl Default for RingIntervals {
    fn default() -> Self {
        Self {
            career: default_career_interval(),
            health: default_health_interval(),
            social: default_social_interval(),
            personal: default_personal_interval(),
            babel: default_babel_interval(),
        }
    }
}

/// Per-session gameplay parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on cards drawn per roll.
    #[serde(default = "default_max_cards_per_turn")]
    pub max_cards_per_turn: usize,

    /// Number of tiles around the board.
    #[serde(default = "default_board_tiles")]
    pub board_tiles: u32,

    /// Stat vector every player starts with.
    #[serde(default = "default_starting_stats")]
    pub starting_stats: PlayerStats,

    /// Fixed RNG seed for reproducible sessions. Unset means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Lookahead window, in turns, for upcoming events in snapshots.
    #[serde(default = "default_upcoming_lookahead")]
    pub upcoming_lookahead: u64,

    /// Capacity of each session's inbound command queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_cards_per_turn: default_max_cards_per_turn(),
            board_tiles: default_board_tiles(),
            starting_stats: default_starting_stats(),
            seed: None,
            upcoming_lookahead: default_upcoming_lookahead(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Card catalog location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    /// Path to the card template JSON file. Unset means an empty catalog.
    #[serde(default)]
    pub path: Option<String>,
}

impl CatalogConfig {
    /// Override the catalog path with `RINGBOARD_CATALOG` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RINGBOARD_CATALOG") {
            self.path = Some(val);
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_roll_timeout_ms() -> u64 {
    5_000
}

const fn default_decision_timeout_ms() -> u64 {
    30_000
}

const fn default_time_remaining_secs() -> u32 {
    30
}

const fn default_career_interval() -> u64 {
    Ring::Career.default_interval()
}

const fn default_health_interval() -> u64 {
    Ring::Health.default_interval()
}

const fn default_social_interval() -> u64 {
    Ring::Social.default_interval()
}

const fn default_personal_interval() -> u64 {
    Ring::Personal.default_interval()
}

const fn default_babel_interval() -> u64 {
    Ring::Babel.default_interval()
}

const fn default_max_cards_per_turn() -> usize {
    3
}

const fn default_board_tiles() -> u32 {
    24
}

const fn default_starting_stats() -> PlayerStats {
    PlayerStats {
        money: 2000,
        mental: 5,
        sin: 0,
        virtue: 0,
    }
}

const fn default_upcoming_lookahead() -> u64 {
    4
}

const fn default_queue_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_design_values() {
        let config = RingboardConfig::default();
        assert_eq!(config.turn.roll_timeout_ms, 5_000);
        assert_eq!(config.turn.decision_timeout_ms, 30_000);
        assert_eq!(config.turn.time_remaining_secs, 30);
        assert_eq!(config.rings.to_map(), RingMap::from_fn(Ring::default_interval));
        assert_eq!(config.session.max_cards_per_turn, 3);
        assert_eq!(config.session.starting_stats.money, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = RingboardConfig::parse("{}").unwrap();
        assert_eq!(config.turn, TurnConfig::default());
        assert_eq!(config.rings, RingIntervals::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
turn:
  roll_timeout_ms: 1500
  decision_timeout_ms: 9000
  time_remaining_secs: 9

rings:
  career: 3
  health: 5
  social: 7
  personal: 9
  babel: 11

session:
  max_cards_per_turn: 2
  board_tiles: 40
  starting_stats:
    money: 500
    mental: 3
    sin: 1
    virtue: 2
  seed: 7
  upcoming_lookahead: 6
  queue_capacity: 16

catalog:
  path: "cards.json"

logging:
  level: "debug"
  json: true
"#;
        let config = RingboardConfig::parse(yaml).unwrap();
        assert_eq!(config.turn.roll_timeout(), Duration::from_millis(1500));
        assert_eq!(config.turn.decision_timeout(), Duration::from_secs(9));
        assert_eq!(*config.rings.to_map().get(Ring::Babel), 11);
        assert_eq!(config.session.board_tiles, 40);
        assert_eq!(config.session.starting_stats.virtue, 2);
        assert_eq!(config.session.seed, Some(7));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn partial_section_fills_remaining_defaults() {
        let config = RingboardConfig::parse("rings:\n  social: 2\n").unwrap();
        assert_eq!(config.rings.social, 2);
        assert_eq!(config.rings.career, 4);
        assert_eq!(config.rings.babel, 12);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = RingboardConfig::parse("rings:\n  health: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_board_is_rejected() {
        let result = RingboardConfig::parse("session:\n  board_tiles: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = RingboardConfig::parse("turn: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
